use std::fs;
use std::path::{Path, PathBuf};

use export_host_application::{ApplicationError, FileSystem, PathUsage};
use tracing::debug;
use walkdir::WalkDir;

fn io_error(path: &Path, error: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Io(format!("{}: {error}", path.display()))
}

#[derive(Debug, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    fn walk(path: &Path, descend: bool) -> WalkDir {
        let walk = WalkDir::new(path).min_depth(1);
        if descend {
            walk
        } else {
            walk.max_depth(1)
        }
    }

    #[cfg(unix)]
    fn allocated_bytes(metadata: &fs::Metadata) -> u64 {
        use std::os::unix::fs::MetadataExt;
        metadata.blocks() * 512
    }

    #[cfg(not(unix))]
    fn allocated_bytes(metadata: &fs::Metadata) -> u64 {
        metadata.len()
    }
}

impl FileSystem for LocalFileSystem {
    fn temporary_directory(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir(&self, path: &Path) -> Result<(), ApplicationError> {
        fs::create_dir_all(path).map_err(|error| io_error(path, error))
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), ApplicationError> {
        fs::write(path, bytes).map_err(|error| io_error(path, error))
    }

    fn count_files(&self, path: &Path, descend: bool) -> Result<u64, ApplicationError> {
        if path.is_file() {
            return Ok(1);
        }
        let mut count = 0;
        for entry in Self::walk(path, descend) {
            let entry = entry.map_err(|error| io_error(path, error))?;
            if entry.file_type().is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn size_at_path(&self, path: &Path, physical: bool) -> Result<PathUsage, ApplicationError> {
        let measure = |metadata: &fs::Metadata| {
            if physical {
                Self::allocated_bytes(metadata)
            } else {
                metadata.len()
            }
        };

        let metadata = fs::metadata(path).map_err(|error| io_error(path, error))?;
        if metadata.is_file() {
            return Ok(PathUsage {
                bytes: measure(&metadata),
                files: 1,
            });
        }

        let mut usage = PathUsage::default();
        for entry in Self::walk(path, true) {
            let entry = entry.map_err(|error| io_error(path, error))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata().map_err(|error| io_error(entry.path(), error))?;
            usage.bytes += measure(&metadata);
            usage.files += 1;
        }
        Ok(usage)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|metadata| metadata.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        fs::read_link(path).map_err(|error| io_error(path, error))
    }

    fn resolve_links(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        fs::canonicalize(path).map_err(|error| io_error(path, error))
    }

    #[cfg(unix)]
    fn ensure_permissions(&self, path: &Path, mode: u32) -> Result<(), ApplicationError> {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)
            .map_err(|error| io_error(path, error))?
            .permissions();
        let current = permissions.mode();
        if current & mode == mode {
            return Ok(());
        }
        permissions.set_mode(current | mode);
        debug!(path = %path.display(), from = current, to = current | mode, "permissions widened");
        fs::set_permissions(path, permissions).map_err(|error| io_error(path, error))
    }

    #[cfg(not(unix))]
    fn ensure_permissions(&self, path: &Path, _mode: u32) -> Result<(), ApplicationError> {
        debug!(path = %path.display(), "permission bits not supported on this platform");
        fs::metadata(path)
            .map(|_| ())
            .map_err(|error| io_error(path, error))
    }

    fn available_space(&self, path: &Path) -> Result<u64, ApplicationError> {
        fs2::available_space(path).map_err(|error| io_error(path, error))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn populated() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("a.jpg"), vec![0_u8; 100]).expect("write");
        fs::write(dir.path().join("sub/b.jpg"), vec![0_u8; 50]).expect("write");
        dir
    }

    #[test]
    fn counts_files_with_and_without_descending() {
        let dir = populated();
        let files = LocalFileSystem;
        assert_eq!(files.count_files(dir.path(), false).expect("count"), 1);
        assert_eq!(files.count_files(dir.path(), true).expect("count"), 2);
        assert_eq!(
            files
                .count_files(&dir.path().join("a.jpg"), true)
                .expect("count"),
            1
        );
    }

    #[test]
    fn apparent_size_sums_file_lengths() {
        let dir = populated();
        let usage = LocalFileSystem
            .size_at_path(dir.path(), false)
            .expect("size");
        assert_eq!(usage, PathUsage { bytes: 150, files: 2 });
        assert!(LocalFileSystem.size_at_path(&dir.path().join("nope"), false).is_err());
    }

    #[test]
    fn available_space_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        assert!(LocalFileSystem.available_space(dir.path()).expect("space") > 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_detected_and_resolved() {
        let dir = populated();
        let link = dir.path().join("link.jpg");
        std::os::unix::fs::symlink(dir.path().join("a.jpg"), &link).expect("symlink");

        let files = LocalFileSystem;
        assert!(files.is_symlink(&link));
        assert!(!files.is_symlink(&dir.path().join("a.jpg")));
        assert_eq!(files.read_link(&link).expect("read"), dir.path().join("a.jpg"));
        assert_eq!(
            files.resolve_links(&link).expect("resolve"),
            dir.path().join("a.jpg").canonicalize().expect("canonical")
        );
    }

    #[cfg(unix)]
    #[test]
    fn ensure_permissions_only_adds_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = populated();
        let file = dir.path().join("a.jpg");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600)).expect("chmod");
        LocalFileSystem.ensure_permissions(&file, 0o044).expect("ensure");
        let mode = fs::metadata(&file).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
