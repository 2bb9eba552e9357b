use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{ApplicationError, FileSystem};

const MAX_UNIQUE_ATTEMPTS: u32 = 10_000;
const MAX_FILENAME_BYTES: usize = 255;

/// Replaces characters that are not safe in a single path component.
pub fn valid_filename(name: &str) -> String {
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();

    while cleaned.starts_with('.') {
        cleaned.replace_range(0..1, "_");
    }
    if cleaned.is_empty() {
        return "untitled".to_string();
    }
    if cleaned.len() > MAX_FILENAME_BYTES {
        let mut end = MAX_FILENAME_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }
    cleaned
}

fn first_free(
    files: &dyn FileSystem,
    candidate: impl Fn(u32) -> PathBuf,
) -> Result<PathBuf, ApplicationError> {
    for attempt in 0..MAX_UNIQUE_ATTEMPTS {
        let path = candidate(attempt);
        if !files.file_exists(&path) && !files.directory_exists(&path) {
            return Ok(path);
        }
    }
    Err(ApplicationError::Io(format!(
        "no free name after {MAX_UNIQUE_ATTEMPTS} attempts: {}",
        candidate(0).display()
    )))
}

fn with_suffix(stem: &str, extension: Option<&str>, attempt: u32) -> String {
    let base = if attempt == 0 {
        stem.to_string()
    } else {
        format!("{stem}-{attempt}")
    };
    match extension {
        Some(ext) if !ext.is_empty() => format!("{base}.{ext}"),
        _ => base,
    }
}

/// `parent/child`, suffixed `-1`, `-2`, ... until nothing exists there.
pub fn unique_sub_path(
    files: &dyn FileSystem,
    parent: &Path,
    child: &str,
) -> Result<PathBuf, ApplicationError> {
    let child = valid_filename(child);
    first_free(files, |attempt| parent.join(with_suffix(&child, None, attempt)))
}

pub fn make_unique_path(files: &dyn FileSystem, path: &Path) -> Result<PathBuf, ApplicationError> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("untitled")
        .to_string();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string);
    first_free(files, |attempt| {
        parent.join(with_suffix(&stem, extension.as_deref(), attempt))
    })
}

pub fn make_unique_file_path(
    files: &dyn FileSystem,
    directory: &Path,
    stem: &str,
    extension: &str,
) -> Result<PathBuf, ApplicationError> {
    let stem = valid_filename(stem);
    first_free(files, |attempt| {
        directory.join(with_suffix(&stem, Some(extension), attempt))
    })
}

/// Appends a `YYYYmmdd-HHMMSS` stamp to the file stem, then makes it unique.
pub fn make_unique_file_name_with_time(
    files: &dyn FileSystem,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, ApplicationError> {
    let stamp = now.format("%Y%m%d-%H%M%S");
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("untitled");
    let mut file_name = format!("{stem}-{stamp}");
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        file_name.push('.');
        file_name.push_str(ext);
    }
    make_unique_path(files, &path.with_file_name(file_name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;
    use crate::PathUsage;

    struct FakeFiles {
        existing: HashSet<PathBuf>,
    }

    impl FakeFiles {
        fn with(paths: &[&str]) -> Self {
            Self {
                existing: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl FileSystem for FakeFiles {
        fn temporary_directory(&self) -> PathBuf {
            PathBuf::from("/tmp")
        }

        fn file_exists(&self, path: &Path) -> bool {
            self.existing.contains(path)
        }

        fn directory_exists(&self, _path: &Path) -> bool {
            false
        }

        fn create_dir(&self, _path: &Path) -> Result<(), ApplicationError> {
            Ok(())
        }

        fn write_bytes(&self, _path: &Path, _bytes: &[u8]) -> Result<(), ApplicationError> {
            Ok(())
        }

        fn count_files(&self, _path: &Path, _descend: bool) -> Result<u64, ApplicationError> {
            Ok(0)
        }

        fn size_at_path(&self, _path: &Path, _physical: bool) -> Result<PathUsage, ApplicationError> {
            Ok(PathUsage::default())
        }

        fn is_symlink(&self, _path: &Path) -> bool {
            false
        }

        fn read_link(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
            Ok(path.to_path_buf())
        }

        fn resolve_links(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
            Ok(path.to_path_buf())
        }

        fn ensure_permissions(&self, _path: &Path, _mode: u32) -> Result<(), ApplicationError> {
            Ok(())
        }

        fn available_space(&self, _path: &Path) -> Result<u64, ApplicationError> {
            Ok(u64::MAX)
        }
    }

    #[test]
    fn valid_filename_strips_separators_and_hidden_prefix() {
        assert_eq!(valid_filename("a/b:c"), "a_b_c");
        assert_eq!(valid_filename(".hidden"), "_hidden");
        assert_eq!(valid_filename("   "), "untitled");
        assert_eq!(valid_filename("Beach Day"), "Beach Day");
        assert!(valid_filename(&"é".repeat(300)).len() <= 255);
    }

    #[test]
    fn unique_file_path_skips_taken_names() {
        let files = FakeFiles::with(&["/out/beach.jpg", "/out/beach-1.jpg"]);
        let path = make_unique_file_path(&files, Path::new("/out"), "beach", "jpg")
            .expect("unique path");
        assert_eq!(path, PathBuf::from("/out/beach-2.jpg"));

        let free = make_unique_file_path(&files, Path::new("/out"), "dunes", "png")
            .expect("unique path");
        assert_eq!(free, PathBuf::from("/out/dunes.png"));
    }

    #[test]
    fn unique_path_keeps_extension() {
        let files = FakeFiles::with(&["/out/a.tiff"]);
        let path = make_unique_path(&files, Path::new("/out/a.tiff")).expect("unique");
        assert_eq!(path, PathBuf::from("/out/a-1.tiff"));
    }

    #[test]
    fn unique_sub_path_sanitises_child() {
        let files = FakeFiles::with(&["/out/Trip_2024"]);
        let path = unique_sub_path(&files, Path::new("/out"), "Trip/2024").expect("sub path");
        assert_eq!(path, PathBuf::from("/out/Trip_2024-1"));
    }

    #[test]
    fn time_stamped_name_uses_utc_clock() {
        let files = FakeFiles::with(&[]);
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let path = make_unique_file_name_with_time(&files, Path::new("/out/export.zip"), now)
            .expect("stamped");
        assert_eq!(path, PathBuf::from("/out/export-20240506-070809.zip"));
    }
}
