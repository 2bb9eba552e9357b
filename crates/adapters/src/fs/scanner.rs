use std::path::Path;

use export_host_application::{ApplicationError, FileScanSummary, FileScanner, ScannedFile};
use export_host_domain::ImageFormat;
use tracing::{trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Dot-files and dot-directories (caches, sidecars) are never imported.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn format_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[derive(Debug, Default)]
pub struct WalkdirFileScanner;

impl FileScanner for WalkdirFileScanner {
    fn scan_supported(&self, folder: &str) -> Result<FileScanSummary, ApplicationError> {
        let folder_path = Path::new(folder);
        if !folder_path.is_dir() {
            return Err(ApplicationError::InvalidInput(format!(
                "folder does not exist or is not a directory: {folder}"
            )));
        }

        let mut summary = FileScanSummary::default();
        let walker = WalkDir::new(folder_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(%error, "unreadable entry during scan");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            summary.scanned_files += 1;
            let Some(format) = ImageFormat::from_path(entry.path()) else {
                trace!(path = %entry.path().display(), "skipping unsupported file");
                continue;
            };

            let file_size = entry
                .metadata()
                .map_err(|error| ApplicationError::Io(error.to_string()))?
                .len();
            let canonical_path = entry
                .path()
                .canonicalize()
                .map_err(|error| ApplicationError::Io(error.to_string()))?;

            summary.supported_files += 1;
            summary.files.push(ScannedFile {
                extension: format_extension(&canonical_path),
                canonical_path,
                file_size,
                format,
            });
        }

        Ok(summary)
    }
}
