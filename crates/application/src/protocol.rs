use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use export_host_domain::{ImageExportOptions, ImageFormat, ImageSize, MetadataMap};

use crate::{ApplicationError, Thumbnailer};

/// Read-only, index-addressed view of the export session plus the host
/// services a plugin may call while exporting.
///
/// Image indices address the session snapshot taken when the export starts;
/// they stay stable until the next snapshot. Album indices address every
/// album in the library. Out-of-range indices fail with
/// [`ApplicationError::IndexOutOfRange`].
pub trait ExportHost: Send + Sync {
    fn image_count(&self) -> usize;

    fn image_size_at(&self, index: usize) -> Result<ImageSize, ApplicationError>;

    fn image_format_at(&self, index: usize) -> Result<ImageFormat, ApplicationError>;

    fn original_image_format_at(&self, index: usize) -> Result<ImageFormat, ApplicationError>;

    fn original_is_raw_at(&self, index: usize) -> Result<bool, ApplicationError>;

    fn original_is_movie_at(&self, index: usize) -> Result<bool, ApplicationError>;

    fn image_title_at(&self, index: usize) -> Result<String, ApplicationError>;

    fn image_comments_at(&self, index: usize) -> Result<String, ApplicationError>;

    fn image_rotation_at(&self, index: usize) -> Result<f32, ApplicationError>;

    fn image_path_at(&self, index: usize) -> Result<PathBuf, ApplicationError>;

    fn source_path_at(&self, index: usize) -> Result<PathBuf, ApplicationError>;

    fn thumbnail_path_at(&self, index: usize) -> Result<Option<PathBuf>, ApplicationError>;

    fn image_file_name_at(&self, index: usize) -> Result<String, ApplicationError>;

    fn image_is_edited_at(&self, index: usize) -> Result<bool, ApplicationError>;

    fn image_is_portrait_at(&self, index: usize) -> Result<bool, ApplicationError>;

    fn image_aspect_ratio_at(&self, index: usize) -> Result<f32, ApplicationError>;

    fn image_file_size_at(&self, index: usize) -> Result<u64, ApplicationError>;

    fn image_date_at(&self, index: usize) -> Result<DateTime<Utc>, ApplicationError>;

    fn image_rating_at(&self, index: usize) -> Result<i32, ApplicationError>;

    fn image_tiff_properties_at(&self, index: usize) -> Result<MetadataMap, ApplicationError>;

    fn image_exif_properties_at(&self, index: usize) -> Result<MetadataMap, ApplicationError>;

    fn image_keywords_at(&self, index: usize) -> Result<Vec<String>, ApplicationError>;

    /// Names of the albums containing the image.
    fn albums_of_image_at(&self, index: usize) -> Result<Vec<String>, ApplicationError>;

    fn extension_for_image_format(&self, format: ImageFormat) -> &'static str;

    fn image_format_for_extension(&self, extension: &str) -> Option<ImageFormat>;

    fn album_count(&self) -> usize;

    fn album_name_at(&self, album: usize) -> Result<String, ApplicationError>;

    fn album_music_path_at(&self, album: usize) -> Result<Option<PathBuf>, ApplicationError>;

    fn album_comments_at(&self, album: usize) -> Result<String, ApplicationError>;

    /// Position of the image inside the album, or `None` when it is not a member.
    fn position_of_image_in_album(
        &self,
        index: usize,
        album: usize,
    ) -> Result<Option<usize>, ApplicationError>;

    fn enable_controls(&self);

    fn disable_controls(&self);

    /// Asks the controller to validate the destination and start exporting.
    fn click_export(&self);

    /// Asks the controller to start exporting without destination checks.
    fn start_export(&self);

    fn cancel_export_before_beginning(&self) -> Result<(), ApplicationError>;

    fn directory_path(&self) -> Option<PathBuf>;

    fn session_id(&self) -> u32;

    fn export_image_at(
        &self,
        index: usize,
        destination: &Path,
        options: &ImageExportOptions,
    ) -> Result<(), ApplicationError>;

    /// Size written by the most recent successful `export_image_at`.
    fn last_exported_image_size(&self) -> Option<ImageSize>;

    fn create_thumbnailer(&self) -> Thumbnailer;

    fn does_file_exist(&self, path: &Path) -> bool;

    fn create_dir(&self, path: &Path) -> Result<(), ApplicationError>;

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), ApplicationError>;

    fn valid_filename(&self, name: &str) -> String;

    fn make_unique_file_path(
        &self,
        directory: &Path,
        stem: &str,
        extension: &str,
    ) -> Result<PathBuf, ApplicationError>;
}
