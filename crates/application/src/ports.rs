use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use export_host_domain::{
    AlbumId, AlbumRecord, ImageExportOptions, ImageFormat, ImageId, ImageRecord, ImageSize,
    MetadataMap,
};

use crate::{ApplicationError, PluginRecord};

#[derive(Debug, Clone)]
pub struct NewImage {
    pub file_path: String,
    pub source_path: String,
    pub file_name: String,
    pub title: String,
    pub format: ImageFormat,
    pub original_format: ImageFormat,
    pub size: ImageSize,
    pub file_size: u64,
    pub import_date: DateTime<Utc>,
    pub capture_date: Option<DateTime<Utc>>,
    pub exif: MetadataMap,
    pub tiff: MetadataMap,
}

#[derive(Debug, Clone, Copy)]
pub struct UpsertImageResult {
    pub image_id: ImageId,
    pub inserted: bool,
}

#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub name: String,
    pub music_path: Option<String>,
    pub comments: String,
}

/// Persistent photo library backing the export session snapshots.
pub trait PhotoLibrary: Send + Sync {
    fn initialize(&self) -> Result<(), ApplicationError>;

    fn upsert_image(&self, image: &NewImage) -> Result<UpsertImageResult, ApplicationError>;

    fn upsert_thumbnail(
        &self,
        image_id: ImageId,
        file_path: &str,
        size: ImageSize,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ApplicationError>;

    fn list_images(&self) -> Result<Vec<ImageRecord>, ApplicationError>;

    fn find_image_by_id(&self, image_id: ImageId) -> Result<Option<ImageRecord>, ApplicationError>;

    fn set_caption(
        &self,
        image_id: ImageId,
        title: &str,
        comments: &str,
    ) -> Result<(), ApplicationError>;

    fn set_rating(&self, image_id: ImageId, rating: i32) -> Result<(), ApplicationError>;

    fn set_keywords(&self, image_id: ImageId, keywords: &[String]) -> Result<(), ApplicationError>;

    fn set_rotation(&self, image_id: ImageId, rotation: f32) -> Result<(), ApplicationError>;

    fn create_album(
        &self,
        album: &NewAlbum,
        created_at: DateTime<Utc>,
    ) -> Result<AlbumId, ApplicationError>;

    fn add_image_to_album(&self, album_id: AlbumId, image_id: ImageId)
        -> Result<(), ApplicationError>;

    fn list_albums(&self) -> Result<Vec<AlbumRecord>, ApplicationError>;

    fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumRecord>, ApplicationError>;
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub canonical_path: PathBuf,
    pub extension: String,
    pub file_size: u64,
    pub format: ImageFormat,
}

#[derive(Debug, Clone, Default)]
pub struct FileScanSummary {
    pub scanned_files: usize,
    pub supported_files: usize,
    pub files: Vec<ScannedFile>,
}

pub trait FileScanner: Send + Sync {
    fn scan_supported(&self, folder: &str) -> Result<FileScanSummary, ApplicationError>;
}

#[derive(Debug, Clone)]
pub struct ThumbnailArtifact {
    pub file_path: String,
    pub size: ImageSize,
}

/// Catalog thumbnail cache, filled at import time.
pub trait ThumbnailGenerator: Send + Sync {
    fn ensure_thumbnail(
        &self,
        source_path: &Path,
        cache_root: &str,
        image_id: ImageId,
    ) -> Result<ThumbnailArtifact, ApplicationError>;
}

#[derive(Debug, Clone, Default)]
pub struct InspectedImage {
    pub size: ImageSize,
    pub exif: MetadataMap,
    pub camera_maker: Option<String>,
    pub camera_model: Option<String>,
    pub software: Option<String>,
    pub capture_date: Option<DateTime<Utc>>,
    pub digitized_date: Option<DateTime<Utc>>,
    pub modified_date: Option<DateTime<Utc>>,
}

pub trait ImageInspector: Send + Sync {
    fn inspect(&self, path: &Path, format: ImageFormat) -> Result<InspectedImage, ApplicationError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    pub options: &'a ImageExportOptions,
    /// Catalog rotation already applied to the source, in quarter turns.
    pub source_quarter_turns: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPixels {
    pub size: ImageSize,
    /// Row-major RGBA8.
    pub rgba: Vec<u8>,
}

pub trait ImageCodec: Send + Sync {
    /// Decodes, rotates, scales and re-encodes one image; returns the written size.
    fn export_image(&self, request: &ExportRequest<'_>) -> Result<ImageSize, ApplicationError>;

    fn decode(
        &self,
        source: &Path,
        bounds: ImageSize,
        quarter_turns: u8,
    ) -> Result<DecodedPixels, ApplicationError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSettings {
    /// Zero disables the byte budget.
    pub max_bytes: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality, 1..=100.
    pub quality: u8,
    pub rotation: f32,
    pub output_format: ImageFormat,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            max_bytes: 0,
            max_width: 256,
            max_height: 256,
            quality: 85,
            rotation: 0.0,
            output_format: ImageFormat::Jpeg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOutcome {
    pub source_size: ImageSize,
    pub thumbnail_size: ImageSize,
    pub bytes_written: u64,
}

pub trait ThumbnailRenderer: Send + Sync {
    fn render(
        &self,
        source: &Path,
        destination: &Path,
        settings: &ThumbnailSettings,
    ) -> Result<ThumbnailOutcome, ApplicationError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathUsage {
    pub bytes: u64,
    pub files: u64,
}

pub trait FileSystem: Send + Sync {
    fn temporary_directory(&self) -> PathBuf;

    fn file_exists(&self, path: &Path) -> bool;

    fn directory_exists(&self, path: &Path) -> bool;

    fn create_dir(&self, path: &Path) -> Result<(), ApplicationError>;

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), ApplicationError>;

    fn count_files(&self, path: &Path, descend: bool) -> Result<u64, ApplicationError>;

    /// Apparent size, or allocated size on disk when `physical` is set.
    fn size_at_path(&self, path: &Path, physical: bool) -> Result<PathUsage, ApplicationError>;

    fn is_symlink(&self, path: &Path) -> bool;

    fn read_link(&self, path: &Path) -> Result<PathBuf, ApplicationError>;

    fn resolve_links(&self, path: &Path) -> Result<PathBuf, ApplicationError>;

    /// Adds the permission bits in `mode` to `path` if any are missing.
    fn ensure_permissions(&self, path: &Path, mode: u32) -> Result<(), ApplicationError>;

    fn available_space(&self, path: &Path) -> Result<u64, ApplicationError>;
}

pub trait PluginSource: Send + Sync {
    fn discover(&self) -> Result<Vec<PluginRecord>, ApplicationError>;
}

/// The host window surrounding a plugin's export panel.
pub trait ExportWindow: Send + Sync {
    fn set_controls_enabled(&self, enabled: bool);

    fn present_view(&self, plugin_name: &str);

    fn show_progress(&self, progress: &export_host_domain::ExportProgress);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
