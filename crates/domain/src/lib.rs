mod error;
mod format;
mod image;
pub mod metadata;
mod options;
mod session;

pub use error::DomainError;
pub use format::{extension_for_format, format_for_extension, FourCc, ImageFormat};
pub use image::{
    validate_rating, AlbumId, AlbumRecord, ImageId, ImageRecord, ImageSize, ImportReport,
    MAX_RATING,
};
pub use metadata::MetadataMap;
pub use options::{
    fit_within, quarter_turns, ExportMetadata, ExportQuality, ImageExportOptions,
};
pub use session::{ExportProgress, ExportState, ExportSummary};
