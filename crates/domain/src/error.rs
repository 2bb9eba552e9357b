use thiserror::Error;

use crate::{ExportState, ImageFormat};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("image id must be positive, got {0}")]
    InvalidImageId(i64),
    #[error("album id must be positive, got {0}")]
    InvalidAlbumId(i64),
    #[error("export quality must be in 0..=3, got {0}")]
    InvalidQuality(u8),
    #[error("metadata mode must be in 0..=3, got {0}")]
    InvalidMetadataBits(u8),
    #[error("unknown metadata mode: {0}")]
    UnknownMetadataMode(String),
    #[error("rotation must be a finite multiple of 90 degrees, got {0}")]
    InvalidRotation(f32),
    #[error("rating must be in 0..=5, got {0}")]
    InvalidRating(i32),
    #[error("format {0} cannot be used as an export target")]
    NotEncodable(ImageFormat),
    #[error("type code must be 1 to 4 ASCII characters, got {0:?}")]
    InvalidTypeCode(String),
    #[error("cannot {action} while export is {from:?}")]
    InvalidTransition {
        from: ExportState,
        action: &'static str,
    },
}
