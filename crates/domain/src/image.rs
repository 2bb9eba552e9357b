use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{quarter_turns, DomainError, ImageFormat, MetadataMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(i64);

impl ImageId {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::InvalidImageId(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumId(i64);

impl AlbumId {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::InvalidAlbumId(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub const fn is_portrait(self) -> bool {
        self.height > self.width
    }

    pub const fn rotated(self, quarter_turns: u8) -> Self {
        if quarter_turns % 2 == 1 {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }
}

pub const MAX_RATING: i32 = 5;

pub fn validate_rating(rating: i32) -> Result<i32, DomainError> {
    if !(0..=MAX_RATING).contains(&rating) {
        return Err(DomainError::InvalidRating(rating));
    }
    Ok(rating)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: ImageId,
    /// Working copy; differs from `source_path` once the image has been edited.
    pub file_path: String,
    pub source_path: String,
    pub thumbnail_path: Option<String>,
    pub file_name: String,
    pub title: String,
    pub comments: String,
    pub format: ImageFormat,
    pub original_format: ImageFormat,
    /// Stored pixel size, before `rotation` is applied.
    pub size: ImageSize,
    pub rotation: f32,
    pub edited: bool,
    pub file_size: u64,
    pub import_date: DateTime<Utc>,
    pub capture_date: Option<DateTime<Utc>>,
    pub rating: i32,
    pub keywords: Vec<String>,
    pub exif: MetadataMap,
    pub tiff: MetadataMap,
}

impl ImageRecord {
    /// Pixel size as displayed, with the catalog rotation applied.
    pub fn display_size(&self) -> ImageSize {
        let turns = quarter_turns(self.rotation).unwrap_or(0);
        self.size.rotated(turns)
    }

    pub fn is_portrait(&self) -> bool {
        self.display_size().is_portrait()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.display_size().aspect_ratio()
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.capture_date.unwrap_or(self.import_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRecord {
    pub id: AlbumId,
    pub name: String,
    pub music_path: Option<String>,
    pub comments: String,
    /// Member images in album order.
    pub image_ids: Vec<ImageId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub scanned_files: usize,
    pub supported_files: usize,
    pub newly_imported: usize,
}
