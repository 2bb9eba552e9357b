use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DomainError, ImageFormat, ImageSize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    Medium,
    #[default]
    High,
    Max,
}

impl ExportQuality {
    pub const ALL: [ExportQuality; 4] = [Self::Low, Self::Medium, Self::High, Self::Max];

    pub fn from_ordinal(value: u8) -> Result<Self, DomainError> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(DomainError::InvalidQuality(value))
    }

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// JPEG encoder quality for this tier.
    pub const fn encoder_quality(self) -> u8 {
        match self {
            Self::Low => 50,
            Self::Medium => 70,
            Self::High => 85,
            Self::Max => 100,
        }
    }
}

/// Metadata inclusion mode. EXIF and IPTC are independent bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExportMetadata(u8);

impl ExportMetadata {
    pub const NONE: Self = Self(0);
    pub const EXIF: Self = Self(1);
    pub const IPTC: Self = Self(2);
    pub const BOTH: Self = Self(3);

    pub fn from_bits(bits: u8) -> Result<Self, DomainError> {
        if bits > Self::BOTH.0 {
            return Err(DomainError::InvalidMetadataBits(bits));
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn includes_exif(self) -> bool {
        self.contains(Self::EXIF)
    }

    pub const fn includes_iptc(self) -> bool {
        self.contains(Self::IPTC)
    }
}

impl BitOr for ExportMetadata {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExportMetadata {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromStr for ExportMetadata {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::NONE),
            "exif" => Ok(Self::EXIF),
            "iptc" => Ok(Self::IPTC),
            "both" => Ok(Self::BOTH),
            other => Err(DomainError::UnknownMetadataMode(other.to_string())),
        }
    }
}

/// Validates a rotation in degrees and reduces it to a number of clockwise quarter turns.
pub fn quarter_turns(degrees: f32) -> Result<u8, DomainError> {
    if !degrees.is_finite() || degrees % 90.0 != 0.0 {
        return Err(DomainError::InvalidRotation(degrees));
    }
    let turns = (degrees / 90.0) as i64;
    Ok(turns.rem_euclid(4) as u8)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageExportOptions {
    pub format: ImageFormat,
    pub quality: ExportQuality,
    pub rotation: f32,
    pub width: u32,
    pub height: u32,
    pub metadata: ExportMetadata,
}

impl Default for ImageExportOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            quality: ExportQuality::default(),
            rotation: 0.0,
            width: 0,
            height: 0,
            metadata: ExportMetadata::NONE,
        }
    }
}

impl ImageExportOptions {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.format.is_encodable() {
            return Err(DomainError::NotEncodable(self.format));
        }
        quarter_turns(self.rotation)?;
        Ok(())
    }

    /// Output size for an (already rotated) source. A zero bound leaves that
    /// dimension unconstrained; images are never upscaled.
    pub fn target_size(&self, source: ImageSize) -> ImageSize {
        fit_within(source, self.width, self.height)
    }
}

pub fn fit_within(source: ImageSize, max_width: u32, max_height: u32) -> ImageSize {
    if source.is_empty() || (max_width == 0 && max_height == 0) {
        return source;
    }

    let scale_w = if max_width == 0 {
        f64::INFINITY
    } else {
        f64::from(max_width) / f64::from(source.width)
    };
    let scale_h = if max_height == 0 {
        f64::INFINITY
    } else {
        f64::from(max_height) / f64::from(source.height)
    };
    let scale = scale_w.min(scale_h).min(1.0);

    ImageSize {
        width: ((f64::from(source.width) * scale).round() as u32).max(1),
        height: ((f64::from(source.height) * scale).round() as u32).max(1),
    }
}
