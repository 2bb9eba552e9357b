use std::fmt::{Debug, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Four-byte big-endian type code identifying an image format.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub const fn as_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl Display for FourCc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}

impl Debug for FourCc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc(\"{self}\")")
    }
}

impl FromStr for FourCc {
    type Err = DomainError;

    /// Shorter codes are padded with spaces, so `"RAW"` parses as `"RAW "`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || value.len() > 4 || !value.is_ascii() {
            return Err(DomainError::InvalidTypeCode(value.to_string()));
        }
        let mut bytes = [b' '; 4];
        bytes[..value.len()].copy_from_slice(value.as_bytes());
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Gif,
    Bmp,
    Raw,
    Movie,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 7] = [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Tiff,
        ImageFormat::Gif,
        ImageFormat::Bmp,
        ImageFormat::Raw,
        ImageFormat::Movie,
    ];

    pub const fn code(self) -> FourCc {
        match self {
            Self::Jpeg => FourCc::new(*b"JPEG"),
            Self::Png => FourCc::new(*b"PNGf"),
            Self::Tiff => FourCc::new(*b"TIFF"),
            Self::Gif => FourCc::new(*b"GIFf"),
            Self::Bmp => FourCc::new(*b"BMPf"),
            Self::Raw => FourCc::new(*b"RAW "),
            Self::Movie => FourCc::new(*b"MooV"),
        }
    }

    pub fn from_code(code: FourCc) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.code() == code)
    }

    /// Canonical file extension, without the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Raw => "raw",
            Self::Movie => "mov",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "raw" | "cr2" | "nef" | "arw" | "dng" => Some(Self::Raw),
            "mov" | "mp4" | "m4v" => Some(Self::Movie),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether exports and thumbnails may be written in this format.
    pub const fn is_encodable(self) -> bool {
        matches!(
            self,
            Self::Jpeg | Self::Png | Self::Tiff | Self::Gif | Self::Bmp
        )
    }

    pub const fn is_raw(self) -> bool {
        matches!(self, Self::Raw)
    }

    pub const fn is_movie(self) -> bool {
        matches!(self, Self::Movie)
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

pub fn extension_for_format(format: ImageFormat) -> &'static str {
    format.extension()
}

pub fn format_for_extension(extension: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(extension)
}
