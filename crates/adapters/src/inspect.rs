use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use exif::{Exif, Field, In, Tag, Value};
use export_host_application::{ApplicationError, ImageInspector, InspectedImage};
use export_host_domain::metadata::exif as keys;
use export_host_domain::{ImageFormat, ImageSize, MetadataMap};
use tracing::debug;

const EXIF_VOCABULARY: [(Tag, &str); 16] = [
    (Tag::DateTimeDigitized, keys::DATE_DIGITIZED),
    (Tag::Model, keys::CAMERA_MODEL),
    (Tag::ShutterSpeedValue, keys::SHUTTER),
    (Tag::ApertureValue, keys::APERTURE),
    (Tag::MaxApertureValue, keys::MAX_APERTURE),
    (Tag::ExposureBiasValue, keys::EXPOSURE_BIAS),
    (Tag::ExposureTime, keys::EXPOSURE),
    (Tag::ExposureIndex, keys::EXPOSURE_INDEX),
    (Tag::FocalLength, keys::FOCAL_LENGTH),
    (Tag::SubjectDistance, keys::DISTANCE),
    (Tag::SensingMethod, keys::SENSING),
    (Tag::LightSource, keys::LIGHT_SOURCE),
    (Tag::Flash, keys::FLASH),
    (Tag::MeteringMode, keys::METERING),
    (Tag::BrightnessValue, keys::BRIGHTNESS),
    (Tag::PhotographicSensitivity, keys::ISO_SPEED),
];

/// Reads pixel size and the EXIF vocabulary from an image file.
#[derive(Debug, Default)]
pub struct ExifImageInspector;

fn field_text(exif: &Exif, field: &Field) -> String {
    match field.value {
        Value::Ascii(ref values) => values
            .first()
            .map(|value| String::from_utf8_lossy(value).trim().to_string())
            .unwrap_or_default(),
        _ => field.display_value().with_unit(exif).to_string(),
    }
}

fn text(exif: &Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|field| field_text(exif, field))
        .filter(|value| !value.is_empty())
}

pub(crate) fn exif_date(exif: &Exif, tag: Tag) -> Option<DateTime<Utc>> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Ascii(ref values) = field.value else {
        return None;
    };
    parse_exif_date(values.first()?)
}

/// `YYYY:MM:DD HH:MM:SS`; EXIF carries no zone, so the value is taken as UTC.
pub(crate) fn parse_exif_date(raw: &[u8]) -> Option<DateTime<Utc>> {
    let date = exif::DateTime::from_ascii(raw).ok()?;
    Utc.with_ymd_and_hms(
        i32::from(date.year),
        u32::from(date.month),
        u32::from(date.day),
        u32::from(date.hour),
        u32::from(date.minute),
        u32::from(date.second),
    )
    .single()
}

fn read_exif(path: &Path) -> Result<Option<Exif>, ApplicationError> {
    let file = File::open(path)
        .map_err(|error| ApplicationError::Io(format!("{}: {error}", path.display())))?;
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(error) => {
            debug!(path = %path.display(), %error, "no readable exif");
            Ok(None)
        }
    }
}

fn exif_pixel_size(exif: &Exif) -> ImageSize {
    let dimension = |tag| {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(0)
    };
    ImageSize::new(
        dimension(Tag::PixelXDimension),
        dimension(Tag::PixelYDimension),
    )
}

impl ImageInspector for ExifImageInspector {
    fn inspect(&self, path: &Path, format: ImageFormat) -> Result<InspectedImage, ApplicationError> {
        if format.is_movie() {
            return Ok(InspectedImage::default());
        }

        let exif = read_exif(path)?;
        let size = if format.is_raw() {
            exif.as_ref().map(exif_pixel_size).unwrap_or_default()
        } else {
            let (width, height) = image::image_dimensions(path).map_err(|error| {
                ApplicationError::Decode(format!("{}: {error}", path.display()))
            })?;
            ImageSize::new(width, height)
        };

        let Some(exif) = exif else {
            return Ok(InspectedImage {
                size,
                ..InspectedImage::default()
            });
        };

        let mut map = MetadataMap::new();
        for (tag, key) in EXIF_VOCABULARY {
            if let Some(value) = text(&exif, tag) {
                map.insert(key.to_string(), value);
            }
        }

        Ok(InspectedImage {
            size,
            exif: map,
            camera_maker: text(&exif, Tag::Make),
            camera_model: text(&exif, Tag::Model),
            software: text(&exif, Tag::Software),
            capture_date: exif_date(&exif, Tag::DateTimeOriginal),
            digitized_date: exif_date(&exif, Tag::DateTimeDigitized),
            modified_date: exif_date(&exif, Tag::DateTime),
        })
    }
}
