use std::fs;
use std::io::Cursor;
use std::path::Path;

use export_host_application::{
    ApplicationError, DecodedPixels, ExportRequest, ImageCodec, ThumbnailOutcome,
    ThumbnailRenderer, ThumbnailSettings,
};
use export_host_domain::{fit_within, quarter_turns, ImageFormat, ImageSize};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageReader};
use tracing::{debug, trace};

const MIN_THUMBNAIL_QUALITY: u8 = 10;
const THUMBNAIL_QUALITY_STEP: u8 = 10;

fn decode_error(path: &Path, error: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Decode(format!("{}: {error}", path.display()))
}

fn encode_error(error: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Encode(error.to_string())
}

fn encoder_format(format: ImageFormat) -> Result<image::ImageFormat, ApplicationError> {
    match format {
        ImageFormat::Jpeg => Ok(image::ImageFormat::Jpeg),
        ImageFormat::Png => Ok(image::ImageFormat::Png),
        ImageFormat::Tiff => Ok(image::ImageFormat::Tiff),
        ImageFormat::Gif => Ok(image::ImageFormat::Gif),
        ImageFormat::Bmp => Ok(image::ImageFormat::Bmp),
        ImageFormat::Raw | ImageFormat::Movie => Err(ApplicationError::Unsupported(format!(
            "cannot encode {format}"
        ))),
    }
}

pub(crate) fn open_image(path: &Path) -> Result<DynamicImage, ApplicationError> {
    match ImageFormat::from_path(path) {
        Some(format) if format.is_raw() => {
            return Err(ApplicationError::Unsupported(format!(
                "raw decoding is not available: {}",
                path.display()
            )))
        }
        Some(format) if format.is_movie() => {
            return Err(ApplicationError::Unsupported(format!(
                "movies have no still image: {}",
                path.display()
            )))
        }
        _ => {}
    }

    ImageReader::open(path)
        .map_err(|error| ApplicationError::Io(format!("{}: {error}", path.display())))?
        .with_guessed_format()
        .map_err(|error| decode_error(path, error))?
        .decode()
        .map_err(|error| decode_error(path, error))
}

fn rotate(image: DynamicImage, quarter_turns: u8) -> DynamicImage {
    match quarter_turns % 4 {
        1 => image.rotate90(),
        2 => image.rotate180(),
        3 => image.rotate270(),
        _ => image,
    }
}

fn scale_to(image: DynamicImage, target: ImageSize, filter: FilterType) -> DynamicImage {
    if image.width() == target.width && image.height() == target.height {
        return image;
    }
    image.resize_exact(target.width, target.height, filter)
}

/// Encodes in memory; `quality` only applies to JPEG.
pub(crate) fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, ApplicationError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let rgb = image.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8.into())
                .map_err(encode_error)?;
        }
        other => {
            let target = encoder_format(other)?;
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut out, target)
                .map_err(encode_error)?;
        }
    }
    Ok(out.into_inner())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ApplicationError> {
    fs::write(path, bytes).map_err(|error| ApplicationError::Io(format!("{}: {error}", path.display())))
}

/// Export codec backed by the `image` crate.
#[derive(Debug, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn export_image(&self, request: &ExportRequest<'_>) -> Result<ImageSize, ApplicationError> {
        let options = request.options;
        options.validate()?;
        let turns = (request.source_quarter_turns + quarter_turns(options.rotation)?) % 4;

        let source = open_image(request.source)?;
        let rotated = rotate(source, turns);
        let target = options.target_size(ImageSize::new(rotated.width(), rotated.height()));
        let output = scale_to(rotated, target, FilterType::Lanczos3);

        let bytes = encode(&output, options.format, options.quality.encoder_quality())?;
        write_output(request.destination, &bytes)?;
        debug!(
            source = %request.source.display(),
            destination = %request.destination.display(),
            format = %options.format,
            bytes = bytes.len(),
            "image encoded"
        );
        Ok(target)
    }

    fn decode(
        &self,
        source: &Path,
        bounds: ImageSize,
        quarter_turns: u8,
    ) -> Result<DecodedPixels, ApplicationError> {
        let rotated = rotate(open_image(source)?, quarter_turns);
        let target = fit_within(
            ImageSize::new(rotated.width(), rotated.height()),
            bounds.width,
            bounds.height,
        );
        let rgba = scale_to(rotated, target, FilterType::Triangle).to_rgba8();
        Ok(DecodedPixels {
            size: ImageSize::new(rgba.width(), rgba.height()),
            rgba: rgba.into_raw(),
        })
    }
}

/// Thumbnail renderer backed by the `image` crate.
#[derive(Debug, Default)]
pub struct ImageCrateThumbnailRenderer;

impl ThumbnailRenderer for ImageCrateThumbnailRenderer {
    fn render(
        &self,
        source: &Path,
        destination: &Path,
        settings: &ThumbnailSettings,
    ) -> Result<ThumbnailOutcome, ApplicationError> {
        let image = open_image(source)?;
        let source_size = ImageSize::new(image.width(), image.height());
        let rotated = rotate(image, quarter_turns(settings.rotation)?);
        let target = fit_within(
            ImageSize::new(rotated.width(), rotated.height()),
            settings.max_width,
            settings.max_height,
        );
        let thumbnail = scale_to(rotated, target, FilterType::Triangle);

        let mut quality = settings.quality.clamp(1, 100);
        let mut bytes = encode(&thumbnail, settings.output_format, quality)?;
        let budget = u64::from(settings.max_bytes);
        while settings.output_format == ImageFormat::Jpeg
            && budget > 0
            && bytes.len() as u64 > budget
            && quality > MIN_THUMBNAIL_QUALITY
        {
            quality = quality
                .saturating_sub(THUMBNAIL_QUALITY_STEP)
                .max(MIN_THUMBNAIL_QUALITY);
            trace!(quality, size = bytes.len(), budget, "thumbnail over budget, re-encoding");
            bytes = encode(&thumbnail, settings.output_format, quality)?;
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|error| ApplicationError::Io(error.to_string()))?;
            }
        }
        write_output(destination, &bytes)?;

        Ok(ThumbnailOutcome {
            source_size,
            thumbnail_size: target,
            bytes_written: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use export_host_domain::{ExportQuality, ImageExportOptions};
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    use super::*;

    fn noisy_source(dir: &TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x * 7 + y * 13) as u8,
                (x * x + y) as u8,
                (y * 31 ^ x) as u8,
            ])
        });
        img.save(&path).expect("save");
        path
    }

    #[test]
    fn export_rotates_scales_and_converts() {
        let dir = TempDir::new().expect("tempdir");
        let source = noisy_source(&dir, "wide.png", 400, 200);
        let destination = dir.path().join("out.jpg");
        let options = ImageExportOptions {
            format: ImageFormat::Jpeg,
            quality: ExportQuality::Medium,
            rotation: 90.0,
            width: 100,
            height: 0,
            ..ImageExportOptions::default()
        };

        let size = ImageCrateCodec
            .export_image(&ExportRequest {
                source: &source,
                destination: &destination,
                options: &options,
                source_quarter_turns: 0,
            })
            .expect("export");
        assert_eq!(size, ImageSize::new(100, 200));
        assert_eq!(
            image::image_dimensions(&destination).expect("dimensions"),
            (100, 200)
        );
    }

    #[test]
    fn export_never_upscales_and_applies_catalog_rotation() {
        let dir = TempDir::new().expect("tempdir");
        let source = noisy_source(&dir, "small.png", 40, 20);
        let destination = dir.path().join("out.tiff");
        let options = ImageExportOptions {
            format: ImageFormat::Tiff,
            width: 1000,
            height: 1000,
            rotation: 180.0,
            ..ImageExportOptions::default()
        };

        let size = ImageCrateCodec
            .export_image(&ExportRequest {
                source: &source,
                destination: &destination,
                options: &options,
                source_quarter_turns: 1,
            })
            .expect("export");
        assert_eq!(size, ImageSize::new(20, 40));
    }

    #[test]
    fn raw_sources_are_unsupported() {
        let dir = TempDir::new().expect("tempdir");
        let source = dir.path().join("shot.cr2");
        fs::write(&source, b"not really raw").expect("write");
        let result = ImageCrateCodec.decode(&source, ImageSize::default(), 0);
        assert!(matches!(result, Err(ApplicationError::Unsupported(_))));
    }

    #[test]
    fn decode_fits_bounds() {
        let dir = TempDir::new().expect("tempdir");
        let source = noisy_source(&dir, "big.png", 300, 150);
        let pixels = ImageCrateCodec
            .decode(&source, ImageSize::new(60, 60), 0)
            .expect("decode");
        assert_eq!(pixels.size, ImageSize::new(60, 30));
        assert_eq!(pixels.rgba.len(), 60 * 30 * 4);
    }

    #[test]
    fn thumbnail_quality_steps_down_to_fit_budget() {
        let dir = TempDir::new().expect("tempdir");
        let source = noisy_source(&dir, "noisy.png", 256, 256);
        let unbounded = dir.path().join("unbounded.jpg");
        let bounded = dir.path().join("bounded.jpg");
        let renderer = ImageCrateThumbnailRenderer;

        let mut settings = ThumbnailSettings {
            quality: 100,
            ..ThumbnailSettings::default()
        };
        let full = renderer
            .render(&source, &unbounded, &settings)
            .expect("render");

        settings.max_bytes = (full.bytes_written / 2) as u32;
        let squeezed = renderer
            .render(&source, &bounded, &settings)
            .expect("render");
        assert!(squeezed.bytes_written < full.bytes_written);
        assert_eq!(squeezed.thumbnail_size, full.thumbnail_size);
        assert_eq!(full.source_size, ImageSize::new(256, 256));
    }

    #[test]
    fn thumbnail_respects_rotation_and_format() {
        let dir = TempDir::new().expect("tempdir");
        let source = noisy_source(&dir, "tall.png", 100, 300);
        let destination = dir.path().join("nested/thumb.png");
        let settings = ThumbnailSettings {
            max_width: 60,
            max_height: 60,
            rotation: 270.0,
            output_format: ImageFormat::Png,
            ..ThumbnailSettings::default()
        };
        let outcome = ImageCrateThumbnailRenderer
            .render(&source, &destination, &settings)
            .expect("render");
        assert_eq!(outcome.thumbnail_size, ImageSize::new(60, 20));
        assert_eq!(
            image::image_dimensions(&destination).expect("dimensions"),
            (60, 20)
        );
    }
}
