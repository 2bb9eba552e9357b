use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use export_host_domain::{quarter_turns, DomainError, ImageFormat, ImageSize};
use tracing::{debug, trace};

use crate::{ApplicationError, ThumbnailRenderer, ThumbnailSettings};

/// Counts thumbnailers that have not been fully released.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveThumbnailers(Arc<AtomicUsize>);

impl LiveThumbnailers {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

struct LiveGuard(LiveThumbnailers);

impl LiveGuard {
    fn acquire(live: &LiveThumbnailers) -> Self {
        live.0.fetch_add(1, Ordering::SeqCst);
        Self(live.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0 .0.fetch_sub(1, Ordering::SeqCst);
        trace!("thumbnailer released");
    }
}

struct ThumbnailerState {
    settings: ThumbnailSettings,
    last_image_size: Option<ImageSize>,
    last_thumbnail_size: Option<ImageSize>,
    _live: LiveGuard,
}

/// Shared handle to a thumbnail renderer and its configuration.
///
/// Cloning retains the handle; dropping the last clone releases it. All
/// clones see the same configuration, and calls are serialised.
#[derive(Clone)]
pub struct Thumbnailer {
    state: Arc<Mutex<ThumbnailerState>>,
    renderer: Arc<dyn ThumbnailRenderer>,
}

impl Thumbnailer {
    pub(crate) fn new(renderer: Arc<dyn ThumbnailRenderer>, live: &LiveThumbnailers) -> Self {
        Self {
            state: Arc::new(Mutex::new(ThumbnailerState {
                settings: ThumbnailSettings::default(),
                last_image_size: None,
                last_thumbnail_size: None,
                _live: LiveGuard::acquire(live),
            })),
            renderer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThumbnailerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live handles sharing this thumbnailer.
    pub fn retain_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }

    pub fn set_max_bounds(&self, max_bytes: u32, max_width: u32, max_height: u32) {
        let mut state = self.lock();
        state.settings.max_bytes = max_bytes;
        state.settings.max_width = max_width;
        state.settings.max_height = max_height;
    }

    pub fn max_bounds(&self) -> ImageSize {
        let state = self.lock();
        ImageSize::new(state.settings.max_width, state.settings.max_height)
    }

    pub fn max_bytes(&self) -> u32 {
        self.lock().settings.max_bytes
    }

    /// Values are clamped to 1..=100.
    pub fn set_quality(&self, quality: i32) {
        self.lock().settings.quality = quality.clamp(1, 100) as u8;
    }

    pub fn quality(&self) -> i32 {
        i32::from(self.lock().settings.quality)
    }

    pub fn set_rotation(&self, rotation: f32) -> Result<(), ApplicationError> {
        quarter_turns(rotation)?;
        self.lock().settings.rotation = rotation;
        Ok(())
    }

    pub fn rotation(&self) -> f32 {
        self.lock().settings.rotation
    }

    pub fn set_output_format(&self, format: ImageFormat) -> Result<(), ApplicationError> {
        if !format.is_encodable() {
            return Err(DomainError::NotEncodable(format).into());
        }
        self.lock().settings.output_format = format;
        Ok(())
    }

    pub fn output_format(&self) -> ImageFormat {
        self.lock().settings.output_format
    }

    pub fn set_output_extension(&self, extension: &str) -> Result<(), ApplicationError> {
        let format = ImageFormat::from_extension(extension).ok_or_else(|| {
            ApplicationError::InvalidInput(format!("unknown image extension: {extension}"))
        })?;
        self.set_output_format(format)
    }

    pub fn output_extension(&self) -> &'static str {
        self.output_format().extension()
    }

    pub fn settings(&self) -> ThumbnailSettings {
        self.lock().settings.clone()
    }

    /// Renders one thumbnail. Returns the thumbnail size on success.
    pub fn create_thumbnail(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<ImageSize, ApplicationError> {
        let mut state = self.lock();
        state.last_image_size = None;
        state.last_thumbnail_size = None;

        let outcome = self.renderer.render(source, destination, &state.settings)?;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            width = outcome.thumbnail_size.width,
            height = outcome.thumbnail_size.height,
            bytes = outcome.bytes_written,
            "thumbnail created"
        );
        state.last_image_size = Some(outcome.source_size);
        state.last_thumbnail_size = Some(outcome.thumbnail_size);
        Ok(outcome.thumbnail_size)
    }

    pub fn last_image_size(&self) -> Option<ImageSize> {
        self.lock().last_image_size
    }

    pub fn last_thumbnail_size(&self) -> Option<ImageSize> {
        self.lock().last_thumbnail_size
    }
}

impl Debug for Thumbnailer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnailer")
            .field("settings", &self.settings())
            .field("retain_count", &self.retain_count())
            .finish()
    }
}
