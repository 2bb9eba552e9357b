use std::path::{Path, PathBuf};
use std::sync::Arc;

use export_host_application::{
    ApplicationError, ThumbnailArtifact, ThumbnailGenerator, ThumbnailRenderer, ThumbnailSettings,
};
use export_host_domain::{ImageId, ImageSize};
use tracing::debug;

/// Catalog thumbnail cache under `<cache_root>/thumbs/<id>.jpg`.
pub struct CacheThumbnailGenerator {
    renderer: Arc<dyn ThumbnailRenderer>,
    settings: ThumbnailSettings,
}

impl CacheThumbnailGenerator {
    pub fn new(renderer: Arc<dyn ThumbnailRenderer>) -> Self {
        Self {
            renderer,
            settings: ThumbnailSettings::default(),
        }
    }

    pub fn thumbnail_path(cache_root: &str, image_id: ImageId) -> PathBuf {
        Path::new(cache_root)
            .join("thumbs")
            .join(format!("{}.jpg", image_id.get()))
    }
}

impl ThumbnailGenerator for CacheThumbnailGenerator {
    fn ensure_thumbnail(
        &self,
        source_path: &Path,
        cache_root: &str,
        image_id: ImageId,
    ) -> Result<ThumbnailArtifact, ApplicationError> {
        let thumb_path = Self::thumbnail_path(cache_root, image_id);

        let size = if thumb_path.exists() {
            let (width, height) = image::image_dimensions(&thumb_path)
                .map_err(|error| ApplicationError::Decode(error.to_string()))?;
            ImageSize::new(width, height)
        } else {
            let outcome = self
                .renderer
                .render(source_path, &thumb_path, &self.settings)?;
            debug!(
                image_id = image_id.get(),
                path = %thumb_path.display(),
                "catalog thumbnail rendered"
            );
            outcome.thumbnail_size
        };

        Ok(ThumbnailArtifact {
            file_path: thumb_path.to_string_lossy().to_string(),
            size,
        })
    }
}
