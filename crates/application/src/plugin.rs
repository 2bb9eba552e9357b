use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use export_host_domain::{
    ExportMetadata, ExportProgress, ExportQuality, ExportSummary, ImageExportOptions, ImageFormat,
};
use serde::{Deserialize, Serialize};

use crate::{ApplicationError, ExportHost};

/// Cooperative cancellation flag shared between the controller and the export thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Convenience for plugin loops.
    pub fn check(&self) -> Result<(), ApplicationError> {
        if self.is_cancelled() {
            return Err(ApplicationError::Cancelled);
        }
        Ok(())
    }
}

/// Progress record written by the export thread and polled by the controller.
#[derive(Debug, Clone, Default)]
pub struct SharedProgress(Arc<Mutex<ExportProgress>>);

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ExportProgress> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self, total_items: usize, message: impl Into<String>) {
        let mut progress = self.lock();
        *progress = ExportProgress {
            current_item: 0,
            total_items,
            message: message.into(),
            finished: false,
        };
    }

    pub fn advance(&self, current_item: usize, message: impl Into<String>) {
        let mut progress = self.lock();
        progress.current_item = current_item;
        progress.message = message.into();
    }

    pub fn finish(&self) {
        let mut progress = self.lock();
        progress.current_item = progress.total_items;
        progress.finished = true;
    }

    pub fn reset(&self) {
        *self.lock() = ExportProgress::default();
    }

    pub fn snapshot(&self) -> ExportProgress {
        self.lock().clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileNaming {
    #[default]
    FileName,
    Title,
    Sequence,
}

/// User-facing settings of an export panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// `None` keeps the original format when it is encodable and falls back to JPEG.
    pub format: Option<ImageFormat>,
    pub quality: ExportQuality,
    pub rotation: f32,
    pub width: u32,
    pub height: u32,
    pub metadata: String,
    pub naming: FileNaming,
    pub name_prefix: String,
    pub thumbnail_size: u32,
    pub page_title: Option<String>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            format: None,
            quality: ExportQuality::High,
            rotation: 0.0,
            width: 0,
            height: 0,
            metadata: "none".to_string(),
            naming: FileNaming::FileName,
            name_prefix: "image".to_string(),
            thumbnail_size: 200,
            page_title: None,
        }
    }
}

impl PluginSettings {
    pub fn export_options(
        &self,
        original: ImageFormat,
    ) -> Result<ImageExportOptions, ApplicationError> {
        let format = match self.format {
            Some(format) => format,
            None if original.is_encodable() => original,
            None => ImageFormat::Jpeg,
        };
        let options = ImageExportOptions {
            format,
            quality: self.quality,
            rotation: self.rotation,
            width: self.width,
            height: self.height,
            metadata: self.metadata.parse::<ExportMetadata>()?,
        };
        options.validate()?;
        Ok(options)
    }
}

/// A third-party exporter hosted by the export controller.
pub trait ExportPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn wants_destination_prompt(&self) -> bool {
        true
    }

    fn default_directory_name(&self) -> Option<String> {
        None
    }

    fn validate_destination(&self, _destination: &Path) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn view_will_be_activated(&self, _host: &dyn ExportHost) {}

    fn view_will_be_deactivated(&self) {}

    fn settings(&self) -> PluginSettings;

    fn apply_settings(&self, settings: PluginSettings) -> Result<(), ApplicationError>;

    /// Runs on the export thread. Implementations poll `cancel` between items.
    fn perform_export(
        &self,
        host: &dyn ExportHost,
        destination: &Path,
        progress: &SharedProgress,
        cancel: &CancellationToken,
    ) -> Result<ExportSummary, ApplicationError>;
}

#[derive(Clone)]
pub struct PluginRecord {
    pub id: String,
    pub name: String,
    pub kind: String,
    /// Manifest the plugin was discovered from; empty for built-ins.
    pub source: PathBuf,
    pub plugin: Arc<dyn ExportPlugin>,
}

impl Debug for PluginRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
