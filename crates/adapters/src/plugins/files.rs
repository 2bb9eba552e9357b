use std::path::Path;
use std::sync::{PoisonError, RwLock};

use export_host_application::{
    ApplicationError, CancellationToken, ExportHost, ExportPlugin, FileNaming, PluginSettings,
    SharedProgress,
};
use export_host_domain::{ExportSummary, ImageFormat};
use tracing::{debug, warn};

/// File stem for the image at `index` under the given naming scheme.
pub(crate) fn output_stem(
    host: &dyn ExportHost,
    settings: &PluginSettings,
    index: usize,
) -> Result<String, ApplicationError> {
    let file_stem = || -> Result<String, ApplicationError> {
        let file_name = host.image_file_name_at(index)?;
        Ok(Path::new(&file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&file_name)
            .to_string())
    };

    let stem = match settings.naming {
        FileNaming::FileName => file_stem()?,
        FileNaming::Title => {
            let title = host.image_title_at(index)?;
            if title.trim().is_empty() {
                file_stem()?
            } else {
                title
            }
        }
        FileNaming::Sequence => format!("{}-{:04}", settings.name_prefix, index + 1),
    };
    Ok(host.valid_filename(&stem))
}

/// Writes every session image into the destination folder.
pub struct FilesExporter {
    name: String,
    settings: RwLock<PluginSettings>,
}

impl FilesExporter {
    pub fn new(name: impl Into<String>, settings: PluginSettings) -> Self {
        Self {
            name: name.into(),
            settings: RwLock::new(settings),
        }
    }
}

impl ExportPlugin for FilesExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> PluginSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply_settings(&self, settings: PluginSettings) -> Result<(), ApplicationError> {
        settings.export_options(ImageFormat::Jpeg)?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }

    fn perform_export(
        &self,
        host: &dyn ExportHost,
        destination: &Path,
        progress: &SharedProgress,
        cancel: &CancellationToken,
    ) -> Result<ExportSummary, ApplicationError> {
        let settings = self.settings();
        let mut summary = ExportSummary::default();

        for index in 0..host.image_count() {
            cancel.check()?;
            let file_name = host.image_file_name_at(index)?;

            if host.original_is_movie_at(index)? {
                debug!(index, file = %file_name, "movie skipped");
                summary.skipped += 1;
                progress.advance(index + 1, format!("skipped {file_name}"));
                continue;
            }

            let options = settings.export_options(host.image_format_at(index)?)?;
            let stem = output_stem(host, &settings, index)?;
            let path = host.make_unique_file_path(
                destination,
                &stem,
                host.extension_for_image_format(options.format),
            )?;

            match host.export_image_at(index, &path, &options) {
                Ok(()) => summary.exported += 1,
                Err(ApplicationError::Unsupported(reason)) => {
                    debug!(index, %reason, "image skipped");
                    summary.skipped += 1;
                }
                Err(error) => {
                    warn!(index, file = %file_name, %error, "image export failed");
                    summary.failed += 1;
                }
            }
            progress.advance(index + 1, file_name);
        }

        Ok(summary)
    }
}
