use std::fmt::Write as _;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use export_host_application::{
    ApplicationError, CancellationToken, ExportHost, ExportPlugin, PluginSettings, SharedProgress,
};
use export_host_domain::{ExportSummary, ImageFormat, ImageSize};
use tracing::{debug, info, warn};

use super::files::output_stem;

const IMAGES_DIR: &str = "images";
const THUMBS_DIR: &str = "thumbnails";
const DEFAULT_TITLE: &str = "Photos";

struct GalleryEntry {
    image: String,
    thumbnail: String,
    title: String,
    comments: String,
    size: ImageSize,
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            ch => escaped.push(ch),
        }
    }
    escaped
}

fn render_page(title: &str, entries: &[GalleryEntry]) -> String {
    let title = escape_html(title);
    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html lang=\"en\">");
    let _ = writeln!(html, "<head>");
    let _ = writeln!(html, "<meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(
        html,
        "<style>body{{font-family:sans-serif;background:#222;color:#eee}}\
         figure{{display:inline-block;margin:8px;text-align:center}}\
         img{{border:1px solid #555}}</style>"
    );
    let _ = writeln!(html, "</head>");
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "<h1>{title}</h1>");
    for entry in entries {
        let _ = writeln!(
            html,
            "<figure><a href=\"{}\"><img src=\"{}\" alt=\"{}\"></a>\
             <figcaption>{}<br><small>{} &times; {}</small>{}</figcaption></figure>",
            escape_html(&entry.image),
            escape_html(&entry.thumbnail),
            escape_html(&entry.title),
            escape_html(&entry.title),
            entry.size.width,
            entry.size.height,
            if entry.comments.is_empty() {
                String::new()
            } else {
                format!("<p>{}</p>", escape_html(&entry.comments))
            },
        );
    }
    let _ = writeln!(html, "</body>");
    let _ = writeln!(html, "</html>");
    html
}

fn relative(dir: &str, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{dir}/{file_name}")
}

/// Exports images and thumbnails plus an `index.html` gallery.
pub struct WebPageExporter {
    name: String,
    settings: RwLock<PluginSettings>,
}

impl WebPageExporter {
    pub fn new(name: impl Into<String>, settings: PluginSettings) -> Self {
        Self {
            name: name.into(),
            settings: RwLock::new(settings),
        }
    }
}

impl ExportPlugin for WebPageExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_directory_name(&self) -> Option<String> {
        Some("Web Page".to_string())
    }

    fn settings(&self) -> PluginSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply_settings(&self, settings: PluginSettings) -> Result<(), ApplicationError> {
        settings.export_options(ImageFormat::Jpeg)?;
        if settings.thumbnail_size == 0 {
            return Err(ApplicationError::InvalidInput(
                "thumbnail size must be positive".to_string(),
            ));
        }
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
        let images_dir = destination.join(IMAGES_DIR);
        let thumbs_dir = destination.join(THUMBS_DIR);
        host.create_dir(&images_dir)?;
        host.create_dir(&thumbs_dir)?;

        let thumbnailer = host.create_thumbnailer();
        thumbnailer.set_max_bounds(0, settings.thumbnail_size, settings.thumbnail_size);
        thumbnailer.set_output_format(ImageFormat::Jpeg)?;

        let mut summary = ExportSummary::default();
        let mut entries = Vec::new();
        for index in 0..host.image_count() {
            cancel.check()?;
            let file_name = host.image_file_name_at(index)?;
            if host.original_is_movie_at(index)? {
                summary.skipped += 1;
                progress.advance(index + 1, format!("skipped {file_name}"));
                continue;
            }

            let mut options = settings.export_options(host.image_format_at(index)?)?;
            // Browsers cannot show every encodable format.
            if matches!(options.format, ImageFormat::Tiff | ImageFormat::Bmp) {
                options.format = ImageFormat::Jpeg;
            }
            let stem = output_stem(host, &settings, index)?;
            let image_path = host.make_unique_file_path(
                &images_dir,
                &stem,
                host.extension_for_image_format(options.format),
            )?;
            match host.export_image_at(index, &image_path, &options) {
                Ok(()) => {}
                Err(ApplicationError::Unsupported(reason)) => {
                    debug!(index, %reason, "gallery image skipped");
                    summary.skipped += 1;
                    progress.advance(index + 1, format!("skipped {file_name}"));
                    continue;
                }
                Err(error) => {
                    warn!(index, file = %file_name, %error, "gallery image failed");
                    summary.failed += 1;
                    progress.advance(index + 1, file_name);
                    continue;
                }
            }
            let size = host.last_exported_image_size().unwrap_or_default();

            let thumb_path = host.make_unique_file_path(&thumbs_dir, &stem, "jpg")?;
            thumbnailer.set_rotation(host.image_rotation_at(index)?)?;
            if let Err(error) = thumbnailer.create_thumbnail(&host.image_path_at(index)?, &thumb_path)
            {
                warn!(index, file = %file_name, %error, "gallery thumbnail failed");
                summary.failed += 1;
                progress.advance(index + 1, file_name);
                continue;
            }

            entries.push(GalleryEntry {
                image: relative(IMAGES_DIR, &image_path),
                thumbnail: relative(THUMBS_DIR, &thumb_path),
                title: host.image_title_at(index)?,
                comments: host.image_comments_at(index)?,
                size,
            });
            summary.exported += 1;
            progress.advance(index + 1, file_name);
        }

        cancel.check()?;
        let title = settings
            .page_title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let page = destination.join("index.html");
        host.write_file(&page, render_page(&title, &entries).as_bytes())?;
        debug!(entries = entries.len(), "gallery page rendered");
        info!(page = %page.display(), "web page written");
        Ok(summary)
    }
}
