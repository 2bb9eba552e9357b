mod files;
mod web;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use export_host_application::{
    ApplicationError, ExportPlugin, PluginRecord, PluginSettings, PluginSource,
};
use serde::Deserialize;
use tracing::{debug, warn};

pub use files::FilesExporter;
pub use web::WebPageExporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    Files,
    WebPage,
}

impl PluginKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::WebPage => "web-page",
        }
    }

    fn instantiate(self, name: &str, settings: PluginSettings) -> Arc<dyn ExportPlugin> {
        match self {
            Self::Files => Arc::new(FilesExporter::new(name, settings)),
            Self::WebPage => Arc::new(WebPageExporter::new(name, settings)),
        }
    }
}

/// `*.json` plugin manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub kind: PluginKind,
    #[serde(default)]
    pub settings: PluginSettings,
}

impl PluginManifest {
    pub fn from_path(path: &Path) -> Result<Self, ApplicationError> {
        let text = fs::read_to_string(path)
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", path.display())))?;
        let manifest: Self = serde_json::from_str(&text)
            .map_err(|error| ApplicationError::Plugin(format!("{}: {error}", path.display())))?;
        if manifest.id.trim().is_empty() || manifest.name.trim().is_empty() {
            return Err(ApplicationError::Plugin(format!(
                "{}: id and name must not be empty",
                path.display()
            )));
        }
        // The plugin's own settings checks decide whether the manifest is usable.
        manifest
            .kind
            .instantiate(&manifest.name, PluginSettings::default())
            .apply_settings(manifest.settings.clone())
            .map_err(|error| ApplicationError::Plugin(format!("{}: {error}", path.display())))?;
        Ok(manifest)
    }

    fn into_record(self, source: PathBuf) -> PluginRecord {
        PluginRecord {
            plugin: self.kind.instantiate(&self.name, self.settings),
            id: self.id,
            name: self.name,
            kind: self.kind.as_str().to_string(),
            source,
        }
    }
}

fn builtin(id: &str, name: &str, kind: PluginKind) -> PluginRecord {
    PluginRecord {
        id: id.to_string(),
        name: name.to_string(),
        kind: kind.as_str().to_string(),
        source: PathBuf::new(),
        plugin: kind.instantiate(name, PluginSettings::default()),
    }
}

/// Built-in exporters followed by manifests found in the plugin directories.
#[derive(Debug, Clone)]
pub struct ManifestPluginSource {
    directories: Vec<PathBuf>,
    include_builtins: bool,
}

impl ManifestPluginSource {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            include_builtins: true,
        }
    }

    pub fn without_builtins(mut self) -> Self {
        self.include_builtins = false;
        self
    }

    fn manifests_in(directory: &Path) -> Result<Vec<PathBuf>, ApplicationError> {
        let mut paths = Vec::new();
        let entries = fs::read_dir(directory)
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", directory.display())))?;
        for entry in entries {
            let path = entry
                .map_err(|error| ApplicationError::Io(error.to_string()))?
                .path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl PluginSource for ManifestPluginSource {
    fn discover(&self) -> Result<Vec<PluginRecord>, ApplicationError> {
        let mut records = Vec::new();
        if self.include_builtins {
            records.push(builtin("builtin.files", "Files", PluginKind::Files));
            records.push(builtin("builtin.web-page", "Web Page", PluginKind::WebPage));
        }

        for directory in &self.directories {
            if !directory.is_dir() {
                debug!(directory = %directory.display(), "plugin directory missing");
                continue;
            }
            for path in Self::manifests_in(directory)? {
                match PluginManifest::from_path(&path) {
                    Ok(manifest) => {
                        debug!(id = %manifest.id, path = %path.display(), "manifest loaded");
                        records.push(manifest.into_record(path));
                    }
                    Err(error) => warn!(%error, "plugin manifest ignored"),
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use export_host_application::{
        CatalogService, ExportController, ExportHost, ExportManager, ExportWindow, FileNaming,
        ImportFolderCommand,
    };
    use export_host_domain::{ExportProgress, ExportQuality, ExportState, ImageFormat};
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        CacheThumbnailGenerator, ExifImageInspector, ImageCrateCodec,
        ImageCrateThumbnailRenderer, LocalFileSystem, SqlitePhotoLibrary, SystemClock,
        WalkdirFileScanner,
    };

    struct SilentWindow;

    impl ExportWindow for SilentWindow {
        fn set_controls_enabled(&self, _enabled: bool) {}

        fn present_view(&self, _plugin_name: &str) {}

        fn show_progress(&self, _progress: &ExportProgress) {}
    }

    fn write_manifest(dir: &Path, file: &str, body: &str) {
        fs::write(dir.join(file), body).expect("manifest");
    }

    #[test]
    fn discovery_skips_invalid_manifests_and_unknown_kinds() {
        let dir = TempDir::new().expect("tempdir");
        write_manifest(
            dir.path(),
            "a.json",
            r#"{"id":"acme.web","name":"Acme Web","kind":"web-page","settings":{"thumbnail_size":120}}"#,
        );
        write_manifest(dir.path(), "b.json", r#"{"id":"x","name":"X","kind":"slideshow"}"#);
        write_manifest(dir.path(), "c.json", "{ not json");
        write_manifest(dir.path(), "d.txt", r#"{"id":"t","name":"T","kind":"files"}"#);
        write_manifest(dir.path(), "e.json", r#"{"id":" ","name":"Blank","kind":"files"}"#);
        write_manifest(
            dir.path(),
            "f.json",
            r#"{"id":"zero","name":"Zero","kind":"web-page","settings":{"thumbnail_size":0}}"#,
        );
        write_manifest(
            dir.path(),
            "g.json",
            r#"{"id":"xmp","name":"Xmp","kind":"files","settings":{"metadata":"xmp"}}"#,
        );

        let records = ManifestPluginSource::new(vec![
            dir.path().to_path_buf(),
            dir.path().join("missing"),
        ])
        .discover()
        .expect("discover");

        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["builtin.files", "builtin.web-page", "acme.web"]);
        assert_eq!(records[2].kind, "web-page");
        assert_eq!(records[2].plugin.name(), "Acme Web");
        assert_eq!(records[2].plugin.settings().thumbnail_size, 120);
        assert_eq!(records[2].source, dir.path().join("a.json"));
    }

    #[test]
    fn manifest_settings_are_checked_when_loaded() {
        let dir = TempDir::new().expect("tempdir");
        write_manifest(
            dir.path(),
            "bad.json",
            r#"{"id":"bad","name":"Bad","kind":"files","settings":{"rotation":45.0}}"#,
        );
        let result = PluginManifest::from_path(&dir.path().join("bad.json"));
        assert!(matches!(result, Err(ApplicationError::Plugin(_))));
    }

    #[test]
    fn builtins_can_be_disabled() {
        let records = ManifestPluginSource::new(Vec::new())
            .without_builtins()
            .discover()
            .expect("discover");
        assert!(records.is_empty());
    }

    struct Harness {
        _dir: TempDir,
        out: PathBuf,
        manager: Arc<ExportManager>,
    }

    fn harness() -> Harness {
        harness_with_raw(false)
    }

    fn harness_with_raw(raw: bool) -> Harness {
        let dir = TempDir::new().expect("tempdir");
        let photos = dir.path().join("photos");
        let out = dir.path().join("out");
        fs::create_dir_all(&photos).expect("photos");
        fs::create_dir_all(&out).expect("out");
        ImageBuffer::from_fn(320, 200, |x, _y| Rgb([x as u8, 90_u8, 200_u8]))
            .save(photos.join("beach.png"))
            .expect("save");
        ImageBuffer::from_fn(120, 240, |_x, y| Rgb([10_u8, y as u8, 30_u8]))
            .save(photos.join("tower.jpg"))
            .expect("save");
        fs::write(photos.join("clip.mov"), b"movie").expect("movie");
        if raw {
            fs::write(photos.join("shot.cr2"), b"not really raw").expect("raw");
        }

        let library = Arc::new(SqlitePhotoLibrary::new(dir.path().join("catalog.sqlite3")));
        let renderer = Arc::new(ImageCrateThumbnailRenderer);
        let clock = Arc::new(SystemClock);
        let catalog = CatalogService::new(
            library.clone(),
            Box::new(WalkdirFileScanner),
            Box::new(CacheThumbnailGenerator::new(renderer.clone())),
            Box::new(ExifImageInspector),
            clock.clone(),
        );
        catalog
            .bootstrap_catalog(Default::default())
            .expect("bootstrap");
        catalog
            .import_folder(ImportFolderCommand {
                folder: photos.to_string_lossy().to_string(),
                cache_root: dir.path().join("cache").to_string_lossy().to_string(),
            })
            .expect("import");

        let manager = Arc::new(ExportManager::new(
            library,
            Arc::new(ImageCrateCodec),
            renderer,
            Arc::new(LocalFileSystem),
            Arc::new(ManifestPluginSource::new(Vec::new())),
            clock,
        ));
        manager.scan_for_exporters().expect("scan");
        Harness {
            _dir: dir,
            out,
            manager,
        }
    }

    fn run(harness: &Harness, plugin_id: &str) -> export_host_application::ExportOutcome {
        let mut controller =
            ExportController::new(Arc::clone(&harness.manager), Arc::new(SilentWindow));
        controller
            .select_exporter_by_id(plugin_id)
            .expect("select");
        controller.set_directory_path(Some(harness.out.clone()));
        controller.click_export().expect("click");
        controller.wait(Duration::from_millis(5)).expect("outcome")
    }

    #[test]
    fn files_exporter_writes_each_still_image() {
        let harness = harness();
        let (_, record) = harness.manager.find_plugin("builtin.files").expect("files");
        let mut settings = record.plugin.settings();
        settings.format = Some(ImageFormat::Jpeg);
        settings.quality = ExportQuality::Low;
        settings.width = 100;
        settings.naming = FileNaming::Sequence;
        settings.name_prefix = "trip".to_string();
        settings.metadata = "iptc".to_string();
        record.plugin.apply_settings(settings).expect("settings");

        let outcome = run(&harness, "builtin.files");
        assert_eq!(outcome.state, ExportState::Completed);
        let summary = outcome.summary.expect("summary");
        assert_eq!(summary.exported, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);

        let mut written: Vec<String> = fs::read_dir(&harness.out)
            .expect("read out")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        written.sort();
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|name| name.starts_with("trip-")));
        assert_eq!(
            written
                .iter()
                .filter(|name| name.ends_with(".metadata.json"))
                .count(),
            2
        );
        for name in written.iter().filter(|name| name.ends_with(".jpg")) {
            let (width, _) = image::image_dimensions(harness.out.join(name)).expect("dims");
            assert!(width <= 100);
        }
    }

    #[test]
    fn web_page_exporter_builds_gallery() {
        let harness = harness();
        let outcome = run(&harness, "builtin.web-page");
        assert_eq!(outcome.state, ExportState::Completed);
        assert_eq!(outcome.summary.expect("summary").exported, 2);

        let page = fs::read_to_string(harness.out.join("index.html")).expect("index");
        assert!(page.contains("images/beach.png"));
        assert!(page.contains("thumbnails/tower.jpg"));
        assert!(harness.out.join("thumbnails/beach.jpg").is_file());
        assert_eq!(harness.manager.live_thumbnailers(), 0);
        assert_eq!(harness.manager.image_count(), 3);
    }

    #[test]
    fn web_page_exporter_skips_raw_sources() {
        let harness = harness_with_raw(true);
        let outcome = run(&harness, "builtin.web-page");
        assert_eq!(outcome.state, ExportState::Completed);
        let summary = outcome.summary.expect("summary");
        assert_eq!(summary.exported, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);

        let page = fs::read_to_string(harness.out.join("index.html")).expect("index");
        assert!(!page.contains("shot"));
    }
}
