//! In-memory fakes shared by the application tests.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use export_host_domain::{
    quarter_turns, AlbumId, AlbumRecord, ExportProgress, ExportSummary, ImageFormat, ImageId,
    ImageRecord, ImageSize, MetadataMap,
};

use crate::{
    ApplicationError, CancellationToken, Clock, DecodedPixels, ExportHost, ExportManager,
    ExportPlugin, ExportRequest, ExportWindow, FileSystem, ImageCodec, NewAlbum, NewImage,
    PathUsage, PhotoLibrary, PluginRecord, PluginSettings, PluginSource, SharedProgress,
    ThumbnailOutcome, ThumbnailRenderer, ThumbnailSettings, UpsertImageResult,
};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn sample_image(id: i64, file_name: &str, width: u32, height: u32) -> ImageRecord {
    let path = format!("/photos/{file_name}");
    let format = ImageFormat::from_path(Path::new(file_name)).unwrap_or(ImageFormat::Jpeg);
    let mut exif = MetadataMap::new();
    exif.insert("CameraModel".to_string(), "X100".to_string());
    ImageRecord {
        id: ImageId::new(id).unwrap(),
        file_path: path.clone(),
        source_path: path,
        thumbnail_path: None,
        file_name: file_name.to_string(),
        title: file_name.to_string(),
        comments: String::new(),
        format,
        original_format: format,
        size: ImageSize::new(width, height),
        rotation: 0.0,
        edited: false,
        file_size: 1024,
        import_date: fixed_now(),
        capture_date: None,
        rating: 0,
        keywords: Vec::new(),
        exif,
        tiff: MetadataMap::new(),
    }
}

pub fn sample_album(id: i64, name: &str, image_ids: &[i64]) -> AlbumRecord {
    AlbumRecord {
        id: AlbumId::new(id).unwrap(),
        name: name.to_string(),
        music_path: None,
        comments: String::new(),
        image_ids: image_ids
            .iter()
            .map(|id| ImageId::new(*id).unwrap())
            .collect(),
    }
}

#[derive(Default)]
struct WorldState {
    images: Vec<ImageRecord>,
    albums: Vec<AlbumRecord>,
    plugins: Vec<PluginRecord>,
    written: BTreeMap<PathBuf, Vec<u8>>,
    directories: HashSet<PathBuf>,
    fail_exports: bool,
    available_space: u64,
    controls_enabled: bool,
    presented: Vec<String>,
}

/// One shared in-memory world implementing every port.
#[derive(Clone, Default)]
pub struct FakeWorld(Arc<Mutex<WorldState>>);

impl FakeWorld {
    fn with<T>(&self, f: impl FnOnce(&mut WorldState) -> T) -> T {
        f(&mut self.0.lock().unwrap())
    }

    pub fn add_image(&self, image: ImageRecord) {
        self.with(|world| world.images.push(image));
    }

    pub fn add_album(&self, album: AlbumRecord) {
        self.with(|world| world.albums.push(album));
    }

    pub fn add_plugin(&self, id: &str, name: &str) {
        self.add_named_plugin(id, name, Arc::new(ScriptedPlugin::default()));
    }

    pub fn add_plugin_record(&self, id: &str, plugin: Arc<dyn ExportPlugin>) {
        self.add_named_plugin(id, id, plugin);
    }

    fn add_named_plugin(&self, id: &str, name: &str, plugin: Arc<dyn ExportPlugin>) {
        self.with(|world| {
            world.plugins.push(PluginRecord {
                id: id.to_string(),
                name: name.to_string(),
                kind: "scripted".to_string(),
                source: PathBuf::new(),
                plugin,
            })
        });
    }

    pub fn add_directory(&self, path: &str) {
        self.with(|world| world.directories.insert(PathBuf::from(path)));
    }

    pub fn written_files(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.with(|world| world.written.clone())
    }

    pub fn fail_exports(&self) {
        self.with(|world| world.fail_exports = true);
    }

    pub fn set_available_space(&self, bytes: u64) {
        self.with(|world| world.available_space = bytes);
    }

    pub fn controls_enabled(&self) -> bool {
        self.with(|world| world.controls_enabled)
    }

    pub fn presented_views(&self) -> Vec<String> {
        self.with(|world| world.presented.clone())
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.with(|world| world.images.clone())
    }

    pub fn window(&self) -> Arc<dyn ExportWindow> {
        Arc::new(self.clone())
    }

    fn image_mut(world: &mut WorldState, image_id: ImageId) -> Result<&mut ImageRecord, ApplicationError> {
        world
            .images
            .iter_mut()
            .find(|image| image.id == image_id)
            .ok_or_else(|| ApplicationError::NotFound(format!("image {}", image_id.get())))
    }
}

pub fn fake_manager(world: &FakeWorld) -> ExportManager {
    ExportManager::new(
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
    )
}

impl PhotoLibrary for FakeWorld {
    fn initialize(&self) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn upsert_image(&self, image: &NewImage) -> Result<UpsertImageResult, ApplicationError> {
        self.with(|world| {
            if let Some(found) = world
                .images
                .iter()
                .find(|entry| entry.file_path == image.file_path)
            {
                return Ok(UpsertImageResult {
                    image_id: found.id,
                    inserted: false,
                });
            }
            let image_id = ImageId::new(world.images.len() as i64 + 1)?;
            world.images.push(ImageRecord {
                id: image_id,
                file_path: image.file_path.clone(),
                source_path: image.source_path.clone(),
                thumbnail_path: None,
                file_name: image.file_name.clone(),
                title: image.title.clone(),
                comments: String::new(),
                format: image.format,
                original_format: image.original_format,
                size: image.size,
                rotation: 0.0,
                edited: false,
                file_size: image.file_size,
                import_date: image.import_date,
                capture_date: image.capture_date,
                rating: 0,
                keywords: Vec::new(),
                exif: image.exif.clone(),
                tiff: image.tiff.clone(),
            });
            Ok(UpsertImageResult {
                image_id,
                inserted: true,
            })
        })
    }

    fn upsert_thumbnail(
        &self,
        image_id: ImageId,
        file_path: &str,
        _size: ImageSize,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        self.with(|world| {
            Self::image_mut(world, image_id)?.thumbnail_path = Some(file_path.to_string());
            Ok(())
        })
    }

    fn list_images(&self) -> Result<Vec<ImageRecord>, ApplicationError> {
        Ok(self.images())
    }

    fn find_image_by_id(&self, image_id: ImageId) -> Result<Option<ImageRecord>, ApplicationError> {
        Ok(self
            .images()
            .into_iter()
            .find(|image| image.id == image_id))
    }

    fn set_caption(
        &self,
        image_id: ImageId,
        title: &str,
        comments: &str,
    ) -> Result<(), ApplicationError> {
        self.with(|world| {
            let image = Self::image_mut(world, image_id)?;
            image.title = title.to_string();
            image.comments = comments.to_string();
            Ok(())
        })
    }

    fn set_rating(&self, image_id: ImageId, rating: i32) -> Result<(), ApplicationError> {
        self.with(|world| {
            Self::image_mut(world, image_id)?.rating = rating;
            Ok(())
        })
    }

    fn set_keywords(&self, image_id: ImageId, keywords: &[String]) -> Result<(), ApplicationError> {
        self.with(|world| {
            Self::image_mut(world, image_id)?.keywords = keywords.to_vec();
            Ok(())
        })
    }

    fn set_rotation(&self, image_id: ImageId, rotation: f32) -> Result<(), ApplicationError> {
        self.with(|world| {
            Self::image_mut(world, image_id)?.rotation = rotation;
            Ok(())
        })
    }

    fn create_album(
        &self,
        album: &NewAlbum,
        _created_at: DateTime<Utc>,
    ) -> Result<AlbumId, ApplicationError> {
        self.with(|world| {
            let id = AlbumId::new(world.albums.len() as i64 + 1)?;
            world.albums.push(AlbumRecord {
                id,
                name: album.name.clone(),
                music_path: album.music_path.clone(),
                comments: album.comments.clone(),
                image_ids: Vec::new(),
            });
            Ok(id)
        })
    }

    fn add_image_to_album(
        &self,
        album_id: AlbumId,
        image_id: ImageId,
    ) -> Result<(), ApplicationError> {
        self.with(|world| {
            let album = world
                .albums
                .iter_mut()
                .find(|album| album.id == album_id)
                .ok_or_else(|| ApplicationError::NotFound(format!("album {}", album_id.get())))?;
            if !album.image_ids.contains(&image_id) {
                album.image_ids.push(image_id);
            }
            Ok(())
        })
    }

    fn list_albums(&self) -> Result<Vec<AlbumRecord>, ApplicationError> {
        Ok(self.with(|world| world.albums.clone()))
    }

    fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumRecord>, ApplicationError> {
        Ok(self.with(|world| world.albums.iter().find(|album| album.name == name).cloned()))
    }
}

impl ImageCodec for FakeWorld {
    fn export_image(&self, request: &ExportRequest<'_>) -> Result<ImageSize, ApplicationError> {
        self.with(|world| {
            if world.fail_exports {
                return Err(ApplicationError::Encode("scripted encoder failure".to_string()));
            }
            let source = world
                .images
                .iter()
                .find(|image| Path::new(&image.file_path) == request.source)
                .map(|image| image.size)
                .unwrap_or_default();
            let turns = quarter_turns(request.options.rotation)? + request.source_quarter_turns;
            Ok(request.options.target_size(source.rotated(turns % 4)))
        })
    }

    fn decode(
        &self,
        _source: &Path,
        bounds: ImageSize,
        _quarter_turns: u8,
    ) -> Result<DecodedPixels, ApplicationError> {
        Ok(DecodedPixels {
            size: bounds,
            rgba: vec![0; (bounds.width * bounds.height * 4) as usize],
        })
    }
}

impl ThumbnailRenderer for FakeWorld {
    fn render(
        &self,
        _source: &Path,
        destination: &Path,
        settings: &ThumbnailSettings,
    ) -> Result<ThumbnailOutcome, ApplicationError> {
        self.with(|world| {
            world.written.insert(destination.to_path_buf(), vec![0; 16]);
        });
        Ok(ThumbnailOutcome {
            source_size: ImageSize::new(1000, 1000),
            thumbnail_size: ImageSize::new(settings.max_width, settings.max_height),
            bytes_written: 16,
        })
    }
}

impl FileSystem for FakeWorld {
    fn temporary_directory(&self) -> PathBuf {
        PathBuf::from("/tmp")
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.with(|world| world.written.contains_key(path))
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.with(|world| world.directories.contains(path))
    }

    fn create_dir(&self, path: &Path) -> Result<(), ApplicationError> {
        self.with(|world| world.directories.insert(path.to_path_buf()));
        Ok(())
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), ApplicationError> {
        self.with(|world| world.written.insert(path.to_path_buf(), bytes.to_vec()));
        Ok(())
    }

    fn count_files(&self, path: &Path, _descend: bool) -> Result<u64, ApplicationError> {
        Ok(self.with(|world| world.written.keys().filter(|file| file.starts_with(path)).count()) as u64)
    }

    fn size_at_path(&self, path: &Path, _physical: bool) -> Result<PathUsage, ApplicationError> {
        Ok(self.with(|world| {
            world
                .written
                .iter()
                .filter(|(file, _)| file.starts_with(path))
                .fold(PathUsage::default(), |usage, (_, bytes)| PathUsage {
                    bytes: usage.bytes + bytes.len() as u64,
                    files: usage.files + 1,
                })
        }))
    }

    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        Err(ApplicationError::Io(format!("not a link: {}", path.display())))
    }

    fn resolve_links(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        Ok(path.to_path_buf())
    }

    fn ensure_permissions(&self, _path: &Path, _mode: u32) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn available_space(&self, _path: &Path) -> Result<u64, ApplicationError> {
        Ok(self.with(|world| world.available_space))
    }
}

impl PluginSource for FakeWorld {
    fn discover(&self) -> Result<Vec<PluginRecord>, ApplicationError> {
        Ok(self.with(|world| world.plugins.clone()))
    }
}

impl ExportWindow for FakeWorld {
    fn set_controls_enabled(&self, enabled: bool) {
        self.with(|world| world.controls_enabled = enabled);
    }

    fn present_view(&self, plugin_name: &str) {
        self.with(|world| world.presented.push(plugin_name.to_string()));
    }

    fn show_progress(&self, _progress: &ExportProgress) {}
}

impl Clock for FakeWorld {
    fn now(&self) -> DateTime<Utc> {
        fixed_now()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Script {
    #[default]
    Fast,
    Slow,
    Failing,
}

/// Exporter whose behaviour is fixed up front.
#[derive(Debug, Default)]
pub struct ScriptedPlugin {
    script: Script,
}

impl ScriptedPlugin {
    /// Blocks until cancelled.
    pub fn slow() -> Self {
        Self {
            script: Script::Slow,
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Script::Failing,
        }
    }
}

impl ExportPlugin for ScriptedPlugin {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn settings(&self) -> PluginSettings {
        PluginSettings::default()
    }

    fn apply_settings(&self, _settings: PluginSettings) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn perform_export(
        &self,
        host: &dyn ExportHost,
        _destination: &Path,
        progress: &SharedProgress,
        cancel: &CancellationToken,
    ) -> Result<ExportSummary, ApplicationError> {
        match self.script {
            Script::Failing => Err(ApplicationError::Plugin("scripted failure".to_string())),
            Script::Slow => {
                for _ in 0..10_000 {
                    cancel.check()?;
                    thread::sleep(Duration::from_millis(1));
                }
                Err(ApplicationError::Plugin("never cancelled".to_string()))
            }
            Script::Fast => {
                let mut summary = ExportSummary::default();
                for index in 0..host.image_count() {
                    cancel.check()?;
                    progress.advance(index + 1, host.image_file_name_at(index)?);
                    summary.exported += 1;
                }
                Ok(summary)
            }
        }
    }
}
