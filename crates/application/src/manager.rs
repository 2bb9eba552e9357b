use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use export_host_domain::{
    extension_for_format, format_for_extension, quarter_turns, AlbumId, AlbumRecord,
    ImageExportOptions, ImageFormat, ImageId, ImageRecord, ImageSize, MetadataMap,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::thumbnailer::LiveThumbnailers;
use crate::{
    paths, ApplicationError, Clock, ControllerLink, ControllerRequest, DecodedPixels,
    ExportHost, ExportRequest, FileSystem, ImageCodec, PathUsage, PhotoLibrary, PluginRecord,
    PluginSource, SessionSnapshot, ThumbnailRenderer, Thumbnailer,
};

#[derive(Debug, Clone, Default)]
struct Selection {
    images: Vec<ImageId>,
    albums: Vec<AlbumId>,
}

/// Host-side facade: owns the discovered exporters, the current selection and
/// the session snapshot that plugins query through [`ExportHost`].
pub struct ExportManager {
    library: Arc<dyn PhotoLibrary>,
    codec: Arc<dyn ImageCodec>,
    renderer: Arc<dyn ThumbnailRenderer>,
    files: Arc<dyn FileSystem>,
    plugin_source: Arc<dyn PluginSource>,
    clock: Arc<dyn Clock>,
    exporters: RwLock<Vec<PluginRecord>>,
    selection: RwLock<Selection>,
    session: RwLock<Arc<SessionSnapshot>>,
    // Held for the whole export call so concurrent calls do not interleave.
    // Callers that share the manager across threads must pair
    // `export_image_at` and `last_exported_image_size` themselves.
    last_exported: Mutex<Option<ImageSize>>,
    controller: RwLock<Option<Arc<ControllerLink>>>,
    live_thumbnailers: LiveThumbnailers,
    next_session_id: AtomicU32,
}

impl ExportManager {
    pub fn new(
        library: Arc<dyn PhotoLibrary>,
        codec: Arc<dyn ImageCodec>,
        renderer: Arc<dyn ThumbnailRenderer>,
        files: Arc<dyn FileSystem>,
        plugin_source: Arc<dyn PluginSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            library,
            codec,
            renderer,
            files,
            plugin_source,
            clock,
            exporters: RwLock::new(Vec::new()),
            selection: RwLock::new(Selection::default()),
            session: RwLock::new(Arc::new(SessionSnapshot::default())),
            last_exported: Mutex::new(None),
            controller: RwLock::new(None),
            live_thumbnailers: LiveThumbnailers::default(),
            next_session_id: AtomicU32::new(0),
        }
    }

    // ---------------------------------------------------------------------
    // Plugins
    // ---------------------------------------------------------------------

    /// Replaces the exporter list with a fresh discovery pass. Later records
    /// with an id that is already registered are ignored.
    pub fn scan_for_exporters(&self) -> Result<usize, ApplicationError> {
        let discovered = self.plugin_source.discover()?;
        let mut seen = HashSet::new();
        let mut exporters = Vec::with_capacity(discovered.len());
        for record in discovered {
            if !seen.insert(record.id.clone()) {
                warn!(id = %record.id, source = %record.source.display(), "duplicate exporter ignored");
                continue;
            }
            debug!(id = %record.id, name = %record.name, kind = %record.kind, "exporter registered");
            exporters.push(record);
        }

        let count = exporters.len();
        *self
            .exporters
            .write()
            .map_err(|_| ApplicationError::lock_poisoned("exporters"))? = exporters;
        info!(count, "exporter scan finished");
        Ok(count)
    }

    pub fn plugin_count(&self) -> usize {
        self.exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn plugin_record_at(&self, index: usize) -> Result<PluginRecord, ApplicationError> {
        let exporters = self
            .exporters
            .read()
            .map_err(|_| ApplicationError::lock_poisoned("exporters"))?;
        exporters
            .get(index)
            .cloned()
            .ok_or(ApplicationError::IndexOutOfRange {
                index,
                count: exporters.len(),
            })
    }

    pub fn plugin_records(&self) -> Vec<PluginRecord> {
        self.exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find_plugin(&self, id: &str) -> Option<(usize, PluginRecord)> {
        self.exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .enumerate()
            .find(|(_, record)| record.id == id)
            .map(|(index, record)| (index, record.clone()))
    }

    pub fn release_plugins(&self) {
        let mut exporters = self.exporters.write().unwrap_or_else(PoisonError::into_inner);
        debug!(count = exporters.len(), "releasing exporters");
        exporters.clear();
    }

    // ---------------------------------------------------------------------
    // Selection and session snapshot
    // ---------------------------------------------------------------------

    pub fn set_selection(&self, images: Vec<ImageId>) {
        self.selection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .images = images;
    }

    pub fn set_selected_albums(&self, albums: Vec<AlbumId>) {
        self.selection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .albums = albums;
    }

    pub fn selected_albums(&self) -> Vec<AlbumId> {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .albums
            .clone()
    }

    /// Rebuilds the session snapshot from the library. Explicitly selected
    /// images win; otherwise the selected albums' images are used in album
    /// order; with no selection at all, every image is exported.
    pub fn update_selection(&self) -> Result<usize, ApplicationError> {
        let selection = self
            .selection
            .read()
            .map_err(|_| ApplicationError::lock_poisoned("selection"))?
            .clone();
        let all_images = self.library.list_images()?;
        let albums = self.library.list_albums()?;

        let ids: Vec<ImageId> = if !selection.images.is_empty() {
            selection.images.clone()
        } else if !selection.albums.is_empty() {
            let mut seen = HashSet::new();
            selection
                .albums
                .iter()
                .map(|album_id| {
                    albums
                        .iter()
                        .find(|album| album.id == *album_id)
                        .ok_or_else(|| {
                            ApplicationError::NotFound(format!(
                                "album not found for id={}",
                                album_id.get()
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flat_map(|album| album.image_ids.iter().copied())
                .filter(|id| seen.insert(*id))
                .collect()
        } else {
            all_images.iter().map(|image| image.id).collect()
        };

        let images = ids
            .iter()
            .map(|id| {
                all_images
                    .iter()
                    .find(|image| image.id == *id)
                    .cloned()
                    .ok_or_else(|| {
                        ApplicationError::NotFound(format!("image not found for id={}", id.get()))
                    })
            })
            .collect::<Result<Vec<ImageRecord>, _>>()?;

        let count = images.len();
        let snapshot = Arc::new(SessionSnapshot::new(images, albums));
        *self
            .session
            .write()
            .map_err(|_| ApplicationError::lock_poisoned("session"))? = snapshot;
        debug!(images = count, "session snapshot updated");
        Ok(count)
    }

    pub fn session(&self) -> Arc<SessionSnapshot> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First selected album, if any.
    pub fn current_album(&self) -> Result<Option<AlbumRecord>, ApplicationError> {
        let Some(album_id) = self.selected_albums().first().copied() else {
            return Ok(None);
        };
        Ok(self
            .session()
            .albums()
            .iter()
            .find(|album| album.id == album_id)
            .cloned())
    }

    /// Sum of the session's file sizes, used to check free disk space.
    pub fn estimated_export_bytes(&self) -> u64 {
        self.session()
            .images()
            .iter()
            .map(|image| image.file_size)
            .sum()
    }

    pub(crate) fn next_session_id(&self) -> u32 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ---------------------------------------------------------------------
    // Controller wiring
    // ---------------------------------------------------------------------

    pub fn set_export_controller(&self, link: Arc<ControllerLink>) {
        *self.controller.write().unwrap_or_else(PoisonError::into_inner) = Some(link);
    }

    pub fn export_controller(&self) -> Option<Arc<ControllerLink>> {
        self.controller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_controller(&self, action: &str, f: impl FnOnce(&ControllerLink)) {
        match self.export_controller() {
            Some(link) => f(&link),
            None => warn!(action, "no export controller attached"),
        }
    }

    // ---------------------------------------------------------------------
    // Filesystem helpers
    // ---------------------------------------------------------------------

    pub fn temporary_directory(&self) -> PathBuf {
        self.files.temporary_directory()
    }

    pub fn does_directory_exist(&self, path: &Path) -> bool {
        self.files.directory_exists(path)
    }

    pub fn unique_sub_path(&self, parent: &Path, child: &str) -> Result<PathBuf, ApplicationError> {
        paths::unique_sub_path(self.files.as_ref(), parent, child)
    }

    pub fn make_unique_path(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        paths::make_unique_path(self.files.as_ref(), path)
    }

    pub fn make_unique_file_name_with_time(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        paths::make_unique_file_name_with_time(self.files.as_ref(), path, self.clock.now())
    }

    pub fn count_files(&self, path: &Path, descend: bool) -> Result<u64, ApplicationError> {
        self.files.count_files(path, descend)
    }

    pub fn count_files_from_array(
        &self,
        paths: &[PathBuf],
        descend: bool,
    ) -> Result<u64, ApplicationError> {
        paths
            .iter()
            .map(|path| self.files.count_files(path, descend))
            .sum()
    }

    pub fn size_at_path(&self, path: &Path, physical: bool) -> Result<PathUsage, ApplicationError> {
        self.files.size_at_path(path, physical)
    }

    pub fn is_alias_file_at_path(&self, path: &Path) -> bool {
        self.files.is_symlink(path)
    }

    pub fn path_content_of_alias_at_path(&self, path: &Path) -> Result<PathBuf, ApplicationError> {
        self.files.read_link(path)
    }

    pub fn string_by_resolving_aliases_in_path(
        &self,
        path: &Path,
    ) -> Result<PathBuf, ApplicationError> {
        self.files.resolve_links(path)
    }

    pub fn ensure_permissions(&self, path: &Path, mode: u32) -> Result<(), ApplicationError> {
        self.files.ensure_permissions(path, mode)
    }

    pub fn available_space(&self, path: &Path) -> Result<u64, ApplicationError> {
        self.files.available_space(path)
    }

    // ---------------------------------------------------------------------
    // Imaging
    // ---------------------------------------------------------------------

    /// Decodes an image to RGBA pixels bounded by `bounds` (zero = unbounded).
    pub fn uncompress_image(
        &self,
        path: &Path,
        bounds: ImageSize,
        rotation: f32,
    ) -> Result<DecodedPixels, ApplicationError> {
        let turns = quarter_turns(rotation)?;
        self.codec.decode(path, bounds, turns)
    }

    /// Thumbnailers created by this manager and not yet released.
    pub fn live_thumbnailers(&self) -> usize {
        self.live_thumbnailers.count()
    }

    fn write_metadata_sidecar(
        &self,
        image: &ImageRecord,
        destination: &Path,
        options: &ImageExportOptions,
    ) -> Result<PathBuf, ApplicationError> {
        let mut payload = serde_json::Map::new();
        if options.metadata.includes_exif() {
            payload.insert("exif".to_string(), json!(image.exif));
        }
        if options.metadata.includes_iptc() {
            payload.insert(
                "iptc".to_string(),
                json!({
                    "title": image.title,
                    "caption": image.comments,
                    "keywords": image.keywords,
                    "rating": image.rating,
                }),
            );
        }
        let bytes = serde_json::to_vec_pretty(&payload)
            .map_err(|error| ApplicationError::Encode(error.to_string()))?;

        let path = sidecar_path(destination);
        self.files.write_bytes(&path, &bytes)?;
        Ok(path)
    }
}

/// `<destination>.metadata.json`
pub fn sidecar_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".metadata.json");
    PathBuf::from(name)
}

impl ExportHost for ExportManager {
    fn image_count(&self) -> usize {
        self.session().image_count()
    }

    fn image_size_at(&self, index: usize) -> Result<ImageSize, ApplicationError> {
        Ok(self.session().image(index)?.display_size())
    }

    fn image_format_at(&self, index: usize) -> Result<ImageFormat, ApplicationError> {
        Ok(self.session().image(index)?.format)
    }

    fn original_image_format_at(&self, index: usize) -> Result<ImageFormat, ApplicationError> {
        Ok(self.session().image(index)?.original_format)
    }

    fn original_is_raw_at(&self, index: usize) -> Result<bool, ApplicationError> {
        Ok(self.session().image(index)?.original_format.is_raw())
    }

    fn original_is_movie_at(&self, index: usize) -> Result<bool, ApplicationError> {
        Ok(self.session().image(index)?.original_format.is_movie())
    }

    fn image_title_at(&self, index: usize) -> Result<String, ApplicationError> {
        Ok(self.session().image(index)?.title.clone())
    }

    fn image_comments_at(&self, index: usize) -> Result<String, ApplicationError> {
        Ok(self.session().image(index)?.comments.clone())
    }

    fn image_rotation_at(&self, index: usize) -> Result<f32, ApplicationError> {
        Ok(self.session().image(index)?.rotation)
    }

    fn image_path_at(&self, index: usize) -> Result<PathBuf, ApplicationError> {
        Ok(PathBuf::from(&self.session().image(index)?.file_path))
    }

    fn source_path_at(&self, index: usize) -> Result<PathBuf, ApplicationError> {
        Ok(PathBuf::from(&self.session().image(index)?.source_path))
    }

    fn thumbnail_path_at(&self, index: usize) -> Result<Option<PathBuf>, ApplicationError> {
        Ok(self
            .session()
            .image(index)?
            .thumbnail_path
            .as_ref()
            .map(PathBuf::from))
    }

    fn image_file_name_at(&self, index: usize) -> Result<String, ApplicationError> {
        Ok(self.session().image(index)?.file_name.clone())
    }

    fn image_is_edited_at(&self, index: usize) -> Result<bool, ApplicationError> {
        Ok(self.session().image(index)?.edited)
    }

    fn image_is_portrait_at(&self, index: usize) -> Result<bool, ApplicationError> {
        Ok(self.session().image(index)?.is_portrait())
    }

    fn image_aspect_ratio_at(&self, index: usize) -> Result<f32, ApplicationError> {
        Ok(self.session().image(index)?.aspect_ratio())
    }

    fn image_file_size_at(&self, index: usize) -> Result<u64, ApplicationError> {
        Ok(self.session().image(index)?.file_size)
    }

    fn image_date_at(&self, index: usize) -> Result<DateTime<Utc>, ApplicationError> {
        Ok(self.session().image(index)?.date())
    }

    fn image_rating_at(&self, index: usize) -> Result<i32, ApplicationError> {
        Ok(self.session().image(index)?.rating)
    }

    fn image_tiff_properties_at(&self, index: usize) -> Result<MetadataMap, ApplicationError> {
        Ok(self.session().image(index)?.tiff.clone())
    }

    fn image_exif_properties_at(&self, index: usize) -> Result<MetadataMap, ApplicationError> {
        Ok(self.session().image(index)?.exif.clone())
    }

    fn image_keywords_at(&self, index: usize) -> Result<Vec<String>, ApplicationError> {
        Ok(self.session().image(index)?.keywords.clone())
    }

    fn albums_of_image_at(&self, index: usize) -> Result<Vec<String>, ApplicationError> {
        self.session().albums_of(index)
    }

    fn extension_for_image_format(&self, format: ImageFormat) -> &'static str {
        extension_for_format(format)
    }

    fn image_format_for_extension(&self, extension: &str) -> Option<ImageFormat> {
        format_for_extension(extension)
    }

    fn album_count(&self) -> usize {
        self.session().album_count()
    }

    fn album_name_at(&self, album: usize) -> Result<String, ApplicationError> {
        Ok(self.session().album(album)?.name.clone())
    }

    fn album_music_path_at(&self, album: usize) -> Result<Option<PathBuf>, ApplicationError> {
        Ok(self
            .session()
            .album(album)?
            .music_path
            .as_ref()
            .map(PathBuf::from))
    }

    fn album_comments_at(&self, album: usize) -> Result<String, ApplicationError> {
        Ok(self.session().album(album)?.comments.clone())
    }

    fn position_of_image_in_album(
        &self,
        index: usize,
        album: usize,
    ) -> Result<Option<usize>, ApplicationError> {
        self.session().position_in_album(index, album)
    }

    fn enable_controls(&self) {
        self.with_controller("enable controls", ControllerLink::enable_controls);
    }

    fn disable_controls(&self) {
        self.with_controller("disable controls", ControllerLink::disable_controls);
    }

    fn click_export(&self) {
        self.with_controller("click export", |link| {
            link.request(ControllerRequest::ClickExport)
        });
    }

    fn start_export(&self) {
        self.with_controller("start export", |link| {
            link.request(ControllerRequest::StartExport)
        });
    }

    fn cancel_export_before_beginning(&self) -> Result<(), ApplicationError> {
        let link = self.export_controller().ok_or_else(|| {
            ApplicationError::State("no export controller attached".to_string())
        })?;
        link.cancel_before_beginning()
    }

    fn directory_path(&self) -> Option<PathBuf> {
        self.export_controller()
            .and_then(|link| link.directory_path())
    }

    fn session_id(&self) -> u32 {
        self.export_controller()
            .map(|link| link.session_id())
            .unwrap_or_default()
    }

    fn export_image_at(
        &self,
        index: usize,
        destination: &Path,
        options: &ImageExportOptions,
    ) -> Result<(), ApplicationError> {
        options.validate()?;
        let session = self.session();
        let image = session.image(index)?;
        if image.format.is_movie() {
            return Err(ApplicationError::Unsupported(format!(
                "movies cannot be re-encoded: {}",
                image.file_path
            )));
        }

        let mut last = self
            .last_exported
            .lock()
            .map_err(|_| ApplicationError::lock_poisoned("last export"))?;
        *last = None;

        let source = PathBuf::from(&image.file_path);
        let size = self.codec.export_image(&ExportRequest {
            source: &source,
            destination,
            options,
            source_quarter_turns: quarter_turns(image.rotation).unwrap_or(0),
        })?;

        if !options.metadata.is_none() {
            let sidecar = self.write_metadata_sidecar(image, destination, options)?;
            debug!(sidecar = %sidecar.display(), "metadata sidecar written");
        }

        debug!(
            index,
            destination = %destination.display(),
            width = size.width,
            height = size.height,
            "image exported"
        );
        *last = Some(size);
        Ok(())
    }

    fn last_exported_image_size(&self) -> Option<ImageSize> {
        *self
            .last_exported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn create_thumbnailer(&self) -> Thumbnailer {
        Thumbnailer::new(Arc::clone(&self.renderer), &self.live_thumbnailers)
    }

    fn does_file_exist(&self, path: &Path) -> bool {
        self.files.file_exists(path)
    }

    fn create_dir(&self, path: &Path) -> Result<(), ApplicationError> {
        self.files.create_dir(path)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), ApplicationError> {
        self.files.write_bytes(path, bytes)
    }

    fn valid_filename(&self, name: &str) -> String {
        paths::valid_filename(name)
    }

    fn make_unique_file_path(
        &self,
        directory: &Path,
        stem: &str,
        extension: &str,
    ) -> Result<PathBuf, ApplicationError> {
        paths::make_unique_file_path(self.files.as_ref(), directory, stem, extension)
    }
}
