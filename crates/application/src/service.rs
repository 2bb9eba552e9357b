use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use export_host_domain::metadata::{exif, retain_known_keys, tiff};
use export_host_domain::{
    quarter_turns, validate_rating, AlbumId, AlbumRecord, ImageRecord, ImportReport, MetadataMap,
};
use tracing::{debug, info, warn};

use crate::{
    AddToAlbumCommand, ApplicationError, BootstrapCatalogCommand, Clock, CreateAlbumCommand,
    FileScanner, ImageInspector, ImportFolderCommand, InspectedImage, ListAlbumsCommand,
    ListImagesCommand, NewAlbum, NewImage, PhotoLibrary, ScannedFile, SetCaptionCommand,
    SetKeywordsCommand, SetRatingCommand, SetRotationCommand, ThumbnailGenerator,
};

/// Library management: fills the catalog the export protocol reads from.
pub struct CatalogService {
    library: Arc<dyn PhotoLibrary>,
    scanner: Box<dyn FileScanner>,
    thumbnails: Box<dyn ThumbnailGenerator>,
    inspector: Box<dyn ImageInspector>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(
        library: Arc<dyn PhotoLibrary>,
        scanner: Box<dyn FileScanner>,
        thumbnails: Box<dyn ThumbnailGenerator>,
        inspector: Box<dyn ImageInspector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            library,
            scanner,
            thumbnails,
            inspector,
            clock,
        }
    }

    pub fn bootstrap_catalog(
        &self,
        _command: BootstrapCatalogCommand,
    ) -> Result<(), ApplicationError> {
        self.library.initialize()
    }

    pub fn import_folder(
        &self,
        command: ImportFolderCommand,
    ) -> Result<ImportReport, ApplicationError> {
        if command.folder.trim().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "folder path must not be empty".to_string(),
            ));
        }
        if command.cache_root.trim().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "cache root must not be empty".to_string(),
            ));
        }

        let scan = self.scanner.scan_supported(&command.folder)?;
        let now = self.clock.now();
        let mut report = ImportReport {
            scanned_files: scan.scanned_files,
            supported_files: scan.supported_files,
            newly_imported: 0,
        };

        for file in scan.files {
            let inspected = match self.inspector.inspect(&file.canonical_path, file.format) {
                Ok(inspected) => inspected,
                Err(error) => {
                    warn!(path = %file.canonical_path.display(), %error, "metadata unreadable");
                    InspectedImage::default()
                }
            };

            let upsert = self.library.upsert_image(&new_image(&file, inspected, now))?;
            if upsert.inserted {
                report.newly_imported += 1;
            }

            // Raw and movie sources have no decoder; they stay without a thumbnail.
            if !file.format.is_encodable() {
                debug!(path = %file.canonical_path.display(), "no thumbnail for format");
                continue;
            }
            let thumb = match self.thumbnails.ensure_thumbnail(
                &file.canonical_path,
                &command.cache_root,
                upsert.image_id,
            ) {
                Ok(thumb) => thumb,
                Err(error) => {
                    warn!(path = %file.canonical_path.display(), %error, "thumbnail failed");
                    continue;
                }
            };
            self.library
                .upsert_thumbnail(upsert.image_id, &thumb.file_path, thumb.size, now)?;
        }

        info!(
            scanned = report.scanned_files,
            supported = report.supported_files,
            imported = report.newly_imported,
            "import finished"
        );
        Ok(report)
    }

    pub fn list_images(
        &self,
        _command: ListImagesCommand,
    ) -> Result<Vec<ImageRecord>, ApplicationError> {
        self.library.list_images()
    }

    pub fn list_albums(
        &self,
        _command: ListAlbumsCommand,
    ) -> Result<Vec<AlbumRecord>, ApplicationError> {
        self.library.list_albums()
    }

    pub fn create_album(&self, command: CreateAlbumCommand) -> Result<AlbumId, ApplicationError> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "album name must not be empty".to_string(),
            ));
        }
        if self.library.find_album_by_name(name)?.is_some() {
            return Err(ApplicationError::InvalidInput(format!(
                "album already exists: {name}"
            )));
        }
        let id = self.library.create_album(
            &NewAlbum {
                name: name.to_string(),
                music_path: command.music_path,
                comments: command.comments,
            },
            self.clock.now(),
        )?;
        info!(album_id = id.get(), name, "album created");
        Ok(id)
    }

    pub fn add_to_album(&self, command: AddToAlbumCommand) -> Result<usize, ApplicationError> {
        let album = self
            .library
            .find_album_by_name(&command.album_name)?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("album not found: {}", command.album_name))
            })?;

        for image_id in &command.image_ids {
            if self.library.find_image_by_id(*image_id)?.is_none() {
                return Err(ApplicationError::NotFound(format!(
                    "image not found for id={}",
                    image_id.get()
                )));
            }
            self.library.add_image_to_album(album.id, *image_id)?;
        }
        Ok(command.image_ids.len())
    }

    pub fn set_keywords(&self, command: SetKeywordsCommand) -> Result<(), ApplicationError> {
        let mut keywords: Vec<String> = Vec::with_capacity(command.keywords.len());
        for keyword in command.keywords {
            let keyword = keyword.trim();
            if !keyword.is_empty() && !keywords.iter().any(|known| known == keyword) {
                keywords.push(keyword.to_string());
            }
        }
        self.require_image(command.image_id)?;
        self.library.set_keywords(command.image_id, &keywords)
    }

    pub fn set_rating(&self, command: SetRatingCommand) -> Result<(), ApplicationError> {
        let rating = validate_rating(command.rating)?;
        self.require_image(command.image_id)?;
        self.library.set_rating(command.image_id, rating)
    }

    pub fn set_caption(&self, command: SetCaptionCommand) -> Result<(), ApplicationError> {
        self.require_image(command.image_id)?;
        self.library
            .set_caption(command.image_id, command.title.trim(), &command.comments)
    }

    pub fn set_rotation(&self, command: SetRotationCommand) -> Result<(), ApplicationError> {
        let turns = quarter_turns(command.rotation)?;
        self.require_image(command.image_id)?;
        self.library
            .set_rotation(command.image_id, f32::from(turns) * 90.0)
    }

    fn require_image(&self, image_id: export_host_domain::ImageId) -> Result<(), ApplicationError> {
        self.library
            .find_image_by_id(image_id)?
            .map(|_| ())
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("image not found for id={}", image_id.get()))
            })
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn new_image(file: &ScannedFile, inspected: InspectedImage, now: DateTime<Utc>) -> NewImage {
    let path = file.canonical_path.to_string_lossy().to_string();
    let file_name = file
        .canonical_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let title = Path::new(&file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();

    let mut tiff_map = MetadataMap::new();
    tiff_map.insert(tiff::IMAGE_WIDTH.to_string(), inspected.size.width.to_string());
    tiff_map.insert(tiff::IMAGE_HEIGHT.to_string(), inspected.size.height.to_string());
    tiff_map.insert(tiff::FILE_NAME.to_string(), file_name.clone());
    tiff_map.insert(tiff::FILE_SIZE.to_string(), file.file_size.to_string());
    tiff_map.insert(tiff::IMPORTED_DATE.to_string(), format_date(now));
    let optional = [
        (tiff::ORIGINAL_DATE, inspected.capture_date.map(format_date)),
        (tiff::DIGITIZED_DATE, inspected.digitized_date.map(format_date)),
        (tiff::MODIFIED_DATE, inspected.modified_date.map(format_date)),
        (tiff::CAMERA_MAKER, inspected.camera_maker.clone()),
        (tiff::CAMERA_MODEL, inspected.camera_model.clone()),
        (tiff::SOFTWARE, inspected.software.clone()),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            tiff_map.insert(key.to_string(), value);
        }
    }

    let mut exif_map = inspected.exif;
    retain_known_keys(&mut exif_map, &exif::ALL);

    NewImage {
        file_path: path.clone(),
        source_path: path,
        file_name,
        title,
        format: file.format,
        original_format: file.format,
        size: inspected.size,
        file_size: file.file_size,
        import_date: now,
        capture_date: inspected.capture_date,
        exif: exif_map,
        tiff: tiff_map,
    }
}
