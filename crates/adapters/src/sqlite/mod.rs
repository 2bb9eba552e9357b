mod queries;

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use export_host_application::{
    ApplicationError, NewAlbum, NewImage, PhotoLibrary, UpsertImageResult,
};
use export_host_domain::{AlbumId, AlbumRecord, ImageId, ImageRecord, ImageSize};
use rusqlite::Connection;
use tracing::debug;

use crate::migrations::MIGRATIONS;
use queries::ImageColumn;

fn persistence(error: impl ToString) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Photo library stored in a single SQLite file. Each call opens its own
/// connection, so the library can be shared with the export thread.
#[derive(Debug, Clone)]
pub struct SqlitePhotoLibrary {
    path: PathBuf,
}

impl SqlitePhotoLibrary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open_connection(&self) -> Result<Connection, ApplicationError> {
        let conn = Connection::open(&self.path).map_err(persistence)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(persistence)?;
        Ok(conn)
    }

    fn require_changed(changed: usize, image_id: ImageId) -> Result<(), ApplicationError> {
        if changed == 0 {
            return Err(ApplicationError::NotFound(format!(
                "image not found for id={}",
                image_id.get()
            )));
        }
        Ok(())
    }

    fn update(
        &self,
        image_id: ImageId,
        column: ImageColumn,
        value: &dyn rusqlite::ToSql,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed =
            queries::update_image_column(&conn, image_id.get(), column, value).map_err(persistence)?;
        Self::require_changed(changed, image_id)
    }
}

impl PhotoLibrary for SqlitePhotoLibrary {
    fn initialize(&self) -> Result<(), ApplicationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "catalog path must not be empty".to_string(),
            ));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|error| ApplicationError::Io(error.to_string()))?;
            }
        }

        let conn = self.open_connection()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(persistence)?;
        for migration in MIGRATIONS {
            conn.execute_batch(migration).map_err(persistence)?;
        }
        debug!(path = %self.path.display(), "catalog schema ready");
        Ok(())
    }

    fn upsert_image(&self, image: &NewImage) -> Result<UpsertImageResult, ApplicationError> {
        let conn = self.open_connection()?;
        let (id, inserted) = queries::upsert_image(&conn, image).map_err(persistence)?;
        Ok(UpsertImageResult {
            image_id: ImageId::new(id)?,
            inserted,
        })
    }

    fn upsert_thumbnail(
        &self,
        image_id: ImageId,
        file_path: &str,
        size: ImageSize,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        queries::upsert_thumbnail(
            &conn,
            image_id.get(),
            file_path,
            size.width,
            size.height,
            &queries::encode_date(updated_at),
        )
        .map_err(persistence)
    }

    fn list_images(&self) -> Result<Vec<ImageRecord>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::list_images(&conn).map_err(persistence)
    }

    fn find_image_by_id(&self, image_id: ImageId) -> Result<Option<ImageRecord>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::find_image_by_id(&conn, image_id.get()).map_err(persistence)
    }

    fn set_caption(
        &self,
        image_id: ImageId,
        title: &str,
        comments: &str,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed =
            queries::set_caption(&conn, image_id.get(), title, comments).map_err(persistence)?;
        Self::require_changed(changed, image_id)
    }

    fn set_rating(&self, image_id: ImageId, rating: i32) -> Result<(), ApplicationError> {
        self.update(image_id, ImageColumn::Rating, &rating)
    }

    fn set_keywords(&self, image_id: ImageId, keywords: &[String]) -> Result<(), ApplicationError> {
        let json = serde_json::to_string(keywords).map_err(persistence)?;
        self.update(image_id, ImageColumn::Keywords, &json)
    }

    fn set_rotation(&self, image_id: ImageId, rotation: f32) -> Result<(), ApplicationError> {
        self.update(image_id, ImageColumn::Rotation, &f64::from(rotation))
    }

    fn create_album(
        &self,
        album: &NewAlbum,
        created_at: DateTime<Utc>,
    ) -> Result<AlbumId, ApplicationError> {
        let conn = self.open_connection()?;
        let id = queries::insert_album(&conn, album, &queries::encode_date(created_at))
            .map_err(persistence)?;
        Ok(AlbumId::new(id)?)
    }

    fn add_image_to_album(
        &self,
        album_id: AlbumId,
        image_id: ImageId,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        queries::add_image_to_album(&conn, album_id.get(), image_id.get()).map_err(persistence)
    }

    fn list_albums(&self) -> Result<Vec<AlbumRecord>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::list_albums(&conn).map_err(persistence)
    }

    fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumRecord>, ApplicationError> {
        Ok(self
            .list_albums()?
            .into_iter()
            .find(|album| album.name == name))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use export_host_domain::{ImageFormat, MetadataMap};
    use tempfile::TempDir;

    use super::*;

    fn library(dir: &TempDir) -> SqlitePhotoLibrary {
        let repo = SqlitePhotoLibrary::new(dir.path().join("catalog.sqlite3"));
        repo.initialize().expect("initialize");
        repo
    }

    fn new_image(path: &str) -> NewImage {
        let mut exif = MetadataMap::new();
        exif.insert("ISOSpeed".to_string(), "400".to_string());
        NewImage {
            file_path: path.to_string(),
            source_path: path.to_string(),
            file_name: "sample.jpg".to_string(),
            title: "sample".to_string(),
            format: ImageFormat::Jpeg,
            original_format: ImageFormat::Jpeg,
            size: ImageSize::new(640, 480),
            file_size: 2048,
            import_date: Utc.with_ymd_and_hms(2026, 2, 17, 0, 0, 0).unwrap(),
            capture_date: Some(Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap()),
            exif,
            tiff: MetadataMap::new(),
        }
    }

    #[test]
    fn initialize_creates_schema() {
        let dir = TempDir::new().expect("tempdir");
        let db_path = dir.path().join("catalog.sqlite3");
        SqlitePhotoLibrary::new(&db_path)
            .initialize()
            .expect("initialize");

        let conn = Connection::open(db_path).expect("open");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type='table' AND name IN ('images', 'thumbnails', 'albums', 'album_images')",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 4);
    }

    #[test]
    fn image_roundtrip_keeps_metadata_and_thumbnail() {
        let dir = TempDir::new().expect("tempdir");
        let repo = library(&dir);

        let first = repo.upsert_image(&new_image("/tmp/sample.jpg")).expect("upsert");
        let again = repo.upsert_image(&new_image("/tmp/sample.jpg")).expect("upsert");
        assert!(first.inserted);
        assert!(!again.inserted);
        assert_eq!(first.image_id, again.image_id);

        repo.upsert_thumbnail(
            first.image_id,
            "/cache/thumbs/1.jpg",
            ImageSize::new(256, 192),
            Utc::now(),
        )
        .expect("thumbnail");
        repo.set_keywords(first.image_id, &["sea".to_string(), "sky".to_string()])
            .expect("keywords");
        repo.set_rating(first.image_id, 3).expect("rating");
        repo.set_caption(first.image_id, "Sea", "calm").expect("caption");
        repo.set_rotation(first.image_id, 90.0).expect("rotation");

        let image = repo
            .find_image_by_id(first.image_id)
            .expect("find")
            .expect("exists");
        assert_eq!(image.thumbnail_path.as_deref(), Some("/cache/thumbs/1.jpg"));
        assert_eq!(image.keywords, vec!["sea".to_string(), "sky".to_string()]);
        assert_eq!(image.rating, 3);
        assert_eq!(image.title, "Sea");
        assert_eq!(image.comments, "calm");
        assert_eq!(image.rotation, 90.0);
        assert_eq!(image.exif.get("ISOSpeed").map(String::as_str), Some("400"));
        assert_eq!(image.size, ImageSize::new(640, 480));
        assert_eq!(image.file_size, 2048);
        assert_eq!(
            image.capture_date,
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(repo.list_images().expect("list").len(), 1);
    }

    #[test]
    fn updates_on_missing_images_report_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let repo = library(&dir);
        let missing = ImageId::new(42).expect("id");
        assert!(matches!(
            repo.set_rating(missing, 1),
            Err(ApplicationError::NotFound(_))
        ));
        assert!(repo.find_image_by_id(missing).expect("find").is_none());
    }

    #[test]
    fn albums_keep_insertion_order() {
        let dir = TempDir::new().expect("tempdir");
        let repo = library(&dir);
        let a = repo.upsert_image(&new_image("/tmp/a.jpg")).expect("a").image_id;
        let b = repo.upsert_image(&new_image("/tmp/b.jpg")).expect("b").image_id;

        let album_id = repo
            .create_album(
                &NewAlbum {
                    name: "Trip".to_string(),
                    music_path: Some("/music/song.mp3".to_string()),
                    comments: "spring".to_string(),
                },
                Utc::now(),
            )
            .expect("album");
        repo.add_image_to_album(album_id, b).expect("add b");
        repo.add_image_to_album(album_id, a).expect("add a");
        repo.add_image_to_album(album_id, b).expect("re-add b");

        let album = repo
            .find_album_by_name("Trip")
            .expect("find")
            .expect("exists");
        assert_eq!(album.id, album_id);
        assert_eq!(album.image_ids, vec![b, a]);
        assert_eq!(album.music_path.as_deref(), Some("/music/song.mp3"));
        assert!(repo.find_album_by_name("Other").expect("find").is_none());

        let duplicate = repo.create_album(
            &NewAlbum {
                name: "Trip".to_string(),
                music_path: None,
                comments: String::new(),
            },
            Utc::now(),
        );
        assert!(matches!(duplicate, Err(ApplicationError::Persistence(_))));
    }
}
