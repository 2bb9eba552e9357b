use std::collections::HashMap;
use std::error::Error;

use chrono::{DateTime, SecondsFormat, Utc};
use export_host_application::{NewAlbum, NewImage};
use export_host_domain::{AlbumId, AlbumRecord, ImageFormat, ImageId, ImageRecord, ImageSize};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

const IMAGE_COLUMNS: &str = "i.id, i.file_path, i.source_path, t.file_path, i.file_name, i.title,
     i.comments, i.format, i.original_format, i.width, i.height, i.rotation, i.edited,
     i.file_size, i.import_date, i.capture_date, i.rating, i.keywords_json, i.exif_json,
     i.tiff_json";

pub fn encode_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error<E>(index: usize, error: E) -> rusqlite::Error
where
    E: Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

fn decode_date(index: usize, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|error| conversion_error(index, error))
}

fn decode_format(index: usize, text: &str) -> Result<ImageFormat> {
    ImageFormat::from_extension(text).ok_or_else(|| {
        conversion_error(
            index,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown image format: {text}"),
            ),
        )
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(index: usize, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|error| conversion_error(index, error))
}

fn image_from_row(row: &Row<'_>) -> Result<ImageRecord> {
    let id_value: i64 = row.get(0)?;
    let format: String = row.get(7)?;
    let original_format: String = row.get(8)?;
    let import_date: String = row.get(14)?;
    let capture_date: Option<String> = row.get(15)?;
    let keywords_json: String = row.get(17)?;
    let exif_json: String = row.get(18)?;
    let tiff_json: String = row.get(19)?;

    Ok(ImageRecord {
        id: ImageId::new(id_value).map_err(|error| conversion_error(0, error))?,
        file_path: row.get(1)?,
        source_path: row.get(2)?,
        thumbnail_path: row.get(3)?,
        file_name: row.get(4)?,
        title: row.get(5)?,
        comments: row.get(6)?,
        format: decode_format(7, &format)?,
        original_format: decode_format(8, &original_format)?,
        size: ImageSize::new(row.get(9)?, row.get(10)?),
        rotation: row.get::<_, f64>(11)? as f32,
        edited: row.get(12)?,
        file_size: row.get::<_, i64>(13)?.max(0) as u64,
        import_date: decode_date(14, &import_date)?,
        capture_date: capture_date
            .as_deref()
            .map(|text| decode_date(15, text))
            .transpose()?,
        rating: row.get(16)?,
        keywords: decode_json(17, &keywords_json)?,
        exif: decode_json(18, &exif_json)?,
        tiff: decode_json(19, &tiff_json)?,
    })
}

/// Inserts the image unless its path is already catalogued. Returns the row
/// id and whether a row was inserted.
pub fn upsert_image(conn: &Connection, image: &NewImage) -> Result<(i64, bool)> {
    let exif_json = serde_json::to_string(&image.exif).map_err(|error| conversion_error(0, error))?;
    let tiff_json = serde_json::to_string(&image.tiff).map_err(|error| conversion_error(0, error))?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO images
         (file_path, source_path, file_name, title, format, original_format, width, height,
          file_size, import_date, capture_date, exif_json, tiff_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            image.file_path,
            image.source_path,
            image.file_name,
            image.title,
            image.format.extension(),
            image.original_format.extension(),
            image.size.width,
            image.size.height,
            image.file_size as i64,
            encode_date(image.import_date),
            image.capture_date.map(encode_date),
            exif_json,
            tiff_json,
        ],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM images WHERE file_path = ?1",
        params![image.file_path],
        |row| row.get(0),
    )?;
    Ok((id, inserted == 1))
}

pub fn upsert_thumbnail(
    conn: &Connection,
    image_id: i64,
    file_path: &str,
    width: u32,
    height: u32,
    updated_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO thumbnails (image_id, file_path, width, height, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(image_id) DO UPDATE SET
            file_path = excluded.file_path,
            width = excluded.width,
            height = excluded.height,
            updated_at = excluded.updated_at",
        params![image_id, file_path, width, height, updated_at],
    )?;
    Ok(())
}

pub fn list_images(conn: &Connection) -> Result<Vec<ImageRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {IMAGE_COLUMNS}
         FROM images i
         LEFT JOIN thumbnails t ON t.image_id = i.id
         ORDER BY COALESCE(i.capture_date, i.import_date), i.id"
    ))?;
    let rows = stmt.query_map([], image_from_row)?;
    rows.collect()
}

pub fn find_image_by_id(conn: &Connection, image_id: i64) -> Result<Option<ImageRecord>> {
    conn.query_row(
        &format!(
            "SELECT {IMAGE_COLUMNS}
             FROM images i
             LEFT JOIN thumbnails t ON t.image_id = i.id
             WHERE i.id = ?1"
        ),
        params![image_id],
        image_from_row,
    )
    .optional()
}

/// Returns the number of rows changed; zero means the image does not exist.
pub fn update_image_column(
    conn: &Connection,
    image_id: i64,
    column: ImageColumn,
    value: &dyn rusqlite::ToSql,
) -> Result<usize> {
    let sql = format!("UPDATE images SET {} = ?1 WHERE id = ?2", column.name());
    conn.execute(&sql, params![value, image_id])
}

#[derive(Debug, Clone, Copy)]
pub enum ImageColumn {
    Rating,
    Keywords,
    Rotation,
}

impl ImageColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::Keywords => "keywords_json",
            Self::Rotation => "rotation",
        }
    }
}

pub fn set_caption(conn: &Connection, image_id: i64, title: &str, comments: &str) -> Result<usize> {
    conn.execute(
        "UPDATE images SET title = ?1, comments = ?2 WHERE id = ?3",
        params![title, comments, image_id],
    )
}

pub fn insert_album(conn: &Connection, album: &NewAlbum, created_at: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO albums (name, music_path, comments, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![album.name, album.music_path, album.comments, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Appends the image at the end of the album; a repeated add keeps the first position.
pub fn add_image_to_album(conn: &Connection, album_id: i64, image_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO album_images (album_id, image_id, position)
         VALUES (?1, ?2,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM album_images WHERE album_id = ?1))",
        params![album_id, image_id],
    )?;
    Ok(())
}

pub fn list_albums(conn: &Connection) -> Result<Vec<AlbumRecord>> {
    let mut members: HashMap<i64, Vec<ImageId>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT album_id, image_id FROM album_images ORDER BY album_id, position",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (album_id, image_id) = row?;
        members
            .entry(album_id)
            .or_default()
            .push(ImageId::new(image_id).map_err(|error| conversion_error(1, error))?);
    }

    let mut stmt = conn.prepare("SELECT id, name, music_path, comments FROM albums ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        let id_value: i64 = row.get(0)?;
        Ok(AlbumRecord {
            id: AlbumId::new(id_value).map_err(|error| conversion_error(0, error))?,
            name: row.get(1)?,
            music_path: row.get(2)?,
            comments: row.get(3)?,
            image_ids: Vec::new(),
        })
    })?;

    rows.map(|album| {
        album.map(|mut album| {
            album.image_ids = members.remove(&album.id.get()).unwrap_or_default();
            album
        })
    })
    .collect()
}
