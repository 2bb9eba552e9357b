pub const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_path TEXT NOT NULL UNIQUE,
        source_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        comments TEXT NOT NULL DEFAULT '',
        format TEXT NOT NULL,
        original_format TEXT NOT NULL,
        width INTEGER NOT NULL DEFAULT 0,
        height INTEGER NOT NULL DEFAULT 0,
        rotation REAL NOT NULL DEFAULT 0,
        edited INTEGER NOT NULL DEFAULT 0,
        file_size INTEGER NOT NULL DEFAULT 0,
        import_date TEXT NOT NULL,
        capture_date TEXT,
        rating INTEGER NOT NULL DEFAULT 0,
        keywords_json TEXT NOT NULL DEFAULT '[]',
        exif_json TEXT NOT NULL DEFAULT '{}',
        tiff_json TEXT NOT NULL DEFAULT '{}'
    );",
    "CREATE TABLE IF NOT EXISTS thumbnails (
        image_id INTEGER PRIMARY KEY REFERENCES images(id) ON DELETE CASCADE,
        file_path TEXT NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS albums (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        music_path TEXT,
        comments TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS album_images (
        album_id INTEGER NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
        image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (album_id, image_id)
    );",
    "CREATE INDEX IF NOT EXISTS idx_album_images_position
        ON album_images (album_id, position);",
];
