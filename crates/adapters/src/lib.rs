mod codec;
pub mod fs;
mod inspect;
pub mod migrations;
pub mod plugins;
pub mod presenters;
pub mod sqlite;

pub use codec::{ImageCrateCodec, ImageCrateThumbnailRenderer};
pub use fs::{CacheThumbnailGenerator, LocalFileSystem, SystemClock, WalkdirFileScanner};
pub use inspect::ExifImageInspector;
pub use plugins::{
    FilesExporter, ManifestPluginSource, PluginKind, PluginManifest, WebPageExporter,
};
pub use presenters::{
    present_album_row, present_image_row, present_import_report, present_outcome,
    present_plugin_row, present_progress,
};
pub use sqlite::SqlitePhotoLibrary;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use export_host_application::{
        BootstrapCatalogCommand, CatalogService, ImportFolderCommand, ListImagesCommand,
    };
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn import_continues_past_an_undecodable_jpeg() {
        let dir = TempDir::new().expect("tempdir");
        let photos = dir.path().join("photos");
        fs::create_dir_all(&photos).expect("photos");
        fs::write(photos.join("a_broken.jpg"), b"garbage, not a jpeg").expect("write");
        ImageBuffer::from_fn(40, 30, |x, _y| Rgb([x as u8, 0_u8, 0_u8]))
            .save(photos.join("b_good.png"))
            .expect("save");

        let catalog = CatalogService::new(
            Arc::new(SqlitePhotoLibrary::new(dir.path().join("catalog.sqlite3"))),
            Box::new(WalkdirFileScanner),
            Box::new(CacheThumbnailGenerator::new(Arc::new(
                ImageCrateThumbnailRenderer,
            ))),
            Box::new(ExifImageInspector),
            Arc::new(SystemClock),
        );
        catalog
            .bootstrap_catalog(BootstrapCatalogCommand)
            .expect("bootstrap");
        let report = catalog
            .import_folder(ImportFolderCommand {
                folder: photos.to_string_lossy().to_string(),
                cache_root: dir.path().join("cache").to_string_lossy().to_string(),
            })
            .expect("import");
        assert_eq!(report.newly_imported, 2);

        let images = catalog.list_images(ListImagesCommand).expect("list");
        let broken = images
            .iter()
            .find(|image| image.file_name == "a_broken.jpg")
            .expect("broken");
        assert!(broken.thumbnail_path.is_none());
        let good = images
            .iter()
            .find(|image| image.file_name == "b_good.png")
            .expect("good");
        assert!(good.thumbnail_path.is_some());
    }
}
