use export_host_domain::ImageId;

#[derive(Debug, Clone, Default)]
pub struct BootstrapCatalogCommand;

#[derive(Debug, Clone)]
pub struct ImportFolderCommand {
    pub folder: String,
    pub cache_root: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListImagesCommand;

#[derive(Debug, Clone, Default)]
pub struct ListAlbumsCommand;

#[derive(Debug, Clone)]
pub struct CreateAlbumCommand {
    pub name: String,
    pub music_path: Option<String>,
    pub comments: String,
}

#[derive(Debug, Clone)]
pub struct AddToAlbumCommand {
    pub album_name: String,
    pub image_ids: Vec<ImageId>,
}

#[derive(Debug, Clone)]
pub struct SetKeywordsCommand {
    pub image_id: ImageId,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SetRatingCommand {
    pub image_id: ImageId,
    pub rating: i32,
}

#[derive(Debug, Clone)]
pub struct SetCaptionCommand {
    pub image_id: ImageId,
    pub title: String,
    pub comments: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SetRotationCommand {
    pub image_id: ImageId,
    pub rotation: f32,
}
