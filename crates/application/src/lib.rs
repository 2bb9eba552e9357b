mod controller;
mod error;
mod manager;
mod paths;
mod plugin;
mod ports;
mod protocol;
mod service;
mod session;
mod thumbnailer;
mod use_cases;

#[cfg(test)]
mod testing;

pub use controller::{ControllerLink, ControllerRequest, ExportController, ExportOutcome};
pub use error::ApplicationError;
pub use manager::{sidecar_path, ExportManager};
pub use paths::valid_filename;
pub use plugin::{
    CancellationToken, ExportPlugin, FileNaming, PluginRecord, PluginSettings, SharedProgress,
};
pub use ports::{
    Clock, DecodedPixels, ExportRequest, ExportWindow, FileScanSummary, FileScanner, FileSystem,
    ImageCodec, ImageInspector, InspectedImage, NewAlbum, NewImage, PathUsage, PhotoLibrary,
    PluginSource, ScannedFile, ThumbnailArtifact, ThumbnailGenerator, ThumbnailOutcome,
    ThumbnailRenderer, ThumbnailSettings, UpsertImageResult,
};
pub use protocol::ExportHost;
pub use service::CatalogService;
pub use session::SessionSnapshot;
pub use thumbnailer::Thumbnailer;
pub use use_cases::{
    AddToAlbumCommand, BootstrapCatalogCommand, CreateAlbumCommand, ImportFolderCommand,
    ListAlbumsCommand, ListImagesCommand, SetCaptionCommand, SetKeywordsCommand,
    SetRatingCommand, SetRotationCommand,
};
