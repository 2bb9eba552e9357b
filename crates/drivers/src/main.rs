mod config;
mod console;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use console::ConsoleWindow;
use export_host_adapters::{
    present_album_row, present_image_row, present_import_report, present_outcome,
    present_plugin_row, CacheThumbnailGenerator, ExifImageInspector, ImageCrateCodec,
    ImageCrateThumbnailRenderer, LocalFileSystem, ManifestPluginSource, SqlitePhotoLibrary,
    SystemClock, WalkdirFileScanner,
};
use export_host_application::{
    AddToAlbumCommand, ApplicationError, BootstrapCatalogCommand, CatalogService,
    CreateAlbumCommand, ExportController, ExportManager, ImportFolderCommand, ListAlbumsCommand,
    ListImagesCommand, PhotoLibrary, PluginSettings, SetCaptionCommand, SetKeywordsCommand,
    SetRatingCommand, SetRotationCommand,
};
use export_host_domain::{AlbumId, ExportQuality, ExportState, ImageFormat, ImageId};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "photo-export", about = "Photo catalog with pluggable exporters")]
struct Cli {
    /// JSON configuration file; falls back to PHOTO_EXPORT_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import every supported file below a folder
    Import { folder: String },
    /// List catalog images
    List,
    /// List albums
    Albums,
    Album {
        #[command(subcommand)]
        action: AlbumAction,
    },
    /// Edit catalog fields of one image
    Image {
        #[command(subcommand)]
        action: ImageAction,
    },
    /// List discovered export plugins
    Plugins,
    /// Run one export session
    Export(ExportArgs),
}

#[derive(Debug, Subcommand)]
enum AlbumAction {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        comments: String,
        #[arg(long)]
        music: Option<String>,
    },
    Add {
        album: String,
        #[arg(required = true)]
        image_ids: Vec<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum ImageAction {
    Rate { image_id: i64, rating: i32 },
    Caption {
        image_id: i64,
        title: String,
        #[arg(long, default_value = "")]
        comments: String,
    },
    Keywords { image_id: i64, keywords: Vec<String> },
    Rotate {
        image_id: i64,
        #[arg(allow_hyphen_values = true)]
        degrees: f32,
    },
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    plugin: String,
    #[arg(long)]
    dest: PathBuf,
    /// Comma-separated image ids; overrides --album
    #[arg(long, value_delimiter = ',')]
    images: Vec<i64>,
    #[arg(long)]
    album: Vec<String>,
    /// Output extension such as jpg, png or tiff
    #[arg(long)]
    format: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    quality: Option<u8>,
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<f32>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    metadata: Option<String>,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Runtime(String),
}

impl CommandError {
    fn runtime(context: &str, error: ApplicationError) -> Self {
        Self::Runtime(format!("{context}: {error}"))
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(2);
        }
    };
    logging::init_logging(config.log_level.as_deref());

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CommandError::Usage(msg)) => {
            eprintln!("{msg}");
            ExitCode::from(2)
        }
        Err(CommandError::Runtime(msg)) => {
            eprintln!("{msg}");
            ExitCode::from(1)
        }
    }
}

struct App {
    library: Arc<SqlitePhotoLibrary>,
    catalog: CatalogService,
}

fn build_app(config: &AppConfig) -> Result<App, CommandError> {
    let library = Arc::new(SqlitePhotoLibrary::new(config.catalog_path.clone()));
    let catalog = CatalogService::new(
        library.clone(),
        Box::new(WalkdirFileScanner),
        Box::new(CacheThumbnailGenerator::new(Arc::new(
            ImageCrateThumbnailRenderer,
        ))),
        Box::new(ExifImageInspector),
        Arc::new(SystemClock),
    );
    catalog
        .bootstrap_catalog(BootstrapCatalogCommand)
        .map_err(|error| CommandError::runtime("failed to bootstrap catalog", error))?;
    Ok(App { library, catalog })
}

fn build_manager(config: &AppConfig, library: Arc<SqlitePhotoLibrary>) -> Arc<ExportManager> {
    Arc::new(ExportManager::new(
        library,
        Arc::new(ImageCrateCodec),
        Arc::new(ImageCrateThumbnailRenderer),
        Arc::new(LocalFileSystem),
        Arc::new(ManifestPluginSource::new(config.plugin_dirs.clone())),
        Arc::new(SystemClock),
    ))
}

fn image_id(raw: i64) -> Result<ImageId, CommandError> {
    ImageId::new(raw).map_err(|error| CommandError::Usage(format!("invalid image id: {error}")))
}

fn run(command: Command, config: &AppConfig) -> Result<(), CommandError> {
    let app = build_app(config)?;
    match command {
        Command::Import { folder } => {
            let report = app
                .catalog
                .import_folder(ImportFolderCommand {
                    folder,
                    cache_root: config.cache_dir.clone(),
                })
                .map_err(|error| CommandError::runtime("import failed", error))?;
            println!("import finished: {}", present_import_report(&report));
            Ok(())
        }
        Command::List => {
            let images = app
                .catalog
                .list_images(ListImagesCommand)
                .map_err(|error| CommandError::runtime("list failed", error))?;
            if images.is_empty() {
                println!("no images in catalog");
            }
            for image in &images {
                println!("{}", present_image_row(image));
            }
            Ok(())
        }
        Command::Albums => {
            let albums = app
                .catalog
                .list_albums(ListAlbumsCommand)
                .map_err(|error| CommandError::runtime("list failed", error))?;
            if albums.is_empty() {
                println!("no albums in catalog");
            }
            for album in &albums {
                println!("{}", present_album_row(album));
            }
            Ok(())
        }
        Command::Album { action } => run_album(action, &app),
        Command::Image { action } => run_image(action, &app),
        Command::Plugins => {
            let manager = build_manager(config, app.library.clone());
            manager
                .scan_for_exporters()
                .map_err(|error| CommandError::runtime("plugin discovery failed", error))?;
            for (index, record) in manager.plugin_records().iter().enumerate() {
                println!("{}", present_plugin_row(index, record));
            }
            Ok(())
        }
        Command::Export(args) => run_export(args, config, &app),
    }
}

fn run_album(action: AlbumAction, app: &App) -> Result<(), CommandError> {
    match action {
        AlbumAction::Create {
            name,
            comments,
            music,
        } => {
            let id = app
                .catalog
                .create_album(CreateAlbumCommand {
                    name: name.clone(),
                    music_path: music,
                    comments,
                })
                .map_err(|error| CommandError::runtime("album create failed", error))?;
            println!("created album {} ({name})", id.get());
            Ok(())
        }
        AlbumAction::Add { album, image_ids } => {
            let image_ids = image_ids
                .into_iter()
                .map(image_id)
                .collect::<Result<Vec<_>, _>>()?;
            let added = app
                .catalog
                .add_to_album(AddToAlbumCommand {
                    album_name: album.clone(),
                    image_ids,
                })
                .map_err(|error| CommandError::runtime("album add failed", error))?;
            println!("added {added} images to {album}");
            Ok(())
        }
    }
}

fn run_image(action: ImageAction, app: &App) -> Result<(), CommandError> {
    let result = match action {
        ImageAction::Rate { image_id: id, rating } => app.catalog.set_rating(SetRatingCommand {
            image_id: image_id(id)?,
            rating,
        }),
        ImageAction::Caption {
            image_id: id,
            title,
            comments,
        } => app.catalog.set_caption(SetCaptionCommand {
            image_id: image_id(id)?,
            title,
            comments,
        }),
        ImageAction::Keywords {
            image_id: id,
            keywords,
        } => app.catalog.set_keywords(SetKeywordsCommand {
            image_id: image_id(id)?,
            keywords,
        }),
        ImageAction::Rotate {
            image_id: id,
            degrees,
        } => app.catalog.set_rotation(SetRotationCommand {
            image_id: image_id(id)?,
            rotation: degrees,
        }),
    };
    result.map_err(|error| match error {
        ApplicationError::Domain(_) | ApplicationError::InvalidInput(_) => {
            CommandError::Usage(error.to_string())
        }
        other => CommandError::runtime("image update failed", other),
    })
}

fn export_settings(
    mut settings: PluginSettings,
    args: &ExportArgs,
) -> Result<PluginSettings, CommandError> {
    if let Some(extension) = &args.format {
        let format = ImageFormat::from_extension(extension)
            .filter(|format| format.is_encodable())
            .ok_or_else(|| {
                CommandError::Usage(format!("unsupported export format: {extension}"))
            })?;
        settings.format = Some(format);
    }
    if let Some(quality) = args.quality {
        settings.quality = ExportQuality::from_ordinal(quality)
            .map_err(|error| CommandError::Usage(error.to_string()))?;
    }
    if let Some(rotation) = args.rotation {
        settings.rotation = rotation;
    }
    if let Some(width) = args.width {
        settings.width = width;
    }
    if let Some(height) = args.height {
        settings.height = height;
    }
    if let Some(metadata) = &args.metadata {
        settings.metadata = metadata.clone();
    }
    Ok(settings)
}

fn resolve_albums(
    library: &SqlitePhotoLibrary,
    names: &[String],
) -> Result<Vec<AlbumId>, CommandError> {
    names
        .iter()
        .map(|name| {
            library
                .find_album_by_name(name)
                .map_err(|error| CommandError::runtime("album lookup failed", error))?
                .map(|album| album.id)
                .ok_or_else(|| CommandError::Usage(format!("unknown album: {name}")))
        })
        .collect()
}

fn ensure_destination(dest: &Path) -> Result<(), CommandError> {
    if dest.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dest).map_err(|error| {
        CommandError::Runtime(format!("cannot create {}: {error}", dest.display()))
    })
}

fn run_export(args: ExportArgs, config: &AppConfig, app: &App) -> Result<(), CommandError> {
    let manager = build_manager(config, app.library.clone());
    manager
        .scan_for_exporters()
        .map_err(|error| CommandError::runtime("plugin discovery failed", error))?;
    let (_, record) = manager
        .find_plugin(&args.plugin)
        .ok_or_else(|| CommandError::Usage(format!("unknown plugin: {}", args.plugin)))?;

    let settings = export_settings(record.plugin.settings(), &args)?;
    record
        .plugin
        .apply_settings(settings)
        .map_err(|error| CommandError::Usage(error.to_string()))?;

    let images = args
        .images
        .iter()
        .copied()
        .map(image_id)
        .collect::<Result<Vec<_>, _>>()?;
    manager.set_selection(images);
    manager.set_selected_albums(resolve_albums(&app.library, &args.album)?);

    ensure_destination(&args.dest)?;
    let mut controller =
        ExportController::new(Arc::clone(&manager), Arc::new(ConsoleWindow::new()));
    controller
        .select_exporter_by_id(&args.plugin)
        .map_err(|error| CommandError::runtime("cannot select exporter", error))?;
    controller.set_directory_path(Some(args.dest.clone()));
    match controller.files_will_fit_on_disk() {
        Ok(true) => {}
        Ok(false) => warn!(dest = %args.dest.display(), "export may not fit on disk"),
        Err(error) => warn!(%error, "free space unknown"),
    }

    controller.click_export().map_err(|error| match error {
        ApplicationError::NotFound(_) | ApplicationError::InvalidInput(_) => {
            CommandError::Usage(error.to_string())
        }
        other => CommandError::runtime("export failed to start", other),
    })?;
    info!(plugin = %args.plugin, dest = %args.dest.display(), "export started");

    let outcome = controller
        .wait(Duration::from_millis(config.progress_interval_ms.max(1)))
        .map_err(|error| CommandError::runtime("export failed", error))?;
    println!("{}", present_outcome(&outcome));
    manager.release_plugins();

    match (&outcome.state, &outcome.error) {
        (ExportState::Completed, None) => Ok(()),
        (_, Some(error)) => Err(CommandError::Runtime(format!("export failed: {error}"))),
        (state, None) => Err(CommandError::Runtime(format!("export ended {state:?}"))),
    }
}
