use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "PHOTO_EXPORT_CONFIG";
pub const CATALOG_ENV: &str = "PHOTO_EXPORT_CATALOG";
pub const CACHE_ENV: &str = "PHOTO_EXPORT_CACHE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog_path: String,
    pub cache_dir: String,
    pub plugin_dirs: Vec<PathBuf>,
    pub log_level: Option<String>,
    pub progress_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: "catalog.sqlite3".to_string(),
            cache_dir: "cache".to_string(),
            plugin_dirs: vec![PathBuf::from("plugins")],
            log_level: None,
            progress_interval_ms: 100,
        }
    }
}

impl AppConfig {
    /// `--config` wins over `PHOTO_EXPORT_CONFIG`; without either the defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).filter(|value| !value.is_empty()).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(catalog) = env(CATALOG_ENV).filter(|value| !value.is_empty()) {
            config.catalog_path = catalog;
        }
        if let Some(cache) = env(CACHE_ENV).filter(|value| !value.is_empty()) {
            config.cache_dir = cache;
        }
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
