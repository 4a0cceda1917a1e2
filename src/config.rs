use std::path::{Path, PathBuf};

use anyhow::Context;
use twelf::{Layer, config};

const DEFAULT_CONFIG_FILE: &str = "kosync.yaml";
const ENV_PREFIX: &str = "KOSYNC_";

fn default_db_connection_string() -> String {
    "sqlite://kosync.sqlite?mode=rwc".into()
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".into()
}

fn default_base_path() -> String {
    "/api/koreader".into()
}

fn default_device_name() -> String {
    "kosync-bridge".into()
}

fn default_library_extensions() -> String {
    "epub,pdf,cbz,cbr,mobi,azw3,fb2,djvu,txt".into()
}

/// Layered settings: optional YAML file, then `KOSYNC_*` environment variables.
#[config]
#[derive(Debug, Default)]
pub struct Config {
    #[serde(default = "default_db_connection_string")]
    pub db_connection_string: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Prefix the reader's sync server URL points at
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Label reported as the syncing device
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Overrides the generated per-installation id
    pub install_id: Option<String>,
    pub library_path: Option<String>,
    /// Comma separated, case-insensitive
    #[serde(default = "default_library_extensions")]
    pub library_extensions: String,
    /// 0 scans only at startup
    #[serde(default)]
    pub library_scan_interval_secs: u64,
    pub bootstrap_username: Option<String>,
    pub bootstrap_api_key: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let file = std::env::var("KOSYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut layers = Vec::new();
        if file.exists() {
            tracing::info!(path = %file.display(), "loading config file");
            layers.push(Layer::Yaml(file));
        }
        layers.push(Layer::Env(Some(ENV_PREFIX.to_string())));

        Config::with_layers(&layers).with_context(|| "Failed to load configuration")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.trim().is_empty() {
            return Err("KOSYNC_BIND_ADDR is empty".into());
        }
        if !self.base_path.starts_with('/') {
            return Err("KOSYNC_BASE_PATH must start with '/'".into());
        }
        match (&self.bootstrap_username, &self.bootstrap_api_key) {
            (Some(_), None) => return Err("KOSYNC_BOOTSTRAP_API_KEY is missing".into()),
            (None, Some(_)) => return Err("KOSYNC_BOOTSTRAP_USERNAME is missing".into()),
            (Some(name), Some(key)) if name.is_empty() || key.is_empty() => {
                return Err("bootstrap user needs a non-empty name and api key".into());
            }
            _ => {}
        }
        if let Some(path) = &self.library_path {
            if !Path::new(path).is_dir() {
                return Err(format!("KOSYNC_LIBRARY_PATH is not a directory: {}", path));
            }
        }
        Ok(())
    }

    pub fn library_extensions(&self) -> Vec<String> {
        self.library_extensions
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}
