use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub smartkg: SmartKgConfig,
    #[serde(default)]
    pub loading: LoadingConfig,
    pub context_store: ContextStoreConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Datastore location
#[derive(Debug, Clone, Deserialize)]
pub struct SmartKgConfig {
    /// Root directory holding one sub-directory per datastore.
    pub data_folder: PathBuf,
    /// Datastores to load. Empty loads every sub-directory of `data_folder`.
    #[serde(default)]
    pub datastores: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Load and reload behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct LoadingConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            watch: false,
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Dialog context persistence
#[derive(Debug, Clone, Deserialize)]
pub struct ContextStoreConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_max_duration_invalid_input")]
    pub max_duration_invalid_input: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_max_duration_invalid_input() -> u32 {
    3
}

fn default_http_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in SMARTKG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SMARTKG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
    }

    /// Load and validate the configuration at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let data_folder = &self.smartkg.data_folder;
        if !data_folder.exists() {
            anyhow::bail!(
                "data_folder path does not exist: {}. Set data_folder in config.toml to your datastore directory.",
                data_folder.display()
            );
        }

        if !data_folder.is_dir() {
            anyhow::bail!("data_folder must be a directory, not a file: {}", data_folder.display());
        }

        if self.loading.timeout_secs == 0 {
            anyhow::bail!("loading.timeout_secs must be greater than 0");
        }

        if self.context_store.max_duration_invalid_input == 0 {
            anyhow::bail!("context_store.max_duration_invalid_input must be greater than 0");
        }

        Ok(())
    }

    pub fn data_folder(&self) -> &Path {
        &self.smartkg.data_folder
    }

    pub fn db_path(&self) -> &Path {
        &self.context_store.db_path
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.loading.timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.loading.debounce_ms)
    }
}
