use std::path::{Path, PathBuf};

use bessie_core::{GalleryConfig, LoaderConfig};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Client configuration, loaded from environment variables and an
/// optional TOML file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend API root (default: http://localhost:8000/api).
    pub api_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Records per viewer block fetch.
    pub block_size: usize,
    /// Records per contact-sheet page.
    pub page_size: usize,
    /// How close to the loaded end the viewer fetches the next block.
    pub lookahead: usize,
    pub grid_columns: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Whether viewer round trips are reported to `/log-timing`.
    pub timing_enabled: bool,
}

/// TOML overlay; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    token: Option<String>,
    block_size: Option<usize>,
    page_size: Option<usize>,
    lookahead: Option<usize>,
    grid_columns: Option<usize>,
    timeout_secs: Option<u64>,
    timing_enabled: Option<bool>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            token: None,
            block_size: 25,
            page_size: 30,
            lookahead: 2,
            grid_columns: 6,
            timeout_secs: 10,
            timing_enabled: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `BESSIE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("BESSIE_API_URL").unwrap_or(defaults.api_url),
            token: std::env::var("BESSIE_TOKEN").ok().filter(|t| !t.is_empty()),
            block_size: env_usize("BESSIE_BLOCK_SIZE", defaults.block_size),
            page_size: env_usize("BESSIE_PAGE_SIZE", defaults.page_size),
            lookahead: env_usize("BESSIE_LOOKAHEAD", defaults.lookahead),
            grid_columns: env_usize("BESSIE_GRID_COLUMNS", defaults.grid_columns),
            timeout_secs: env_u64("BESSIE_TIMEOUT_SECS", defaults.timeout_secs),
            timing_enabled: std::env::var("BESSIE_TIMING_ENABLED")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }

    /// Environment defaults overlaid with the TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_env().merge_toml(&raw)?;
        tracing::debug!(path = %path.display(), api_url = %config.api_url, "config file loaded");
        Ok(config)
    }

    /// Overlay the keys present in `raw` on `self`.
    pub fn merge_toml(mut self, raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        if let Some(v) = file.api_url {
            self.api_url = v;
        }
        if file.token.is_some() {
            self.token = file.token;
        }
        self.block_size = file.block_size.unwrap_or(self.block_size);
        self.page_size = file.page_size.unwrap_or(self.page_size);
        self.lookahead = file.lookahead.unwrap_or(self.lookahead);
        self.grid_columns = file.grid_columns.unwrap_or(self.grid_columns);
        self.timeout_secs = file.timeout_secs.unwrap_or(self.timeout_secs);
        self.timing_enabled = file.timing_enabled.unwrap_or(self.timing_enabled);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }
        for (name, value) in [
            ("block_size", self.block_size),
            ("page_size", self.page_size),
            ("grid_columns", self.grid_columns),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            block_size: self.block_size,
            lookahead: self.lookahead,
        }
    }

    pub fn gallery_config(&self) -> GalleryConfig {
        GalleryConfig {
            page_size: self.page_size,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
