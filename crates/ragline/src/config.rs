//! Configuration handling for the ragline CLI.
//!
//! Settings come from a TOML file (`--config`, `$RAGLINE_CONFIG`, or the
//! XDG config directory), with every field defaulting so an empty or
//! missing file works. A handful of `RAGLINE_*` environment variables
//! override the file.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use ragline_core::{ChunkConfig, EmbeddingConfig, ExecutionConfig, RetrievalConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Service endpoints and credentials
    #[serde(default)]
    pub service: ServiceConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Execution configuration
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL for the embedding service
    #[serde(default = "default_base_url")]
    pub embed_base_url: String,

    /// Base URL for the completion service
    #[serde(default = "default_base_url")]
    pub completion_base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Max concurrent embedding service calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_embeds: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "RAGLINE_API_KEY".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            embed_base_url: default_base_url(),
            completion_base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_concurrent_embeds: default_max_concurrent(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (tracing `EnvFilter` syntax)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration: explicit path, `$RAGLINE_CONFIG`, or the XDG
    /// config file, falling back to defaults when none exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RAGLINE_CONFIG").ok().map(PathBuf::from))
            .or_else(|| config_dir().map(|dir| dir.join("config.toml")));

        let mut config = match resolved {
            Some(file) if file.exists() => {
                let raw = std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read config {}", file.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("invalid config {}", file.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RAGLINE_EMBED_URL") {
            self.service.embed_base_url = url;
        }
        if let Ok(url) = std::env::var("RAGLINE_COMPLETION_URL") {
            self.service.completion_base_url = url;
        }
        if let Ok(level) = std::env::var("RAGLINE_LOG") {
            self.logging.level = level;
        }
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.service.api_key_env).with_context(|| {
            format!(
                "api key not found: set the {} environment variable",
                self.service.api_key_env
            )
        })
    }
}

/// XDG data directory, overridable via `$RAGLINE_DATA_DIR`.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RAGLINE_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "ragline").map(|dirs| dirs.data_dir().to_path_buf())
}

/// XDG config directory, overridable via `$RAGLINE_CONFIG_DIR`.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RAGLINE_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "ragline").map(|dirs| dirs.config_dir().to_path_buf())
}
