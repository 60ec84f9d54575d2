//! Configuration module for the assistant backend.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `HSBC_` and use double
//! underscores to separate nested levels:
//! - `HSBC_CHUNKING__CHUNK_SIZE=2000` sets `chunking.chunk_size`
//! - `HSBC_LLM__FLAVOR=azure` sets `llm.flavor`
//! - `HSBC_RETRIEVAL__TOP_K=5` sets `retrieval.top_k`
//!
//! API keys never live in the file. Each provider section names the
//! environment variable its key is read from (`api_key_env`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::documents::{ChunkingConfig, OcrConfig};
use crate::embedding::EmbeddingConfig;
use crate::http::RetryPolicy;
use crate::llm::LlmConfig;
use crate::news::{NewsConfig, RefinitivConfig};

/// Directory holding the settings file.
pub const LOCAL_DIR: &str = ".hsbc-assist";

const ENV_PREFIX: &str = "HSBC_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory scanned by `ask` when no path is given
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Chunk size, overlap and separators
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding endpoint
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat completion endpoint
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Retry policy shared by all HTTP clients
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Form Recognizer OCR for images
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Refinitiv RKD news API
    #[serde(default)]
    pub refinitiv: RefinitivConfig,

    /// News summarization
    #[serde(default)]
    pub news: NewsConfig,
}

/// Log level configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `ingest = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Chunks placed in the QA context
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_documents_dir() -> PathBuf {
    PathBuf::from("documents")
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_top_k() -> usize {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            documents_dir: default_documents_dir(),
            logging: LoggingConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            retry: RetryPolicy::default(),
            ocr: OcrConfig::default(),
            refinitiv: RefinitivConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for the settings directory
        let config_path =
            Self::find_workspace_config().unwrap_or_else(Self::default_config_path);
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, then apply env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Relative path of the settings file
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(LOCAL_DIR).join("settings.toml")
    }

    /// Find the settings file by searching from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(LOCAL_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Check semantic constraints figment cannot express
    pub fn validate(&self) -> Result<(), String> {
        self.chunking.validate()?;
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be greater than zero".to_string());
        }
        if self.embedding.batch_size == 0 {
            return Err("embedding.batch_size must be greater than zero".to_string());
        }
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be greater than zero".to_string());
        }
        if self.ocr.enabled && self.ocr.endpoint.trim().is_empty() {
            return Err("ocr.endpoint is required when OCR is enabled".to_string());
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `root`
    pub fn init_config_file(root: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(Self::default_config_path());

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

/// Read an API key from the environment variable `var`.
pub fn api_key(var: &str) -> Result<String, String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(format!("environment variable {var} is not set")),
    }
}
