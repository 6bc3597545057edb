//! Layered configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A TOML file: `--config <path>`, or `config.toml` in the platform
//!    config directory (`~/.config/mediavault` on Linux)
//! 3. Environment variables prefixed `MEDIAVAULT_`
//!    (e.g. `MEDIAVAULT_MAX_CONCURRENT_DOWNLOADS=4`)
//! 4. Command-line flags
//!
//! The merged result is validated once, before any engine is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::RemovalMode;
use crate::download::{DownloadConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT, DEFAULT_USER_AGENT};
use crate::duplicates::{ResolverConfig, DEFAULT_PROGRESS_BATCH, DEFAULT_VIDEO_EXTENSIONS};
use crate::scanner::{normalize_extension, HashAlgorithm, DEFAULT_HASH_CHUNK_SIZE};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "MEDIAVAULT_";

/// Extensions downloaded and deduplicated by default.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4"];

/// Configuration errors. Always fatal, always raised before work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or had the wrong types.
    #[error("Invalid configuration: {0}")]
    Load(#[source] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest slice written per progress event, in bytes.
    pub chunk_size: usize,
    pub max_concurrent_downloads: usize,
    /// Extensions that are downloaded and deduplicated.
    pub allowed_extensions: Vec<String>,
    /// Read size for cryptographic hashing, in bytes.
    pub fingerprint_chunk_size: usize,
    /// Hash GIFs as bytes instead of pixels.
    pub animated_images_as_video: bool,
    /// Extensions hashed as opaque bytes.
    pub video_extensions: Vec<String>,
    pub hash_algorithm: HashAlgorithm,
    /// Completions between duplicate-removal progress events.
    pub progress_batch: usize,
    pub removal_mode: RemovalMode,
    pub user_agent: String,
    /// Connect and per-read timeout. A transfer may run longer as long
    /// as bytes keep arriving.
    pub request_timeout_secs: u64,
    /// Fingerprint pool size; 0 means one thread per core.
    pub fingerprint_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT,
            allowed_extensions: to_strings(DEFAULT_ALLOWED_EXTENSIONS),
            fingerprint_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
            animated_images_as_video: false,
            video_extensions: to_strings(DEFAULT_VIDEO_EXTENSIONS),
            hash_algorithm: HashAlgorithm::default(),
            progress_batch: DEFAULT_PROGRESS_BATCH,
            removal_mode: RemovalMode::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 60,
            fingerprint_threads: 0,
        }
    }
}

/// Values set on the command line. `None` leaves lower layers in place.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_downloads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<HashAlgorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal_mode: Option<RemovalMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animated_images_as_video: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_threads: Option<usize>,
}

impl Config {
    /// Merge every layer and validate the result.
    ///
    /// With `explicit_path` set, that file must exist. Otherwise the
    /// platform default file is used if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a missing explicit file, unparsable
    /// sources, or out-of-range values.
    pub fn load(
        explicit_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;

        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Platform config file path, if a home directory is known.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mediavault").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn normalized(mut self) -> Self {
        let clean = |exts: Vec<String>| -> Vec<String> {
            let mut out: Vec<String> = exts
                .iter()
                .map(|e| normalize_extension(e))
                .filter(|e| !e.is_empty())
                .collect();
            out.sort();
            out.dedup();
            out
        };
        self.allowed_extensions = clean(self.allowed_extensions);
        self.video_extensions = clean(self.video_extensions);
        self
    }

    /// Check every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_downloads == 0 {
            return Err(ConfigError::invalid(
                "max_concurrent_downloads",
                "must be at least 1",
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "must be at least 1 byte"));
        }
        if self.fingerprint_chunk_size == 0 {
            return Err(ConfigError::invalid(
                "fingerprint_chunk_size",
                "must be at least 1 byte",
            ));
        }
        if self.progress_batch == 0 {
            return Err(ConfigError::invalid("progress_batch", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "must be at least 1 second",
            ));
        }
        if self
            .allowed_extensions
            .iter()
            .all(|e| normalize_extension(e).is_empty())
        {
            return Err(ConfigError::invalid(
                "allowed_extensions",
                "at least one extension is required",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            chunk_size: self.chunk_size,
            max_concurrent: self.max_concurrent_downloads,
        }
    }

    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            video_extensions: self.video_extensions.clone(),
            animated_as_video: self.animated_images_as_video,
            hash_algorithm: self.hash_algorithm,
            fingerprint_chunk_size: self.fingerprint_chunk_size,
            fingerprint_threads: self.fingerprint_threads,
            progress_batch: self.progress_batch,
            removal_mode: self.removal_mode,
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
