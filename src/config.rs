//! Settings for the API client and the local caches, read from
//! ~/.config/showreel/config.toml.
//!
//! Every key is optional. Keys the parser does not recognise are accepted
//! but logged, since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::fetch::DEFAULT_BASE_URL;

/// Environment variable that overrides `api_key` from the config file.
pub const API_KEY_ENV: &str = "TMDB_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Effective settings after merging the file over built-in defaults.
///
/// `Debug` prints `api_key` as `[REDACTED]`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the movie API. HTTPS required except for localhost.
    pub api_base_url: String,

    /// API key (alternative to the TMDB_API_KEY env var).
    /// Env var takes precedence over config file.
    pub api_key: Option<String>,

    /// Language tag sent with every request.
    pub language: String,

    /// Per-request timeout for the remote fetcher, in seconds.
    pub request_timeout_secs: u64,

    /// Hours a cached page stays valid.
    pub cache_ttl_hours: i64,

    /// Capacity of the in-memory page cache (0 disables it).
    pub memory_cache_entries: usize,

    /// Number of recent search queries to keep.
    pub recent_queries_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            language: "en-US".to_string(),
            request_timeout_secs: 20,
            cache_ttl_hours: 24,
            memory_cache_entries: 64,
            recent_queries_limit: 10,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("language", &self.language)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("memory_cache_entries", &self.memory_cache_entries)
            .field("recent_queries_limit", &self.recent_queries_limit)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "api_base_url",
        "api_key",
        "language",
        "request_timeout_secs",
        "cache_ttl_hours",
        "memory_cache_entries",
        "recent_queries_limit",
    ];

    /// Read settings from `path`.
    ///
    /// A missing or blank file gives the defaults. Files over 1 MiB and
    /// malformed TOML are errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            base_url = %config.api_base_url,
            language = %config.language,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Effective API key: `TMDB_API_KEY` if set and non-empty, else the file value.
    pub fn api_key(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
