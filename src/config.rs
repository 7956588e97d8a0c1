//! Configuration file parser for ~/.config/ondoku/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

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

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MediaWiki API endpoint used for the "on this day" page.
    pub wikipedia_api_url: String,

    /// Base URL that event links point at.
    pub wikipedia_page_url: String,

    /// RSS feed for headlines.
    pub news_feed_url: String,

    /// JMA overview forecast directory; `{region}.json` is appended.
    pub weather_base_url: String,

    /// JMA region code (130000 = Tokyo).
    pub weather_region: String,

    /// User-Agent sent with every provider request.
    pub user_agent: String,

    /// Overall budget for one source, retries included.
    pub source_timeout_secs: u64,

    /// Budget for a single HTTP request.
    pub request_timeout_secs: u64,

    /// How long a cached bundle stays fresh.
    pub cache_ttl_hours: u64,

    /// `cache prune` removes entries stored more than this many days ago.
    pub cache_prune_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wikipedia_api_url: "https://ja.wikipedia.org/w/api.php".to_string(),
            wikipedia_page_url: "https://ja.wikipedia.org/wiki".to_string(),
            news_feed_url: "https://www.nhk.or.jp/rss/news/cat0.xml".to_string(),
            weather_base_url: "https://www.jma.go.jp/bosai/forecast/data/overview_forecast"
                .to_string(),
            weather_region: "130000".to_string(),
            user_agent: concat!("ondoku/", env!("CARGO_PKG_VERSION")).to_string(),
            source_timeout_secs: 15,
            request_timeout_secs: 10,
            cache_ttl_hours: 24,
            cache_prune_days: 7,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "wikipedia_api_url",
        "wikipedia_page_url",
        "news_feed_url",
        "weather_base_url",
        "weather_region",
        "user_agent",
        "source_timeout_secs",
        "request_timeout_secs",
        "cache_ttl_hours",
        "cache_prune_days",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading
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
            region = %config.weather_region,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours.min(i64::MAX as u64 / 3600) as i64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.weather_region, "130000");
        assert_eq!(config.source_timeout_secs, 15);
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.cache_prune_days, 7);
        assert!(config.user_agent.starts_with("ondoku/"));
        assert_eq!(config.cache_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/ondoku_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.weather_region, "130000");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("ondoku_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  ").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.news_feed_url, Config::default().news_feed_url);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("ondoku_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "weather_region = \"270000\"\nsource_timeout_secs = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.weather_region, "270000");
        assert_eq!(config.source_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache_ttl_hours, 24); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("ondoku_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("ondoku_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "weather_region = \"016000\"\nthemee = \"dark\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.weather_region, "016000");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("ondoku_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "cache_ttl_hours = \"a day\"\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("ondoku_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_timeouts_are_clamped() {
        let config = Config {
            source_timeout_secs: 0,
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.source_timeout(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
