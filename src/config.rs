//! Configuration file parser for ~/.config/newsroom/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown top-level keys are accepted by serde but logged as likely typos.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::content::DEFAULT_MAX_ARTICLE_BYTES;
use crate::feed::fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_BYTES};
use crate::feed::RetryPolicy;
use crate::news::{AggregatorOptions, Category, FeedTable, Provider};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Well-formed TOML with a value that cannot be used.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Where list and article responses are cached between invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Memory,
    Off,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-HTTP-request timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Overall deadline for one aggregation. 0 = none.
    pub request_timeout_secs: u64,

    /// Attempts per feed, including the first. Must be at least 1.
    pub max_attempts: u32,

    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,

    /// Also retry 5xx, connect errors and timeouts, not just Retry-After.
    pub retry_transient_errors: bool,

    /// Maximum simultaneous feed fetches. 0 = unbounded.
    pub max_concurrent_fetches: usize,

    pub max_feed_bytes: usize,
    pub max_article_bytes: usize,

    /// Accept source and article URLs on localhost or private networks.
    pub allow_private_hosts: bool,

    pub cache_backend: CacheBackend,
    pub cache_ttl_secs: u64,
    pub memory_cache_entries: usize,

    /// SQLite cache location. Defaults to `cache.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Per-provider feed overrides, e.g. `[feeds.bbc] general = "..."`.
    pub feeds: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            request_timeout_secs: 0,
            max_attempts: retry.max_attempts,
            backoff_base_ms: retry.base_delay.as_millis() as u64,
            backoff_max_ms: retry.max_delay.as_millis() as u64,
            retry_transient_errors: false,
            max_concurrent_fetches: 0,
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            max_article_bytes: DEFAULT_MAX_ARTICLE_BYTES,
            allow_private_hosts: false,
            cache_backend: CacheBackend::Sqlite,
            cache_ttl_secs: 300,
            memory_cache_entries: 256,
            database_path: None,
            feeds: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Longest accepted `cache_ttl_secs` (one year).
    const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

    const KNOWN_KEYS: [&'static str; 15] = [
        "fetch_timeout_secs",
        "request_timeout_secs",
        "max_attempts",
        "backoff_base_ms",
        "backoff_max_ms",
        "retry_transient_errors",
        "max_concurrent_fetches",
        "max_feed_bytes",
        "max_article_bytes",
        "allow_private_hosts",
        "cache_backend",
        "cache_ttl_secs",
        "memory_cache_entries",
        "database_path",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unusable values (zero attempts, unknown feed names) → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file is never pulled into memory
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
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            cache = ?config.cache_backend,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be at least 1".into(),
            ));
        }
        if self.cache_ttl_secs > Self::MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache_ttl_secs ({}) exceeds the maximum of {}",
                self.cache_ttl_secs,
                Self::MAX_CACHE_TTL_SECS
            )));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid(format!(
                "backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        self.feed_table().map(|_| ())
    }

    /// The built-in feed table with `[feeds.*]` overrides applied.
    ///
    /// An override replaces every entry of its provider, so it must name a
    /// `general` feed.
    pub fn feed_table(&self) -> Result<FeedTable, ConfigError> {
        let mut table = FeedTable::default();

        for (name, feeds) in &self.feeds {
            let provider = name
                .parse::<Provider>()
                .ok()
                .filter(|p| Provider::KNOWN.contains(p))
                .ok_or_else(|| ConfigError::Invalid(format!("feeds.{name}: unknown provider")))?;

            if !feeds.contains_key(Category::General.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "feeds.{name}: a `general` feed is required"
                )));
            }

            table.remove_provider(provider);
            for (category, url) in feeds {
                let category = category.parse::<Category>().map_err(|_| {
                    ConfigError::Invalid(format!("feeds.{name}.{category}: unknown category"))
                })?;
                url::Url::parse(url).map_err(|e| {
                    ConfigError::Invalid(format!("feeds.{name}.{category}: {e}"))
                })?;
                table.insert(provider, category, url.as_str());
            }
        }

        Ok(table)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            retry_transient: self.retry_transient_errors,
        }
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            retry: self.retry_policy(),
            max_concurrent: self.max_concurrent_fetches,
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
            allow_private_hosts: self.allow_private_hosts,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir_name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch_timeout_secs, 60);
        assert_eq!(config.request_timeout_secs, 0);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.backoff_base_ms, 1000);
        assert_eq!(config.backoff_max_ms, 30_000);
        assert!(!config.retry_transient_errors);
        assert_eq!(config.max_concurrent_fetches, 0);
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_article_bytes, 5 * 1024 * 1024);
        assert_eq!(config.cache_backend, CacheBackend::Sqlite);
        assert_eq!(config.cache_ttl_secs, 300);
        assert!(config.database_path.is_none());
        assert_eq!(config.feed_table().unwrap(), FeedTable::default());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsroom_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.max_attempts, 4);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("newsroom_config_test_whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache_backend, CacheBackend::Sqlite);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
fetch_timeout_secs = 10
request_timeout_secs = 45
max_attempts = 2
backoff_base_ms = 250
backoff_max_ms = 2000
retry_transient_errors = true
max_concurrent_fetches = 3
allow_private_hosts = true
cache_backend = "memory"
cache_ttl_secs = 60
database_path = "/var/tmp/news.db"

[feeds.sky]
general = "https://example.com/sky/uk.xml"
"#;
        let (dir, path) = write_config("newsroom_config_test_full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.database_path, Some(PathBuf::from("/var/tmp/news.db")));

        let options = config.aggregator_options();
        assert_eq!(options.retry.max_attempts, 2);
        assert_eq!(options.retry.base_delay, Duration::from_millis(250));
        assert_eq!(options.retry.max_delay, Duration::from_secs(2));
        assert!(options.retry.retry_transient);
        assert_eq!(options.max_concurrent, 3);
        assert_eq!(options.request_timeout, Some(Duration::from_secs(45)));
        assert!(options.allow_private_hosts);

        let table = config.feed_table().unwrap();
        assert_eq!(
            table.feed_url(Provider::Sky, Category::General),
            Some("https://example.com/sky/uk.xml")
        );
        // The override replaced sky's technology feed; it now falls back
        assert_eq!(
            table.feed_url(Provider::Sky, Category::Technology),
            Some("https://example.com/sky/uk.xml")
        );
        assert_eq!(
            table.feed_url(Provider::Bbc, Category::General),
            Some("http://feeds.bbci.co.uk/news/uk/rss.xml")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_request_deadline_by_default() {
        assert_eq!(Config::default().aggregator_options().request_timeout, None);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("max_attempts = \"many\"\n").is_err());
    }

    #[test]
    fn test_unknown_cache_backend_rejected() {
        assert!(matches!(
            Config::from_toml("cache_backend = \"redis\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("max_attempts = 3\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = Config::from_toml("max_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("max_attempts")));
    }

    #[test]
    fn test_zero_fetch_timeout_rejected() {
        let err = Config::from_toml("fetch_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("fetch_timeout_secs")));
    }

    #[test]
    fn test_oversized_cache_ttl_rejected() {
        let err = Config::from_toml("cache_ttl_secs = 9223372036854775807\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("cache_ttl_secs")));

        let one_year = Config::from_toml("cache_ttl_secs = 31536000\n").unwrap();
        assert_eq!(one_year.cache_ttl(), Duration::from_secs(31_536_000));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let err = Config::from_toml("backoff_base_ms = 5000\nbackoff_max_ms = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_feed_override_errors() {
        let cases = [
            "[feeds.cnn]\ngeneral = \"https://cnn.example/rss.xml\"\n",
            "[feeds.other]\ngeneral = \"https://x.example/rss.xml\"\n",
            "[feeds.bbc]\ntechnology = \"https://bbc.example/tech.xml\"\n",
            "[feeds.bbc]\ngeneral = \"https://bbc.example/uk.xml\"\nweather = \"https://bbc.example/w.xml\"\n",
            "[feeds.bbc]\ngeneral = \"not a url\"\n",
        ];
        for content in cases {
            let err = Config::from_toml(content).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{content}: {err}");
        }
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) =
            write_config("newsroom_config_test_too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
