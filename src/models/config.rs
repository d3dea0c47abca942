//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variables consulted for the backend endpoint, in order.
pub const URL_ENV_VARS: [&str; 2] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];

/// Environment variables consulted for the backend access key, in order.
pub const KEY_ENV_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Row store connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Category mapping cache behavior
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query limits
    #[serde(default)]
    pub queries: QueryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override backend credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override backend credentials using the given variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(url) = first(&URL_ENV_VARS) {
            self.backend.url = url;
        }
        if let Some(key) = first(&KEY_ENV_VARS) {
            self.backend.anon_key = key;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            return Err(AppError::config(format!(
                "backend.url is empty (set it or {})",
                URL_ENV_VARS[0]
            )));
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err(AppError::config(format!(
                "backend.anon_key is empty (set it or {})",
                KEY_ENV_VARS[0]
            )));
        }
        url::Url::parse(&self.backend.url)?;
        if self.backend.table.trim().is_empty() {
            return Err(AppError::validation("backend.table is empty"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(AppError::validation("backend.timeout_secs must be > 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::validation("cache.ttl_secs must be > 0"));
        }
        if self.queries.feed_limit == 0 {
            return Err(AppError::validation("queries.feed_limit must be > 0"));
        }
        if self.queries.categories_limit == 0 {
            return Err(AppError::validation("queries.categories_limit must be > 0"));
        }
        Ok(())
    }
}

/// Row store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project endpoint (e.g., "https://xyz.supabase.co")
    #[serde(default)]
    pub url: String,

    /// Anonymous access key
    #[serde(default)]
    pub anon_key: String,

    /// Article table name
    #[serde(default = "defaults::table")]
    pub table: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            table: defaults::table(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Category mapping cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshot validity window in seconds
    #[serde(default = "defaults::ttl")]
    pub ttl_secs: u64,

    /// Attempts per refresh cycle
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::ttl(),
            max_retries: defaults::max_retries(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// Row limits applied by the query functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Homepage feed size
    #[serde(default = "defaults::feed_limit")]
    pub feed_limit: usize,

    /// Default number of related articles
    #[serde(default = "defaults::related_limit")]
    pub related_limit: usize,

    /// Category rows scanned when listing categories
    #[serde(default = "defaults::categories_limit")]
    pub categories_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            feed_limit: defaults::feed_limit(),
            related_limit: defaults::related_limit(),
            categories_limit: defaults::categories_limit(),
        }
    }
}

mod defaults {
    // Backend defaults
    pub fn table() -> String {
        "ditorja_frontend".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn user_agent() -> String {
        concat!("ditorja/", env!("CARGO_PKG_VERSION")).into()
    }

    // Cache defaults
    pub fn ttl() -> u64 {
        300
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        1000
    }

    // Query defaults
    pub fn feed_limit() -> usize {
        10
    }
    pub fn related_limit() -> usize {
        3
    }
    pub fn categories_limit() -> usize {
        50
    }
}
