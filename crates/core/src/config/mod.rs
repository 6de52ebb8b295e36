//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Scope URL of the worker. Its origin is the "local" origin and
    /// relative precache paths resolve against it.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Application-shell cache generation name.
    ///
    /// Bump it to retire the previous shell on the next activation.
    #[serde(default = "default_shell_cache")]
    pub shell_cache: String,

    /// Third-party (CDN) cache generation name.
    #[serde(default = "default_cdn_cache")]
    pub cdn_cache: String,

    /// Build version, logged at install time.
    #[serde(default = "default_version")]
    pub version: String,

    /// Ordered list of local resources cached at install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Hostnames served with stale-while-revalidate.
    #[serde(default = "default_cdn_hosts")]
    pub cdn_hosts: Vec<String>,

    /// URL substrings that are never cached (API calls, inference hosts).
    #[serde(default = "default_deny_markers")]
    pub deny_markers: Vec<String>,

    /// Document served when the network fails for an uncached local request.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Path to SQLite cache storage.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per network response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum redirects followed per network request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Maximum number of open pages tracked at once.
    ///
    /// Past this, the page seen least recently is forgotten.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_shell_cache() -> String {
    "ai-chat-v1".into()
}

fn default_cdn_cache() -> String {
    "ai-chat-cdn-v1".into()
}

fn default_version() -> String {
    "1.0.0".into()
}

fn default_precache() -> Vec<String> {
    vec!["./".into(), "./index.html".into(), "./manifest.json".into()]
}

fn default_cdn_hosts() -> Vec<String> {
    vec![
        "cdn.tailwindcss.com".into(),
        "cdn.jsdelivr.net".into(),
        "fonts.googleapis.com".into(),
        "fonts.gstatic.com".into(),
    ]
}

fn default_deny_markers() -> Vec<String> {
    vec!["openrouter.ai".into(), "api/v1/".into()]
}

fn default_offline_fallback() -> String {
    "./index.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_clients() -> usize {
    1024
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            shell_cache: default_shell_cache(),
            cdn_cache: default_cdn_cache(),
            version: default_version(),
            precache: default_precache(),
            cdn_hosts: default_cdn_hosts(),
            deny_markers: default_deny_markers(),
            offline_fallback: default_offline_fallback(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            max_clients: default_max_clients(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed scope URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Resolve a local resource path against the scope URL.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        let base = self.origin_url()?;
        base.join(path)
            .map_err(|e| ConfigError::Invalid { field: "precache".into(), reason: format!("{path}: {e}") })
    }

    /// Precache manifest resolved to absolute URLs, in manifest order.
    pub fn precache_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.precache.iter().map(|path| self.resolve(path)).collect()
    }

    /// Offline fallback document as an absolute URL.
    pub fn offline_fallback_url(&self) -> Result<Url, ConfigError> {
        self.resolve(&self.offline_fallback)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
