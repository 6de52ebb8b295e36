//! The worker's immutable caching policy.
//!
//! Built once from [`WorkerConfig`] at startup and shared by reference with
//! the classifier, the strategies and the lifecycle manager.

use std::collections::HashSet;

use shellcache_core::{ConfigError, WorkerConfig};
use url::Url;

#[derive(Debug, Clone)]
pub struct Policy {
    /// Scope URL; its origin is the local origin.
    pub origin: Url,
    pub shell_cache: String,
    pub cdn_cache: String,
    pub version: String,
    /// Precache manifest, absolute and in manifest order.
    pub precache: Vec<Url>,
    pub offline_fallback: Url,
    pub cdn_hosts: HashSet<String>,
    pub deny_markers: Vec<String>,
    /// Bound on tracked pages.
    pub max_clients: usize,
}

impl Policy {
    /// Validate `config` and resolve every path it names.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            origin: config.origin_url()?,
            shell_cache: config.shell_cache.clone(),
            cdn_cache: config.cdn_cache.clone(),
            version: config.version.clone(),
            precache: config.precache_urls()?,
            offline_fallback: config.offline_fallback_url()?,
            cdn_hosts: config.cdn_hosts.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
            deny_markers: config.deny_markers.clone(),
            max_clients: config.max_clients,
        })
    }

    /// Whether a generation name belongs to the current version.
    pub fn is_current_generation(&self, name: &str) -> bool {
        name == self.shell_cache || name == self.cdn_cache
    }
}
