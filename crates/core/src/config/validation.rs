//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - a cache generation name is empty, or both names are equal
    /// - a precache path or the fallback path leaves the worker's origin
    /// - a CDN host or deny marker is empty
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `max_clients` is 0
    ///
    /// Returns `ConfigError::Missing` if the precache manifest is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;

        if self.shell_cache.is_empty() {
            return Err(invalid("shell_cache", "must not be empty"));
        }
        if self.cdn_cache.is_empty() {
            return Err(invalid("cdn_cache", "must not be empty"));
        }
        if self.shell_cache == self.cdn_cache {
            return Err(invalid("cdn_cache", "must differ from shell_cache"));
        }

        if self.precache.is_empty() {
            return Err(ConfigError::Missing {
                field: "precache".into(),
                hint: "list at least the application's root document".into(),
            });
        }
        for url in self.precache_urls()? {
            if url.origin() != origin.origin() {
                return Err(invalid("precache", format!("{url} is not on the worker's origin")));
            }
        }

        let fallback = self.offline_fallback_url()?;
        if fallback.origin() != origin.origin() {
            return Err(invalid("offline_fallback", format!("{fallback} is not on the worker's origin")));
        }
        if !self.precache_urls()?.contains(&fallback) {
            tracing::warn!(
                fallback = %fallback,
                "offline_fallback is not precached; offline navigations may fail until it is fetched once"
            );
        }

        if self.cdn_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(invalid("cdn_hosts", "entries must not be empty"));
        }
        if self.deny_markers.iter().any(|m| m.is_empty()) {
            return Err(invalid("deny_markers", "entries must not be empty"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.max_clients == 0 {
            return Err(invalid("max_clients", "must be greater than 0"));
        }

        Ok(())
    }
}
