//! Request classification.
//!
//! Decides, per outgoing request, whether the worker answers it and with
//! which strategy. Pure: no I/O, no state beyond the policy.

use crate::policy::Policy;
use serde::{Deserialize, Serialize};
use url::Url;

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Not intercepted; the host performs its default network handling.
    Ignore,
    /// Same-origin resource, served cache-first.
    LocalAppResource,
    /// Allow-listed third-party resource, served stale-while-revalidate.
    CdnResource,
}

/// Classify a request by method and parsed URL.
///
/// URLs that fail to parse never reach here; the fetch handler lets them
/// through untouched.
pub fn classify(policy: &Policy, method: &str, url: &Url) -> Classification {
    if !method.trim().eq_ignore_ascii_case("GET") {
        return Classification::Ignore;
    }

    let href = url.as_str();
    if policy.deny_markers.iter().any(|marker| href.contains(marker.as_str())) {
        return Classification::Ignore;
    }

    if url.origin() == policy.origin.origin() {
        return Classification::LocalAppResource;
    }

    match url.host_str() {
        Some(host) if policy.cdn_hosts.contains(host) => Classification::CdnResource,
        _ => Classification::Ignore,
    }
}
