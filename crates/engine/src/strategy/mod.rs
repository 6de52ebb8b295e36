//! Cache strategies.
//!
//! Two strategies, picked by [`Classification`]:
//! - cache-first with network fallback for local app resources
//! - stale-while-revalidate for allow-listed CDN resources
//!
//! Both open their target generation lazily, so the CDN generation only
//! appears once the first CDN request is served.

pub mod cache_first;
pub mod stale_while_revalidate;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{CacheDb, Error, Request, Response};
use tokio::task::JoinHandle;

use crate::classify::Classification;
use crate::network::Network;
use crate::policy::Policy;

pub use cache_first::cache_first;
pub use stale_while_revalidate::stale_while_revalidate;

/// Background refresh started by stale-while-revalidate.
///
/// Dropping the handle detaches the task; its cache write still lands.
pub type Revalidation = JoinHandle<Result<Response, Error>>;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The offline fallback document, served because the network failed.
    Fallback,
}

/// A response produced by a strategy.
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    pub revalidation: Option<Revalidation>,
}

impl Served {
    pub(crate) fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source, revalidation: None }
    }

    /// Wait for the background refresh, if one was started.
    pub async fn settle(&mut self) -> Option<Result<Response, Error>> {
        let handle = self.revalidation.take()?;
        Some(
            handle
                .await
                .unwrap_or_else(|e| Err(Error::Worker(format!("revalidation task failed: {e}")))),
        )
    }
}

/// The strategy used for a classification, if the request is intercepted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn for_classification(classification: Classification) -> Option<Self> {
        match classification {
            Classification::Ignore => None,
            Classification::LocalAppResource => Some(Self::CacheFirst),
            Classification::CdnResource => Some(Self::StaleWhileRevalidate),
        }
    }
}

/// Runs strategies against the worker's store and network.
#[derive(Clone)]
pub struct StrategyEngine {
    db: CacheDb,
    network: Arc<dyn Network>,
    policy: Arc<Policy>,
}

impl StrategyEngine {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, policy: Arc<Policy>) -> Self {
        Self { db, network, policy }
    }

    /// Serve `request` with `strategy` against the generation the policy assigns to it.
    pub async fn serve(&self, strategy: Strategy, request: &Request) -> Result<Served, Error> {
        match strategy {
            Strategy::CacheFirst => {
                cache_first(
                    &self.db,
                    self.network.as_ref(),
                    request,
                    &self.policy.shell_cache,
                    &self.policy.offline_fallback,
                )
                .await
            }
            Strategy::StaleWhileRevalidate => {
                stale_while_revalidate(&self.db, Arc::clone(&self.network), request, &self.policy.cdn_cache).await
            }
        }
    }
}
