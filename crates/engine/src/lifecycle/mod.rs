//! Install and activate.
//!
//! Install precaches the app shell and then skips the waiting phase, so a new
//! version takes over without every tab closing first. Activate drops every
//! generation the current version doesn't name and claims all open pages.
//!
//! Deleting stale generations is not synchronised with fetches. A fetch that
//! still holds a handle to a generation being purged gets a logged
//! `GENERATION_MISSING` on its write; the generation does not come back.

pub mod clients;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, Generation, Request};
use url::Url;

use crate::worker::Worker;

pub use clients::Clients;

/// Lifecycle of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting for the previous version to let go.
    Installed,
    Activating,
    Activated,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// Precache URLs now stored, in manifest order.
    pub precached: Vec<String>,
    /// Precache URLs that could not be fetched or stored.
    pub failed: Vec<String>,
    /// Set when install went straight on to activation.
    pub activation: Option<ActivateReport>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    /// Generations from earlier versions that were deleted.
    pub evicted: Vec<String>,
    /// Generations whose deletion failed.
    pub failed: Vec<String>,
    /// Pages controlled after claiming.
    pub claimed: usize,
}

impl Worker {
    /// Precache the app shell, then skip waiting.
    ///
    /// A precache entry that fails is logged and listed in the report; it
    /// never aborts the install.
    ///
    /// If the shell generation can't be opened the worker returns to the state
    /// it was in, so the install can be retried.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let previous = self.state().await;
        self.set_state(WorkerState::Installing).await;

        let policy = self.policy();
        tracing::info!(version = %policy.version, generation = %policy.shell_cache, "precaching app shell");

        let shell = match self.db().open_generation(&policy.shell_cache).await {
            Ok(shell) => shell,
            Err(e) => {
                self.set_state(previous).await;
                return Err(e);
            }
        };
        let results = join_all(policy.precache.iter().map(|url| self.precache_one(&shell, url))).await;

        let mut report = InstallReport::default();
        for (url, result) in policy.precache.iter().zip(results) {
            match result {
                Ok(()) => report.precached.push(url.to_string()),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "precache failed, continuing install");
                    report.failed.push(url.to_string());
                }
            }
        }

        self.set_state(WorkerState::Installed).await;
        report.activation = self.skip_waiting().await?;

        Ok(report)
    }

    async fn precache_one(&self, shell: &Generation, url: &Url) -> Result<(), Error> {
        let request = Request::get(url.clone());
        let response = self.network().fetch(&request).await?;
        if !response.is_ok() {
            return Err(Error::Network(format!("{url} returned status {}", response.status)));
        }
        shell.put(&request, &response).await
    }

    /// Leave the waiting phase now.
    ///
    /// Only an installed, waiting worker moves on; it is activated before this
    /// returns. In any other state this does nothing and returns `None`.
    /// A failed activation leaves the worker waiting, so it can be retried.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Installed {
                tracing::debug!(state = ?*state, "skip waiting: nothing is waiting");
                return Ok(None);
            }
            *state = WorkerState::Activating;
        }

        match self.activate().await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                Err(e)
            }
        }
    }

    /// Delete every generation the current version doesn't name, then claim all pages.
    ///
    /// Safe to repeat. If the generations can't be listed the worker returns
    /// to the state it was in.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let previous = self.state().await;
        self.set_state(WorkerState::Activating).await;

        let names = match self.db().generation_names().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(previous).await;
                return Err(e);
            }
        };
        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| !self.policy().is_current_generation(name))
            .collect();

        let (evicted, failed) = self.delete_generations(stale).await;
        let claimed = self.clients().claim().await;

        self.set_state(WorkerState::Activated).await;
        tracing::info!(evicted = evicted.len(), failed = failed.len(), claimed, "worker activated");

        Ok(ActivateReport { evicted, failed, claimed })
    }

    /// Delete generations independently of each other.
    ///
    /// Returns (deleted, failed). A name that was already gone is in neither list.
    pub(crate) async fn delete_generations(&self, names: Vec<String>) -> (Vec<String>, Vec<String>) {
        let results = join_all(names.iter().map(|name| self.db().delete_generation(name))).await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    tracing::info!(generation = %name, "deleted cache generation");
                    deleted.push(name);
                }
                Ok(false) => tracing::debug!(generation = %name, "cache generation already gone"),
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to delete cache generation");
                    failed.push(name);
                }
            }
        }

        (deleted, failed)
    }

    async fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().await;
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "worker state");
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockNetwork, ok_response};
    use crate::worker::tests::worker_with;

    fn scripted_shell(network: &MockNetwork) {
        network.respond(ok_response("http://localhost:8080/", "<html>root</html>"));
        network.respond(ok_response("http://localhost:8080/index.html", "<html>index</html>"));
        network.respond(ok_response("http://localhost:8080/manifest.json", "{}"));
    }

    #[tokio::test]
    async fn test_install_precaches_manifest_and_activates() {
        let network = MockNetwork::new();
        scripted_shell(&network);
        let worker = worker_with(network).await;

        let report = worker.install().await.unwrap();

        assert_eq!(
            report.precached,
            vec![
                "http://localhost:8080/",
                "http://localhost:8080/index.html",
                "http://localhost:8080/manifest.json"
            ]
        );
        assert!(report.failed.is_empty());
        assert!(report.activation.is_some());
        assert_eq!(worker.state().await, WorkerState::Activated);

        let shell = worker.db().open_generation("ai-chat-v1").await.unwrap();
        assert_eq!(shell.keys().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_install_survives_precache_failures() {
        let network = MockNetwork::new();
        network.respond(ok_response("http://localhost:8080/index.html", "<html>index</html>"));
        let mut missing = ok_response("http://localhost:8080/manifest.json", "");
        missing.status = 404;
        network.respond(missing);
        let worker = worker_with(network).await;

        let report = worker.install().await.unwrap();

        assert_eq!(report.precached, vec!["http://localhost:8080/index.html"]);
        assert_eq!(report.failed, vec!["http://localhost:8080/", "http://localhost:8080/manifest.json"]);
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activate_evicts_prior_generations() {
        let worker = worker_with(MockNetwork::new()).await;
        let db = worker.db();
        for name in ["ai-chat-v0", "ai-chat-v1", "ai-chat-cdn-v0", "ai-chat-cdn-v1", "unrelated"] {
            db.open_generation(name).await.unwrap();
        }

        let report = worker.activate().await.unwrap();

        assert_eq!(report.evicted, vec!["ai-chat-v0", "ai-chat-cdn-v0", "unrelated"]);
        assert!(report.failed.is_empty());
        assert_eq!(db.generation_names().await.unwrap(), vec!["ai-chat-v1", "ai-chat-cdn-v1"]);
    }

    #[tokio::test]
    async fn test_activate_is_repeatable() {
        let worker = worker_with(MockNetwork::new()).await;
        worker.db().open_generation("ai-chat-v0").await.unwrap();

        worker.activate().await.unwrap();
        let second = worker.activate().await.unwrap();

        assert!(second.evicted.is_empty());
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activate_claims_open_pages() {
        let worker = worker_with(MockNetwork::new()).await;
        worker.clients().register("tab-1", false).await;
        worker.clients().register("tab-2", false).await;

        let report = worker.activate().await.unwrap();

        assert_eq!(report.claimed, 2);
        assert!(worker.clients().is_controlled("tab-1").await);
    }

    #[tokio::test]
    async fn test_failed_eviction_does_not_stop_the_rest() {
        let worker = worker_with(MockNetwork::new()).await;
        let db = worker.db();
        for name in ["ai-chat-v1", "old-a", "bad", "old-b"] {
            db.open_generation(name).await.unwrap();
        }
        db.lock_generation("bad").await.unwrap();

        let report = worker.activate().await.unwrap();

        assert_eq!(report.evicted, vec!["old-a", "old-b"]);
        assert_eq!(report.failed, vec!["bad"]);
        assert_eq!(db.generation_names().await.unwrap(), vec!["ai-chat-v1", "bad"]);
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_failed_install_restores_state() {
        let worker = worker_with(MockNetwork::new()).await;
        worker.db().clone().close().await.unwrap();

        assert!(worker.install().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_failed_activation_keeps_worker_waiting() {
        let worker = worker_with(MockNetwork::new()).await;
        worker.set_state(WorkerState::Installed).await;
        worker.db().clone().close().await.unwrap();

        assert!(worker.skip_waiting().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_failed_activate_event_restores_state() {
        let worker = worker_with(MockNetwork::new()).await;
        worker.db().clone().close().await.unwrap();

        assert!(worker.activate().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_skip_waiting_only_from_installed() {
        let worker = worker_with(MockNetwork::new()).await;
        assert_eq!(worker.state().await, WorkerState::Parsed);
        assert!(worker.skip_waiting().await.unwrap().is_none());
        assert_eq!(worker.state().await, WorkerState::Parsed);

        worker.set_state(WorkerState::Installed).await;
        assert!(worker.skip_waiting().await.unwrap().is_some());
        assert_eq!(worker.state().await, WorkerState::Activated);
    }
}
