//! The worker: one version of the offline-caching proxy.
//!
//! Holds the policy, the cache store, the network and the lifecycle state.
//! Event handlers live next to their concern: fetch here, install/activate in
//! [`crate::lifecycle`], messages in [`crate::control`].

use std::sync::Arc;

use shellcache_core::{CacheDb, Error, Request, RequestMode};
use tokio::sync::RwLock;
use url::Url;

use crate::classify::{Classification, classify};
use crate::lifecycle::{Clients, WorkerState};
use crate::network::Network;
use crate::policy::Policy;
use crate::strategy::{Served, Strategy, StrategyEngine};

/// A request intercepted from a controlled page.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub method: String,
    /// Absolute URL as the page sent it; may be malformed.
    pub url: String,
    pub mode: RequestMode,
    /// Page that issued the request, if the host knows it.
    pub client_id: Option<String>,
}

impl FetchEvent {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into(), mode: RequestMode::NoCors, client_id: None }
    }
}

/// What the fetch handler did with a request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host should use its default network handling.
    Passthrough(Classification),
    Responded(Served),
}

pub struct Worker {
    policy: Arc<Policy>,
    db: CacheDb,
    network: Arc<dyn Network>,
    strategies: StrategyEngine,
    clients: Clients,
    pub(crate) state: RwLock<WorkerState>,
}

impl Worker {
    pub fn new(policy: Policy, db: CacheDb, network: Arc<dyn Network>) -> Self {
        let clients = Clients::with_capacity(policy.max_clients);
        let policy = Arc::new(policy);
        let strategies = StrategyEngine::new(db.clone(), Arc::clone(&network), Arc::clone(&policy));

        Self {
            policy,
            db,
            network,
            strategies,
            clients,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub(crate) fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Handle a fetch event.
    ///
    /// Requests that are not GET, carry a deny marker, fail to parse or point
    /// at an unlisted origin pass through untouched.
    pub async fn fetch(&self, event: FetchEvent) -> Result<FetchOutcome, Error> {
        if let Some(client_id) = &event.client_id {
            let controlled = self.state().await == WorkerState::Activated;
            self.clients.register(client_id, controlled).await;
        }

        let Ok(url) = Url::parse(&event.url) else {
            tracing::debug!(url = %event.url, "unparseable request url, not intercepting");
            return Ok(FetchOutcome::Passthrough(Classification::Ignore));
        };

        let classification = classify(&self.policy, &event.method, &url);
        let Some(strategy) = Strategy::for_classification(classification) else {
            tracing::debug!(method = %event.method, url = %url, "passthrough");
            return Ok(FetchOutcome::Passthrough(classification));
        };

        let request = Request::from_url(&event.method, url, event.mode);
        let served = self.strategies.serve(strategy, &request).await?;
        tracing::debug!(url = %request.url, source = ?served.source, status = served.response.status, "responded");

        Ok(FetchOutcome::Responded(served))
    }

    /// Handle the host reporting that a page closed.
    ///
    /// Returns false if the page was never seen or was already forgotten.
    pub async fn client_closed(&self, client_id: &str) -> bool {
        let removed = self.clients.remove(client_id).await;
        tracing::debug!(client = client_id, removed, "page closed");
        removed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{MockNetwork, ok_response};
    use shellcache_core::WorkerConfig;

    pub(crate) async fn worker_with(network: MockNetwork) -> Worker {
        let policy = Policy::from_config(&WorkerConfig::default()).unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        Worker::new(policy, db, Arc::new(network))
    }

    fn responded(outcome: FetchOutcome) -> Served {
        match outcome {
            FetchOutcome::Responded(served) => served,
            FetchOutcome::Passthrough(c) => panic!("expected a response, got passthrough ({c:?})"),
        }
    }

    #[tokio::test]
    async fn test_local_miss_is_fetched_and_stored() {
        let network = MockNetwork::new();
        network.respond(ok_response("http://localhost:8080/index.html", "<html>app</html>"));
        let worker = worker_with(network).await;

        let served = responded(worker.fetch(FetchEvent::get("http://localhost:8080/index.html")).await.unwrap());

        assert_eq!(served.source, ResponseSource::Network);
        let shell = worker.db().open_generation("ai-chat-v1").await.unwrap();
        let stored = Request::get(Url::parse("http://localhost:8080/index.html").unwrap());
        assert!(shell.match_request(&stored).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_local_offline_serves_fallback() {
        let worker = worker_with(MockNetwork::new()).await;
        let shell = worker.db().open_generation("ai-chat-v1").await.unwrap();
        let index = ok_response("http://localhost:8080/index.html", "<html>shell</html>");
        shell
            .put(&Request::get(Url::parse("http://localhost:8080/index.html").unwrap()), &index)
            .await
            .unwrap();

        let served = responded(worker.fetch(FetchEvent::get("http://localhost:8080/chat/42")).await.unwrap());

        assert_eq!(served.source, ResponseSource::Fallback);
        assert_eq!(served.response, index);
    }

    #[tokio::test]
    async fn test_local_offline_without_fallback_is_network_error() {
        let worker = worker_with(MockNetwork::new()).await;
        let result = worker.fetch(FetchEvent::get("http://localhost:8080/index.html")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_api_call_never_touches_cache() {
        let network = MockNetwork::new();
        let worker = worker_with(network).await;

        let outcome = worker
            .fetch(FetchEvent::get("https://api.example.com/api/v1/chat"))
            .await
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Passthrough(Classification::Ignore)));
        assert!(worker.db().generation_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let worker = worker_with(MockNetwork::new()).await;
        let event = FetchEvent { method: "POST".into(), ..FetchEvent::get("http://localhost:8080/index.html") };

        let outcome = worker.fetch(event).await.unwrap();

        assert!(matches!(outcome, FetchOutcome::Passthrough(Classification::Ignore)));
        assert!(worker.db().generation_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_url_passes_through() {
        let worker = worker_with(MockNetwork::new()).await;
        let outcome = worker.fetch(FetchEvent::get("http//broken")).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(Classification::Ignore)));
    }

    #[tokio::test]
    async fn test_cdn_request_uses_cdn_generation() {
        let network = MockNetwork::new();
        network.respond(ok_response("https://cdn.jsdelivr.net/npm/marked/marked.min.js", "marked"));
        let worker = worker_with(network).await;

        let served = responded(
            worker
                .fetch(FetchEvent::get("https://cdn.jsdelivr.net/npm/marked/marked.min.js"))
                .await
                .unwrap(),
        );

        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(worker.db().generation_names().await.unwrap(), vec!["ai-chat-cdn-v1"]);
    }

    #[tokio::test]
    async fn test_new_page_after_activation_is_controlled() {
        let network = MockNetwork::new();
        network.respond(ok_response("http://localhost:8080/index.html", "<html>app</html>"));
        let worker = worker_with(network).await;
        worker.activate().await.unwrap();

        let event = FetchEvent { client_id: Some("tab-9".into()), ..FetchEvent::get("http://localhost:8080/index.html") };
        worker.fetch(event).await.unwrap();

        assert!(worker.clients().is_controlled("tab-9").await);
    }

    #[tokio::test]
    async fn test_closed_pages_leave_the_registry() {
        let worker = worker_with(MockNetwork::new()).await;
        for i in 0..50 {
            let event = FetchEvent { client_id: Some(format!("tab-{i}")), ..FetchEvent::get("https://example.org/") };
            worker.fetch(event).await.unwrap();
            assert!(worker.client_closed(&format!("tab-{i}")).await);
        }

        assert_eq!(worker.clients().len().await, 0);
        assert!(!worker.client_closed("tab-0").await);
    }

    #[tokio::test]
    async fn test_registry_bounded_by_policy() {
        let config = WorkerConfig { max_clients: 8, ..Default::default() };
        let policy = Policy::from_config(&config).unwrap();
        let worker = Worker::new(policy, CacheDb::open_in_memory().await.unwrap(), Arc::new(MockNetwork::new()));

        for i in 0..5000 {
            let event = FetchEvent { client_id: Some(format!("tab-{i}")), ..FetchEvent::get("https://example.org/") };
            worker.fetch(event).await.unwrap();
        }

        assert_eq!(worker.clients().len().await, 8);
    }
}
