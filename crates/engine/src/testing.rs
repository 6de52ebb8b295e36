//! Scripted network for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use shellcache_core::{Error, Request, Response, ResponseKind};
use tokio::sync::Notify;

use crate::network::Network;

enum Route {
    Respond(Response),
    Fail,
    Crash,
}

/// [`Network`] double with per-URL scripted outcomes and call counters.
///
/// Unscripted URLs fail like an unreachable host.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, usize>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `response.url` with `response`.
    pub(crate) fn respond(&self, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(response.url.clone(), Route::Respond(response));
    }

    /// Fail requests for `url` with a network error.
    pub(crate) fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
    }

    /// Panic inside the fetch for `url`, like a crashing network stack.
    pub(crate) fn crash(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Crash);
    }

    /// Hold every fetch until the returned gate is notified, once per fetch.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        // Resolve before panicking so the routes lock is never poisoned.
        let outcome = match self.routes.lock().unwrap().get(&url) {
            Some(Route::Respond(response)) => Some(Ok(response.clone())),
            Some(Route::Fail) => Some(Err(Error::Network(format!("{url}: connection refused")))),
            Some(Route::Crash) => None,
            None => Some(Err(Error::Network(format!("{url}: no route to host")))),
        };
        outcome.unwrap_or_else(|| panic!("network stack crashed fetching {url}"))
    }
}

/// A plain 200 text/html response.
pub(crate) fn ok_response(url: &str, body: &str) -> Response {
    Response {
        url: url.to_string(),
        status: 200,
        status_text: "OK".to_string(),
        kind: ResponseKind::Basic,
        headers: vec![("content-type".to_string(), "text/html".to_string())],
        body: Bytes::from(body.to_string()),
    }
}
