//! Event reactor.
//!
//! The host delivers install, activate, fetch and message events through a
//! [`ReactorHandle`]. The reactor spawns one task per event, so a slow fetch
//! never delays another and a panicking handler only loses its own reply.

use std::sync::Arc;

use serde_json::Value;
use shellcache_core::Error;
use tokio::sync::{mpsc, oneshot};

use crate::control::MessageOutcome;
use crate::lifecycle::{ActivateReport, InstallReport};
use crate::worker::{FetchEvent, FetchOutcome, Worker};

/// Default number of events that may queue before senders wait.
pub const DEFAULT_CAPACITY: usize = 256;

/// An event delivered by the host runtime.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(FetchEvent),
    Message(Value),
    /// A page closed; the host passes its client id.
    ClientClosed(String),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
            Self::Message(_) => "message",
            Self::ClientClosed(_) => "client-closed",
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Install(InstallReport),
    Activate(ActivateReport),
    Fetch(FetchOutcome),
    Message(MessageOutcome),
    /// Whether the page was still tracked.
    ClientClosed(bool),
}

impl EventOutcome {
    fn kind(&self) -> &'static str {
        match self {
            Self::Install(_) => "install",
            Self::Activate(_) => "activate",
            Self::Fetch(_) => "fetch",
            Self::Message(_) => "message",
            Self::ClientClosed(_) => "client-closed",
        }
    }
}

/// Reactor-level failures, surfaced to callers as `WORKER_ERROR`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("reactor is not running")]
    Closed,

    #[error("{0} handler stopped before replying")]
    Aborted(&'static str),

    #[error("{expected} event produced a {actual} outcome")]
    Mismatch { expected: &'static str, actual: &'static str },
}

impl From<DispatchError> for Error {
    fn from(err: DispatchError) -> Self {
        Error::Worker(err.to_string())
    }
}

struct Envelope {
    event: Event,
    reply: oneshot::Sender<Result<EventOutcome, Error>>,
}

pub struct Reactor {
    worker: Arc<Worker>,
    inbox: mpsc::Receiver<Envelope>,
}

impl Reactor {
    pub fn new(worker: Arc<Worker>, capacity: usize) -> (Self, ReactorHandle) {
        let (tx, inbox) = mpsc::channel(capacity);
        let handle = ReactorHandle { tx, worker: Arc::clone(&worker) };
        (Self { worker, inbox }, handle)
    }

    /// Start the reactor on the current Tokio runtime.
    pub fn spawn(worker: Arc<Worker>) -> ReactorHandle {
        let (reactor, handle) = Self::new(worker, DEFAULT_CAPACITY);
        tokio::spawn(reactor.run());
        handle
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(Envelope { event, reply }) = self.inbox.recv().await {
            let worker = Arc::clone(&self.worker);
            tokio::spawn(async move {
                let kind = event.kind();
                let result = dispatch(&worker, event).await;
                if let Err(e) = &result {
                    tracing::debug!(event = kind, error = %e, "event handler failed");
                }
                if reply.send(result).is_err() {
                    tracing::debug!(event = kind, "caller went away before the reply");
                }
            });
        }
        tracing::debug!("reactor inbox closed");
    }
}

async fn dispatch(worker: &Worker, event: Event) -> Result<EventOutcome, Error> {
    match event {
        Event::Install => worker.install().await.map(EventOutcome::Install),
        Event::Activate => worker.activate().await.map(EventOutcome::Activate),
        Event::Fetch(fetch) => worker.fetch(fetch).await.map(EventOutcome::Fetch),
        Event::Message(data) => worker.message(&data).await.map(EventOutcome::Message),
        Event::ClientClosed(id) => Ok(EventOutcome::ClientClosed(worker.client_closed(&id).await)),
    }
}

/// Cloneable entry point into a running reactor.
#[derive(Clone)]
pub struct ReactorHandle {
    tx: mpsc::Sender<Envelope>,
    worker: Arc<Worker>,
}

impl ReactorHandle {
    /// The worker behind the reactor, for read-only status queries.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Deliver an event and wait for its handler to finish.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        let kind = event.kind();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| DispatchError::Closed)?;
        rx.await.map_err(|_| DispatchError::Aborted(kind))?
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        match self.dispatch(Event::Install).await? {
            EventOutcome::Install(report) => Ok(report),
            other => Err(mismatch("install", &other)),
        }
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        match self.dispatch(Event::Activate).await? {
            EventOutcome::Activate(report) => Ok(report),
            other => Err(mismatch("activate", &other)),
        }
    }

    pub async fn fetch(&self, event: FetchEvent) -> Result<FetchOutcome, Error> {
        match self.dispatch(Event::Fetch(event)).await? {
            EventOutcome::Fetch(outcome) => Ok(outcome),
            other => Err(mismatch("fetch", &other)),
        }
    }

    pub async fn message(&self, data: Value) -> Result<MessageOutcome, Error> {
        match self.dispatch(Event::Message(data)).await? {
            EventOutcome::Message(outcome) => Ok(outcome),
            other => Err(mismatch("message", &other)),
        }
    }

    pub async fn client_closed(&self, client_id: impl Into<String>) -> Result<bool, Error> {
        match self.dispatch(Event::ClientClosed(client_id.into())).await? {
            EventOutcome::ClientClosed(removed) => Ok(removed),
            other => Err(mismatch("client-closed", &other)),
        }
    }
}

fn mismatch(expected: &'static str, actual: &EventOutcome) -> Error {
    DispatchError::Mismatch { expected, actual: actual.kind() }.into()
}
