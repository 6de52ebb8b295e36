//! Caching-policy engine for shellcache.
//!
//! This crate provides request classification, the two cache strategies,
//! the install/activate lifecycle, the control channel and the event reactor
//! that ties them to a host runtime.

pub mod classify;
pub mod control;
pub mod lifecycle;
pub mod network;
pub mod policy;
pub mod reactor;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classify::{Classification, classify};
pub use control::{ControlCommand, MessageOutcome};
pub use lifecycle::{ActivateReport, Clients, InstallReport, WorkerState};
pub use network::{HttpNetwork, Network, NetworkConfig};
pub use policy::Policy;
pub use reactor::{Event, EventOutcome, Reactor, ReactorHandle};
pub use strategy::{ResponseSource, Served, Strategy};
pub use worker::{FetchEvent, FetchOutcome, Worker};
