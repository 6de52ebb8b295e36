//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Cache generation store with SQLite backend
//! - Request/response value types
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, Generation};
pub use config::{ConfigError, WorkerConfig};
pub use error::Error;
pub use http::{Request, RequestMode, Response, ResponseKind};
