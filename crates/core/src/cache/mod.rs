//! SQLite-backed cache storage for named cache generations.
//!
//! This module provides the persistent request -> response store the worker
//! consumes, using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named generations, enumerated in creation order
//! - Entries keyed by SHA-256 of the normalized request identity
//! - Automatic schema migrations
//! - Cascading deletion of a generation and everything in it

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::Generation;
