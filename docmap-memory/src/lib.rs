//! In-memory document storage backend for docmap.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait and a matching `Connector`. It uses async-aware read-write locks for
//! concurrent access and is meant for development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB-style filters** - Equality, comparisons, `$in`/`$nin`, `$exists` and logical operators
//! - **Partial updates** - `$set` and `$unset` with dotted paths
//! - **Unique indexes** - Duplicate keys are rejected on insert and update
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{connection::Connection, config::ConnectOptions, memory::InMemoryConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Connection::new(InMemoryConnector::new());
//!     connection.connect("memory://", "app", ConnectOptions::default()).await?;
//!
//!     let users = connection.declare("User", Some("users"), None).await?;
//!     users.create([("name", "Alice")])?.save().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_memory;

pub mod store;
pub mod evaluator;

pub use store::{InMemoryConnector, InMemoryStore};
