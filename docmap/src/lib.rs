//! Main docmap crate: a lightweight object-document mapping layer.
//!
//! Declare a document type with a name, a collection and an optional schema, then
//! create map-like records and persist them with `save`, `find`, `delete` and `count`.
//! This crate re-exports the core types from the sub-crates and gives access to the
//! storage backends.
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryConnector};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let connection = Connection::new(InMemoryConnector::new());
//!     connection.connect("memory://", "app", ConnectOptions::default()).await?;
//!
//!     let schema = Schema::new()
//!         .field("first_name", FieldRule::new(FieldKind::String).required())
//!         .field("last_name", FieldKind::String);
//!     let users = connection.declare("User", Some("users"), Some(schema)).await?;
//!
//!     // Unsaved records have no identity; saving inserts every field.
//!     let mut user = users.create([("first_name", "Evan"), ("last_name", "Smith")])?;
//!     user.save().await?;
//!
//!     // Later saves write only the fields that differ from the stored copy.
//!     user["last_name"] = "Jones".into();
//!     user.save().await?;
//!
//!     let found = users.find([("first_name", "Evan")]).await?;
//!     println!("{:?}", found.first_or_none());
//!
//!     connection.shutdown().await
//! }
//! ```
//!
//! # Implicit connection
//!
//! Declaring a type before anything connected makes the connection fall back to the
//! `MONGO_DB_CONNECTION_STRING` and `MONGO_DB_NAME` environment variables. Use
//! [`Connection::builder`](connection::Connection::builder) with a
//! [`FallbackConfig`](config::FallbackConfig) to supply other values or disable it.
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmap_core::{
    attributes, backend, collection, config, connection, document, document_type, error, query,
    result, schema,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmap_memory::{InMemoryConnector, InMemoryStore};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmap_mongodb::{MongoDbConnector, MongoDbStore};
}
