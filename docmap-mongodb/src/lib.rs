//! MongoDB backend implementation for docmap.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait
//! over the official driver. Filters are handed to the server unchanged.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmap = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! [`MongoDbConnector`] parses the connection string, builds a client and pings the
//! server. Server selection failures are reported as unreachable, so the connection
//! retries them with backoff.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use docmap::{config::ConnectOptions, connection::Connection, mongodb::MongoDbConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = MongoDbConnector::new().server_selection_timeout(Duration::from_secs(5));
//!     let connection = Connection::new(connector);
//!
//!     connection
//!         .connect("mongodb://localhost:27017", "my_database", ConnectOptions::default())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_mongodb;

pub mod store;

pub use store::{MongoDbConnector, MongoDbStore};
