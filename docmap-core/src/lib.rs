//! A lightweight object-document mapping layer for document databases.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Field storage** ([`attributes`]) - The ordered field map every record dereferences to
//! - **Schemas** ([`schema`]) - Declarative field rules and record validation
//! - **Records** ([`document`]) - Map-like documents with change detection and saving
//! - **Document types** ([`document_type`]) - Declared types and their lookups
//! - **Query results** ([`result`]) - Ordered, read-only lookup results
//! - **Criteria and filters** ([`query`]) - Filter documents and the filter expression AST
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Collections** ([`collection`]) - Named collection handles
//! - **Connections** ([`connection`]) - Connecting with retries and declaring document types
//! - **Configuration** ([`config`]) - Connection settings and fallback sources
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! let connection = Connection::new(InMemoryConnector::new());
//! connection.connect("memory://", "app", ConnectOptions::default()).await?;
//!
//! let schema = Schema::new()
//!     .field("first_name", FieldRule::new(FieldKind::String).required())
//!     .field("last_name", FieldKind::String);
//! let users = connection.declare("User", Some("users"), Some(schema)).await?;
//!
//! let mut evan = users.create([("first_name", "Evan"), ("last_name", "Smith")])?;
//! evan.save().await?;
//!
//! let found = users.find([("first_name", "Evan")]).await?;
//! assert_eq!(found.first_or_none().and_then(|u| u.id()), evan.id());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod attributes;
pub mod backend;
pub mod collection;
pub mod config;
pub mod connection;
pub mod document;
pub mod document_type;
pub mod error;
pub mod query;
pub mod result;
pub mod schema;
