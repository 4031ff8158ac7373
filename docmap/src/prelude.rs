//! Convenient re-exports of commonly used types from docmap.
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```
//!
//! This provides access to:
//! - Connections, configuration and document types
//! - Records, field maps and query results
//! - Schemas and field rules
//! - Criteria and filter expressions
//! - Backend and connector traits for implementing storage backends
//! - Error types

pub use docmap_core::{
    attributes::AttributeMap,
    backend::{Connector, IndexDirection, IndexSpec, StoreBackend, Update, UpdateOutcome},
    collection::Collection,
    config::{ConnectOptions, ConnectionConfig, FallbackConfig},
    connection::{Connection, Database},
    document::{IntoDocumentId, Record, RecordState},
    document_type::DocumentType,
    error::{DocumentStoreError, DocumentStoreResult, FieldError},
    query::{Criteria, Expr, FieldOp, Filter},
    result::QueryResult,
    schema::{FieldKind, FieldRule, Schema},
};
