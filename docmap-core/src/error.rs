//! Error types and result types for document mapping operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`].
//! Schema violations are reported through the dedicated [`FieldError`] enum and
//! surface as [`DocumentStoreError::Field`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::convert::Infallible;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The connection string or client options could not be turned into a backend.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The server could not be reached or did not answer in time.
    ///
    /// This is the only failure the connection retry loop retries.
    #[error("Server unreachable: {0}")]
    Unreachable(String),
    /// The bounded connection retry budget was exhausted.
    /// The last underlying failure is available through [`std::error::Error::source`].
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Box<DocumentStoreError>,
    },
    /// A document type was declared with no live connection and no fallback configuration.
    #[error("Connection configuration error: {0}")]
    ConnectionConfig(String),
    /// The document type has no backing collection bound to it.
    #[error("Collection configuration error: {0}")]
    CollectionConfig(String),
    /// The document violates its schema.
    #[error(transparent)]
    Field(#[from] FieldError),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document with _id {0} does not exist in collection {1}")]
    DocumentNotFound(String, String),
    /// The document has an invalid structure (for example a malformed `_id`).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The filter or update document uses an operator the backend cannot evaluate.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns `true` when the error means the server could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DocumentStoreError::Unreachable(_))
    }
}

/// Schema violations raised by [`Schema::validate`](crate::schema::Schema::validate).
///
/// Validation always runs before any store mutation, so one of these never
/// leaves a partial write behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field's custom validator rejected its value.
    #[error("Field '{field}' is invalid")]
    Invalid { field: String },
    /// A required field is absent or null.
    #[error("Required field '{field}' is missing")]
    MissingRequired { field: String },
    /// The field's value is of a different kind than the schema declares.
    #[error("Field '{field}' has invalid type. Expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    /// The field is not declared in the schema.
    #[error("Field '{field}' is not in the schema")]
    UnknownField { field: String },
}

impl FieldError {
    /// The name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            FieldError::Invalid { field }
            | FieldError::MissingRequired { field }
            | FieldError::TypeMismatch { field, .. }
            | FieldError::UnknownField { field } => field,
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<Infallible> for DocumentStoreError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn connection_error_exposes_cause() {
        let err = DocumentStoreError::Connection {
            message: "Could not connect to database".to_string(),
            source: Box::new(DocumentStoreError::Unreachable("timed out".to_string())),
        };

        assert_eq!(err.to_string(), "Connection error: Could not connect to database");
        let cause = err.source().expect("cause attached");
        assert_eq!(cause.to_string(), "Server unreachable: timed out");
    }

    #[test]
    fn field_error_messages_name_the_field() {
        let err = FieldError::TypeMismatch {
            field: "age".to_string(),
            expected: "int".to_string(),
            actual: "string".to_string(),
        };

        assert_eq!(err.field(), "age");
        assert_eq!(
            DocumentStoreError::from(err).to_string(),
            "Field 'age' has invalid type. Expected int, got string"
        );
    }
}
