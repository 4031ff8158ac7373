//! Storage backend abstraction for document types.
//!
//! This module defines the traits that abstract over the database driver, so records
//! and document types work the same against MongoDB, the in-memory store, or any
//! other backend.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: An object-safe twin of [`StoreBackend`] for dynamic dispatch
//! - [`Connector`]: Factory trait opening a backend from a connection string
//! - [`DynConnector`]: An object-safe twin of [`Connector`]
//!
//! Every operation takes the collection name as its last argument. Filters are
//! [`Criteria`] values in MongoDB filter syntax.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{any::Any, fmt::Debug, sync::Arc};

use crate::{error::DocumentStoreResult, query::Criteria};

/// A partial update applied to a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Fields to overwrite or create.
    pub set: Document,
    /// Fields to remove.
    pub unset: Vec<String>,
}

impl Update {
    pub fn set(fields: Document) -> Self {
        Self { set: fields, unset: Vec::new() }
    }

    pub fn unset(field: impl Into<String>) -> Self {
        Self { set: Document::new(), unset: vec![field.into()] }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Renders the update as a MongoDB update document (`$set` / `$unset`).
    pub fn to_document(&self) -> Document {
        let mut update = Document::new();

        if !self.set.is_empty() {
            update.insert("$set", self.set.clone());
        }

        if !self.unset.is_empty() {
            update.insert(
                "$unset",
                self.unset
                    .iter()
                    .map(|field| (field.clone(), bson::Bson::String(String::new())))
                    .collect::<Document>(),
            );
        }

        update
    }
}

/// The result of [`StoreBackend::update_one`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents the filter matched (0 or 1).
    pub matched: u64,
    /// Number of documents actually changed.
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexDirection {
    #[default]
    Ascending,
    Descending,
}

impl IndexDirection {
    pub fn as_i32(&self) -> i32 {
        match self {
            IndexDirection::Ascending => 1,
            IndexDirection::Descending => -1,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            IndexDirection::Ascending => "asc",
            IndexDirection::Descending => "desc",
        }
    }
}

/// An index over one or more fields of a collection.
///
/// ```ignore
/// let spec = IndexSpec::new(["last_name", "first_name"]).unique();
/// assert_eq!(spec.name(), "last_name_first_name_asc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    keys: Vec<String>,
    direction: IndexDirection,
    unique: bool,
    name: Option<String>,
}

impl IndexSpec {
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            direction: IndexDirection::default(),
            unique: false,
            name: None,
        }
    }

    pub fn direction(mut self, direction: IndexDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn descending(self) -> Self {
        self.direction(IndexDirection::Descending)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn index_direction(&self) -> IndexDirection {
        self.direction
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// The explicit name, or the keys joined by `_` followed by the direction.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}_{}", self.keys.join("_"), self.direction.suffix()),
        }
    }

    /// The key document, every key carrying the index direction.
    pub fn key_document(&self) -> Document {
        let direction = self.direction.as_i32();

        self.keys
            .iter()
            .map(|key| (key.clone(), bson::Bson::Int32(direction)))
            .collect()
    }
}

/// Abstract interface for document storage backends.
///
/// Implementations must be thread-safe; a backend is shared by every document type
/// declared on a connection.
///
/// # Errors
///
/// All methods return [`DocumentStoreResult`]. Implementations should map driver
/// errors onto [`DocumentStoreError`](crate::error::DocumentStoreError) variants,
/// reporting an unreachable server as `Unreachable`.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document and returns its identity. A missing `_id` is generated;
    /// a supplied one is kept as given.
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;

    /// Returns the first matching document, restricted to `projection` fields
    /// (plus `_id`) when given.
    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Returns every matching document in backend order.
    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Applies `update` to the first matching document.
    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes every matching document and returns how many were removed.
    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64>;

    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64>;

    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()>;

    /// Confirms the server is reachable.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Releases driver resources.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        StoreBackend::insert_one(&**self, document, collection).await
    }

    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(&**self, criteria, projection, collection)
            .await
    }

    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find(&**self, criteria, collection).await
    }

    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        StoreBackend::update_one(&**self, criteria, update, collection)
            .await
    }

    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_many(&**self, criteria, collection).await
    }

    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(&**self, criteria, collection).await
    }

    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_index(&**self, index, collection).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        StoreBackend::ping(&**self).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(&**self).await
    }
}

/// Object-safe twin of [`StoreBackend`], implemented for every backend.
///
/// Connections hold their backend as `Arc<dyn DynStoreBackend>`; use
/// [`as_any`](DynStoreBackend::as_any) to get the concrete type back.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;
    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>>;
    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;
    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64>;
    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64>;
    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()>;
    async fn ping(&self) -> DocumentStoreResult<()>;
    async fn shutdown(&self) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        StoreBackend::insert_one(self, document, collection).await
    }

    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(self, criteria, projection, collection).await
    }

    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find(self, criteria, collection).await
    }

    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        StoreBackend::update_one(self, criteria, update, collection).await
    }

    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_many(self, criteria, collection).await
    }

    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, criteria, collection).await
    }

    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_index(self, index, collection).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        StoreBackend::ping(self).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DynStoreBackend {
    /// Returns the concrete backend if it is of type `B`.
    pub fn downcast_ref<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.as_any().downcast_ref::<B>()
    }
}

/// Opens backends from a connection string and database name.
///
/// A connector is asked for a fresh backend on every connection attempt. It must
/// confirm the server is reachable before returning, and report an unreachable
/// server as [`DocumentStoreError::Unreachable`](crate::error::DocumentStoreError::Unreachable)
/// so the connection retry loop can tell it apart from permanent failures.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    type Backend: StoreBackend + 'static;

    async fn connect(&self, connection_string: &str, database: &str) -> DocumentStoreResult<Self::Backend>;
}

/// Object-safe twin of [`Connector`], implemented for every connector.
#[async_trait]
pub trait DynConnector: Send + Sync + Debug {
    async fn connect_dyn(
        &self,
        connection_string: &str,
        database: &str,
    ) -> DocumentStoreResult<Arc<dyn DynStoreBackend>>;
}

#[async_trait]
impl<C: Connector> DynConnector for C {
    async fn connect_dyn(
        &self,
        connection_string: &str,
        database: &str,
    ) -> DocumentStoreResult<Arc<dyn DynStoreBackend>> {
        let backend = self.connect(connection_string, database).await?;

        Ok(Arc::new(backend))
    }
}

/// Filter selecting a single document by identity.
pub(crate) fn id_filter(id: &Bson) -> Criteria {
    Criteria::by_id(id.clone())
}
