//! Declared document types.
//!
//! A [`DocumentType`] is what [`Connection::declare`](crate::connection::Connection::declare)
//! returns: a name, the collection its records live in, and an optional schema. It
//! creates records and runs the type-level lookups.

use bson::{Bson, Document};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    attributes::AttributeMap,
    backend::{IndexSpec, id_filter},
    collection::Collection,
    document::{IntoDocumentId, Record, take_identity},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Criteria,
    result::QueryResult,
    schema::Schema,
};

#[derive(Debug)]
struct DocumentTypeInner {
    name: String,
    collection: Option<Collection>,
    schema: Option<Schema>,
}

/// A declared document type. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DocumentType {
    inner: Arc<DocumentTypeInner>,
}

impl DocumentType {
    pub(crate) fn new(name: impl Into<String>, collection: Option<Collection>, schema: Option<Schema>) -> Self {
        Self {
            inner: Arc::new(DocumentTypeInner {
                name: name.into(),
                collection,
                schema,
            }),
        }
    }

    /// A type with no backing collection. Its records can be built and validated,
    /// but every store operation fails with [`DocumentStoreError::CollectionConfig`].
    pub fn unbound(name: impl Into<String>, schema: Option<Schema>) -> Self {
        Self::new(name, None, schema)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.inner.schema.as_ref()
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.inner
            .collection
            .as_ref()
            .map(Collection::name)
    }

    /// The bound collection.
    pub fn collection(&self) -> DocumentStoreResult<&Collection> {
        self.inner
            .collection
            .as_ref()
            .ok_or_else(|| {
                DocumentStoreError::CollectionConfig(format!(
                    "Document type '{}' has no collection",
                    self.inner.name
                ))
            })
    }

    /// Creates a record from a copy of `fields`.
    ///
    /// An `_id` among the fields is taken, unchanged, as the record's identity; a
    /// record created that way is treated as already stored.
    pub fn create(&self, fields: impl Into<AttributeMap>) -> DocumentStoreResult<Record> {
        let mut fields = fields.into();
        let id = take_identity(&mut fields);

        Ok(Record::new(id, fields, self.clone()))
    }

    /// Creates a record from any value serializing to a document.
    pub fn create_from<T: Serialize + ?Sized>(&self, value: &T) -> DocumentStoreResult<Record> {
        self.create(AttributeMap::from_serializable(value)?)
    }

    /// Builds a record from a document read from the store, keeping its `_id` as read.
    pub fn materialize(&self, document: Document) -> DocumentStoreResult<Record> {
        self.create(document)
    }

    /// Looks a record up by identity. Malformed identities find nothing.
    pub async fn find_by_id(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<Record>> {
        let Some(id) = id.into_document_id() else {
            return Ok(None);
        };

        self.collection()?
            .find_one(&id_filter(&id), None)
            .await?
            .map(|document| self.materialize(document))
            .transpose()
    }

    pub async fn all(&self) -> DocumentStoreResult<QueryResult> {
        self.find(Criteria::all()).await
    }

    /// Returns every record matching `criteria`, in backend order.
    pub async fn find(&self, criteria: impl Into<Criteria>) -> DocumentStoreResult<QueryResult> {
        let criteria = criteria.into();

        self.collection()?
            .find(&criteria)
            .await?
            .into_iter()
            .map(|document| self.materialize(document))
            .collect()
    }

    /// Returns the first record matching `criteria`.
    pub async fn find_one(&self, criteria: impl Into<Criteria>) -> DocumentStoreResult<Option<Record>> {
        let criteria = criteria.into();

        self.collection()?
            .find_one(&criteria, None)
            .await?
            .map(|document| self.materialize(document))
            .transpose()
    }

    /// Returns every record whose `field` equals one of `values`.
    pub async fn find_in<V: Into<Bson>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> DocumentStoreResult<QueryResult> {
        self.find(Criteria::within(field, values)).await
    }

    /// Deletes every record matching `criteria` and returns how many were removed.
    ///
    /// Records already loaded for deleted documents are left as they are.
    pub async fn delete(&self, criteria: impl Into<Criteria>) -> DocumentStoreResult<u64> {
        let criteria = criteria.into();

        self.collection()?
            .delete_many(&criteria)
            .await
    }

    /// Counts every record in the collection.
    pub async fn count(&self) -> DocumentStoreResult<u64> {
        self.collection()?
            .count_documents(&Criteria::all())
            .await
    }

    pub async fn create_index(&self, index: IndexSpec) -> DocumentStoreResult<()> {
        self.collection()?
            .create_index(&index)
            .await
    }

    /// Creates and saves one record per item, validating each.
    ///
    /// Items are saved in order; on the first failure earlier items stay saved.
    pub async fn insert_many<I, F>(&self, items: I) -> DocumentStoreResult<QueryResult>
    where
        I: IntoIterator<Item = F>,
        F: Into<AttributeMap>,
    {
        let mut records = Vec::new();

        for item in items {
            let mut record = self.create(item)?;
            record.save().await?;
            records.push(record);
        }

        Ok(QueryResult::new(records))
    }
}
