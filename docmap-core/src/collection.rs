//! Named collection handles.
//!
//! A [`Collection`] pairs a collection name with the backend of the connection it
//! was obtained from. It is cheap to clone and is what a
//! [`DocumentType`](crate::document_type::DocumentType) is bound to.

use bson::{Bson, Document};
use std::{fmt, sync::Arc};

use crate::{
    backend::{DynStoreBackend, IndexSpec, Update, UpdateOutcome},
    error::DocumentStoreResult,
    query::Criteria,
};

#[derive(Clone)]
pub struct Collection {
    name: String,
    backend: Arc<dyn DynStoreBackend>,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { name: name.into(), backend }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn DynStoreBackend> {
        &self.backend
    }

    pub async fn insert_one(&self, document: Document) -> DocumentStoreResult<Bson> {
        self.backend
            .insert_one(document, &self.name)
            .await
    }

    pub async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .find_one(criteria, projection, &self.name)
            .await
    }

    pub async fn find(&self, criteria: &Criteria) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .find(criteria, &self.name)
            .await
    }

    pub async fn update_one(&self, criteria: &Criteria, update: &Update) -> DocumentStoreResult<UpdateOutcome> {
        self.backend
            .update_one(criteria, update, &self.name)
            .await
    }

    pub async fn delete_many(&self, criteria: &Criteria) -> DocumentStoreResult<u64> {
        self.backend
            .delete_many(criteria, &self.name)
            .await
    }

    pub async fn count_documents(&self, criteria: &Criteria) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(criteria, &self.name)
            .await
    }

    pub async fn create_index(&self, index: &IndexSpec) -> DocumentStoreResult<()> {
        self.backend
            .create_index(index, &self.name)
            .await
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
