//! In-memory storage implementation.
//!
//! Collections are vectors of BSON documents kept in insertion order behind an
//! async-safe read-write lock. Filters are parsed into expression trees and
//! evaluated by [`DocumentEvaluator`].

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use docmap_core::{
    backend::{Connector, IndexSpec, StoreBackend, Update, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Criteria,
};

use crate::evaluator::{DocumentEvaluator, lookup};

#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

type StoreMap = HashMap<String, CollectionData>;


/// A thread-safe in-memory document store.
///
/// Clones share the same data.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the collections holding documents or indexes.
    pub async fn collection_names(&self) -> Vec<String> {
        self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect()
    }
}

fn project(document: &Document, fields: &[String]) -> Document {
    document
        .iter()
        .filter(|(name, _)| *name == "_id" || fields.iter().any(|field| field == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn index_key(document: &Document, index: &IndexSpec) -> Vec<Bson> {
    index
        .keys()
        .iter()
        .map(|key| {
            lookup(document, key)
                .first()
                .map(|value| (*value).clone())
                .unwrap_or(Bson::Null)
        })
        .collect()
}

fn duplicate_key(collection: &str, index: &str) -> DocumentStoreError {
    DocumentStoreError::Backend(format!(
        "E11000 duplicate key error collection: {collection} index: {index}"
    ))
}

/// Checks `candidate` against the unique indexes and `_id` of every other document.
fn check_unique(
    data: &CollectionData,
    candidate: &Document,
    skip: Option<usize>,
    collection: &str,
) -> DocumentStoreResult<()> {
    let others = data
        .documents
        .iter()
        .enumerate()
        .filter(|(position, _)| Some(*position) != skip)
        .map(|(_, document)| document);

    for other in others {
        if other.get("_id") == candidate.get("_id") {
            return Err(duplicate_key(collection, "_id_"));
        }

        for index in data.indexes.iter().filter(|index| index.is_unique()) {
            if index_key(other, index) == index_key(candidate, index) {
                return Err(duplicate_key(collection, &index.name()));
            }
        }
    }

    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert(Bson::Document(Document::new()));

            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::InvalidQuery(format!(
                    "Cannot create field '{rest}' in element '{head}'"
                ))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

fn apply_update(document: &mut Document, update: &Update) -> DocumentStoreResult<()> {
    if let Some(id) = update.set.get("_id") {
        if document.get("_id") != Some(id) {
            return Err(DocumentStoreError::Backend(
                "Performing an update on the path '_id' would modify the immutable field '_id'".to_string(),
            ));
        }
    }

    for (path, value) in &update.set {
        set_path(document, path, value.clone())?;
    }

    for path in &update.unset {
        unset_path(document, path);
    }

    Ok(())
}

fn matching_positions(data: &CollectionData, criteria: &Criteria) -> DocumentStoreResult<Vec<usize>> {
    let expr = criteria.to_expr()?;

    let mut positions = Vec::new();

    for (position, document) in data.documents.iter().enumerate() {
        if DocumentEvaluator::new(document).evaluate(&expr)? {
            positions.push(position);
        }
    }

    Ok(positions)
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let id = match document.get("_id") {
            None | Some(Bson::Null) => Bson::ObjectId(ObjectId::new()),
            Some(id) => id.clone(),
        };

        let mut stored = Document::new();
        stored.insert("_id", id.clone());

        for (name, value) in document {
            if name != "_id" {
                stored.insert(name, value);
            }
        }

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        check_unique(data, &stored, None, collection)?;
        data.documents.push(stored);

        Ok(id)
    }

    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let data = match store.get(collection) {
            Some(data) => data,
            None => return Ok(None),
        };

        let found = matching_positions(data, criteria)?
            .first()
            .map(|position| &data.documents[*position]);

        Ok(found.map(|document| match projection {
            Some(fields) => project(document, fields),
            None => document.clone(),
        }))
    }

    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let data = match store.get(collection) {
            Some(data) => data,
            None => return Ok(vec![]),
        };

        let expr = criteria.to_expr()?;

        Ok(
            DocumentEvaluator::filter_documents(&data.documents, &expr)?
                .into_iter()
                .cloned()
                .collect()
        )
    }

    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let data = match store.get_mut(collection) {
            Some(data) => data,
            None => return Ok(UpdateOutcome::default()),
        };

        let Some(position) = matching_positions(data, criteria)?.first().copied() else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = data.documents[position].clone();
        apply_update(&mut updated, update)?;
        check_unique(data, &updated, Some(position), collection)?;

        let modified = updated != data.documents[position];
        data.documents[position] = updated;

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let data = match store.get_mut(collection) {
            Some(data) => data,
            None => return Ok(0),
        };

        let positions = matching_positions(data, criteria)?;
        let mut position = 0;

        data.documents.retain(|_| {
            let keep = !positions.contains(&position);
            position += 1;
            keep
        });

        Ok(positions.len() as u64)
    }

    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => Ok(matching_positions(data, criteria)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        let name = index.name();

        if data.indexes.iter().any(|existing| existing.name() == name) {
            return Ok(());
        }

        if index.is_unique() {
            for (position, document) in data.documents.iter().enumerate() {
                let key = index_key(document, index);

                if data.documents[position + 1..]
                    .iter()
                    .any(|other| index_key(other, index) == key)
                {
                    return Err(duplicate_key(collection, &name));
                }
            }
        }

        debug!(collection, index = %name, unique = index.is_unique(), "Created index");
        data.indexes.push(index.clone());

        Ok(())
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}


/// Opens in-memory stores, one per database name.
///
/// Connecting twice to the same database name yields stores sharing the same data,
/// so documents survive reconnects. The connection string is ignored.
#[derive(Default, Clone, Debug)]
pub struct InMemoryConnector {
    databases: Arc<RwLock<HashMap<String, InMemoryStore>>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store behind `database`, created empty if it does not exist yet.
    pub async fn store(&self, database: &str) -> InMemoryStore {
        self.databases
            .write()
            .await
            .entry(database.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, _connection_string: &str, database: &str) -> DocumentStoreResult<Self::Backend> {
        Ok(self.store(database).await)
    }
}
