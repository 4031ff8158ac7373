#![allow(dead_code)]

use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicUsize, Ordering},
};

use docmap::{memory::InMemoryConnector, prelude::*};

/// Wraps the in-memory store and counts calls that mutate it.
#[derive(Debug, Clone)]
pub struct CountingBackend {
    inner: docmap::memory::InMemoryStore,
    mutations: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreBackend for CountingBackend {
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_one(document, collection).await
    }

    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        self.inner.find_one(criteria, projection, collection).await
    }

    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.inner.find(criteria, collection).await
    }

    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.update_one(criteria, update, collection).await
    }

    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_many(criteria, collection).await
    }

    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.count_documents(criteria, collection).await
    }

    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        self.inner.create_index(index, collection).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.inner.ping().await
    }
}

/// Opens [`CountingBackend`]s over a shared in-memory connector.
#[derive(Debug, Clone, Default)]
pub struct CountingConnector {
    memory: InMemoryConnector,
    mutations: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CountingConnector {
    type Backend = CountingBackend;

    async fn connect(&self, connection_string: &str, database: &str) -> DocumentStoreResult<CountingBackend> {
        Ok(CountingBackend {
            inner: self.memory.connect(connection_string, database).await?,
            mutations: self.mutations.clone(),
        })
    }
}

/// Reports the server unreachable for the first `failures` attempts, then
/// connects to memory.
#[derive(Debug, Clone)]
pub struct FlakyConnector {
    memory: InMemoryConnector,
    failures: u32,
    attempts: Arc<AtomicU32>,
}

impl FlakyConnector {
    pub fn new(failures: u32) -> Self {
        Self {
            memory: InMemoryConnector::new(),
            failures,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    type Backend = docmap::memory::InMemoryStore;

    async fn connect(&self, connection_string: &str, database: &str) -> DocumentStoreResult<Self::Backend> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.failures {
            return Err(DocumentStoreError::Unreachable(format!(
                "No server available (attempt {})",
                attempt + 1
            )));
        }

        self.memory.connect(connection_string, database).await
    }
}

/// A connection to a fresh in-memory database.
pub async fn memory_connection() -> (Connection, CountingConnector) {
    let connector = CountingConnector::default();
    let connection = Connection::builder(connector.clone())
        .fallback(FallbackConfig::Disabled)
        .build();

    connection
        .connect("memory://", "test", ConnectOptions::default())
        .await
        .expect("in-memory connect");

    (connection, connector)
}
