use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, IndexOptions},
};
use std::time::Duration;
use tracing::debug;

use docmap_core::{
    backend::{Connector, IndexSpec, StoreBackend, Update, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Criteria,
};


/// Maps driver errors onto store errors. Server selection failures mean the
/// server could not be reached.
pub(crate) fn map_error(err: MongoError) -> DocumentStoreError {
    match *err.kind {
        ErrorKind::ServerSelection { .. } => DocumentStoreError::Unreachable(err.to_string()),
        _ => DocumentStoreError::Backend(err.to_string()),
    }
}

fn projection_document(fields: &[String]) -> Document {
    fields
        .iter()
        .map(|field| (field.clone(), Bson::Int32(1)))
        .collect()
}


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        Ok(
            self.get_collection(collection)
                .insert_one(document)
                .await
                .map_err(map_error)?
                .inserted_id
        )
    }

    async fn find_one(
        &self,
        criteria: &Criteria,
        projection: Option<&[String]>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let coll = self.get_collection(collection);
        let find = coll.find_one(criteria.as_document().clone());

        let found = match projection {
            Some(fields) if !fields.is_empty() => find.projection(projection_document(fields)).await,
            _ => find.await,
        };

        found.map_err(map_error)
    }

    async fn find(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(criteria.as_document().clone())
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)
    }

    async fn update_one(
        &self,
        criteria: &Criteria,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_one(criteria.as_document().clone(), update.to_document())
            .await
            .map_err(map_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_many(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(criteria.as_document().clone())
                .await
                .map_err(map_error)?
                .deleted_count
        )
    }

    async fn count_documents(&self, criteria: &Criteria, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(criteria.as_document().clone())
            .await
            .map_err(map_error)
    }

    async fn create_index(&self, index: &IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(index.key_document())
                .options(
                    IndexOptions::builder()
                    .unique(index.is_unique())
                    .name(index.name())
                    .build()
                )
                .build()
            )
            .await
            .map_err(map_error)?;

        debug!(collection, index = %index.name(), "Created index");

        Ok(())
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}


/// Opens [`MongoDbStore`]s and confirms the server answers a `ping`.
#[derive(Debug, Clone, Default)]
pub struct MongoDbConnector {
    server_selection_timeout: Option<Duration>,
}

impl MongoDbConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how long each connection attempt waits for a usable server.
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Connector for MongoDbConnector {
    type Backend = MongoDbStore;

    async fn connect(&self, connection_string: &str, database: &str) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(connection_string)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }

        let store = MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            database.to_string(),
        );

        store.ping().await?;

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_includes_each_field() {
        let fields = ["first_name".to_string(), "last_name".to_string()];

        assert_eq!(
            projection_document(&fields),
            doc! { "first_name": 1, "last_name": 1 }
        );
    }

    #[tokio::test]
    async fn unreachable_server_maps_to_unreachable() {
        let connector = MongoDbConnector::new().server_selection_timeout(Duration::from_millis(200));

        // 192.0.2.0/24 is reserved for documentation and never routed.
        let err = connector
            .connect("mongodb://192.0.2.1:27017/?connectTimeoutMS=200", "docmap_test")
            .await
            .unwrap_err();

        assert!(err.is_unreachable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn malformed_connection_string_is_not_retryable() {
        let err = MongoDbConnector::new()
            .connect("not-a-uri", "docmap_test")
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn connector_keeps_timeout() {
        let connector = MongoDbConnector::new().server_selection_timeout(Duration::from_secs(2));

        assert_eq!(connector.server_selection_timeout, Some(Duration::from_secs(2)));
        assert_eq!(MongoDbConnector::default().server_selection_timeout, None);
    }
}
