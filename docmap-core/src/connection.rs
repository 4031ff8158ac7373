//! The connection context.
//!
//! A [`Connection`] holds the active database (if any) and the registry of declared
//! document types. It is cheap to clone; clones share state. There is no global
//! connection: create one at startup and pass it to whatever declares types.
//!
//! # Example
//!
//! ```ignore
//! use docmap::{connection::Connection, config::ConnectOptions, memory::InMemoryConnector};
//!
//! let connection = Connection::new(InMemoryConnector::new());
//! connection
//!     .connect("memory://", "app", ConnectOptions::default())
//!     .await?;
//!
//! let users = connection.declare("User", Some("users"), None).await?;
//! ```
//!
//! Connecting and declaring are meant to happen during startup, from one task.
//! Concurrent readers of an established connection are fine.

use mea::rwlock::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    backend::{Connector, DynConnector, DynStoreBackend},
    collection::Collection,
    config::{CONNECTION_STRING_VAR, ConnectOptions, ConnectionConfig, DATABASE_VAR, FallbackConfig},
    document_type::DocumentType,
    error::{DocumentStoreError, DocumentStoreResult},
    schema::Schema,
};

/// A selected database on a live backend.
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    backend: Arc<dyn DynStoreBackend>,
}

impl Database {
    pub fn new(name: impl Into<String>, backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { name: name.into(), backend }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn DynStoreBackend> {
        &self.backend
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(name, self.backend.clone())
    }
}

struct ConnectionInner {
    connector: Box<dyn DynConnector>,
    fallback: FallbackConfig,
    database: RwLock<Option<Database>>,
    registry: RwLock<HashMap<String, DocumentType>>,
}

#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Creates an unconnected context that falls back to the process environment.
    pub fn new<C: Connector + 'static>(connector: C) -> Self {
        Self::builder(connector).build()
    }

    pub fn builder<C: Connector + 'static>(connector: C) -> ConnectionBuilder {
        ConnectionBuilder {
            connector: Box::new(connector),
            fallback: FallbackConfig::default(),
        }
    }

    /// Connects to `database`, retrying while the server is unreachable.
    ///
    /// Up to `options.retries` attempts are made (at least one). After a failed
    /// attempt `i` (counting from zero) that is not the last, the connection sleeps
    /// `options.retry_delay_base ^ i` seconds. Only
    /// [`DocumentStoreError::Unreachable`] is retried; other failures are returned
    /// as they are.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`] once every attempt found the server
    /// unreachable. Its source is the last attempt's error.
    pub async fn connect(
        &self,
        connection_string: &str,
        database: &str,
        options: ConnectOptions,
    ) -> DocumentStoreResult<Database> {
        let attempts = options.attempts();
        let mut attempt = 0;

        let backend = loop {
            match self
                .inner
                .connector
                .connect_dyn(connection_string, database)
                .await
            {
                Ok(backend) => break backend,
                Err(err) if err.is_unreachable() => {
                    if attempt + 1 >= attempts {
                        return Err(DocumentStoreError::Connection {
                            message: "Could not connect to database".to_string(),
                            source: Box::new(err),
                        });
                    }

                    let delay = options.delay_after(attempt);

                    warn!(
                        database,
                        attempt = attempt + 1,
                        attempts,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Database unreachable, retrying"
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let selected = Database::new(database, backend);
        *self.inner.database.write().await = Some(selected.clone());

        info!(database, attempts = attempt + 1, "Connected to database");

        Ok(selected)
    }

    pub async fn connect_with_config(&self, config: &ConnectionConfig) -> DocumentStoreResult<Database> {
        self.connect(&config.connection_string, &config.database, config.options)
            .await
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.database.read().await.is_some()
    }

    /// The active database, if connected.
    pub async fn database(&self) -> Option<Database> {
        self.inner.database.read().await.clone()
    }

    /// Declares a document type and registers it under `name`.
    ///
    /// Records of the type live in `collection`, or in a collection called `name`
    /// when none is given. With a schema every save is validated.
    ///
    /// Without a live connection this first connects using the fallback
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ConnectionConfig`] when there is no live
    /// connection and no fallback configuration, or whatever the fallback connect
    /// fails with.
    pub async fn declare(
        &self,
        name: &str,
        collection: Option<&str>,
        schema: Option<Schema>,
    ) -> DocumentStoreResult<DocumentType> {
        let database = self.ensure_connected().await?;
        let collection = database.collection(collection.unwrap_or(name));

        info!(
            name,
            collection = collection.name(),
            validated = schema.is_some(),
            "Declared document type"
        );

        let document_type = DocumentType::new(name, Some(collection), schema);

        self.inner
            .registry
            .write()
            .await
            .insert(name.to_string(), document_type.clone());

        Ok(document_type)
    }

    /// A snapshot of every declared type, keyed by name.
    pub async fn registry(&self) -> HashMap<String, DocumentType> {
        self.inner.registry.read().await.clone()
    }

    pub async fn document_type(&self, name: &str) -> Option<DocumentType> {
        self.inner
            .registry
            .read()
            .await
            .get(name)
            .cloned()
    }

    /// Drops the active database and every declared type, then shuts the backend down.
    pub async fn shutdown(&self) -> DocumentStoreResult<()> {
        let database = self.inner.database.write().await.take();
        self.inner.registry.write().await.clear();

        if let Some(database) = database {
            database.backend.shutdown().await?;
            info!(database = database.name(), "Connection shut down");
        }

        Ok(())
    }

    async fn ensure_connected(&self) -> DocumentStoreResult<Database> {
        if let Some(database) = self.database().await {
            return Ok(database);
        }

        let Some(config) = self.inner.fallback.resolve() else {
            return Err(DocumentStoreError::ConnectionConfig(format!(
                "No database connection. Call connect first or set {CONNECTION_STRING_VAR} and {DATABASE_VAR}"
            )));
        };

        debug!(database = %config.database, "Connecting with fallback configuration");

        self.connect_with_config(&config).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connector", &self.inner.connector)
            .field("fallback", &self.inner.fallback)
            .finish_non_exhaustive()
    }
}

pub struct ConnectionBuilder {
    connector: Box<dyn DynConnector>,
    fallback: FallbackConfig,
}

impl ConnectionBuilder {
    /// Sets where [`Connection::declare`] looks for connection values when nothing
    /// is connected yet.
    pub fn fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn build(self) -> Connection {
        Connection {
            inner: Arc::new(ConnectionInner {
                connector: self.connector,
                fallback: self.fallback,
                database: RwLock::new(None),
                registry: RwLock::new(HashMap::new()),
            }),
        }
    }
}
