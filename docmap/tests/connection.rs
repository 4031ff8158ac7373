mod common;

use async_trait::async_trait;
use std::{
    error::Error,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing_test::traced_test;

use docmap::{
    memory::{InMemoryConnector, InMemoryStore},
    prelude::*,
};

use common::FlakyConnector;

#[derive(Debug, Clone, Default)]
struct RefusingConnector {
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl Connector for RefusingConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, _connection_string: &str, _database: &str) -> DocumentStoreResult<InMemoryStore> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        Err(DocumentStoreError::Initialization(
            "invalid connection string".to_string(),
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_backs_off_between_attempts() {
    let connector = FlakyConnector::new(2);
    let connection = Connection::new(connector.clone());
    let started = Instant::now();

    let database = connection
        .connect("memory://", "app", ConnectOptions::default())
        .await
        .unwrap();

    assert_eq!(database.name(), "app");
    assert_eq!(connector.attempts(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert!(connection.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_last_attempt() {
    let connector = FlakyConnector::new(u32::MAX);
    let connection = Connection::new(connector.clone());
    let started = Instant::now();

    let err = connection
        .connect("memory://", "app", ConnectOptions::new(4, 3))
        .await
        .unwrap_err();

    assert_eq!(connector.attempts(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(1 + 3 + 9));
    assert!(matches!(err, DocumentStoreError::Connection { .. }));
    assert_eq!(err.to_string(), "Connection error: Could not connect to database");

    let source = err.source().unwrap();
    assert!(source.to_string().contains("attempt 4"));
    assert!(!connection.is_connected().await);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_connect_logs_each_retry() {
    let connector = FlakyConnector::new(1);
    let connection = Connection::new(connector);

    connection
        .connect("memory://", "app", ConnectOptions::new(2, 5))
        .await
        .unwrap();

    assert!(logs_contain("Database unreachable, retrying"));
    assert!(logs_contain("Connected to database"));
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let connector = RefusingConnector::default();
    let connection = Connection::new(connector.clone());

    let err = connection
        .connect("bogus", "app", ConnectOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Initialization(_)));
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_declare_connects_with_fallback() {
    let connection = Connection::builder(InMemoryConnector::new())
        .fallback(FallbackConfig::Fixed(ConnectionConfig::new("memory://", "fallback")))
        .build();

    assert!(!connection.is_connected().await);

    let users = connection.declare("User", Some("users"), None).await.unwrap();

    assert_eq!(connection.database().await.unwrap().name(), "fallback");
    assert_eq!(users.collection_name(), Some("users"));

    let posts = connection.declare("Post", None, None).await.unwrap();
    assert_eq!(posts.collection_name(), Some("Post"));

    let registry = connection.registry().await;
    assert_eq!(registry.len(), 2);
    assert!(registry.contains_key("User"));
    assert_eq!(
        connection.document_type("Post").await.unwrap().collection_name(),
        Some("Post")
    );
}

#[tokio::test]
async fn test_declare_without_connection_or_fallback_fails() {
    let connection = Connection::builder(InMemoryConnector::new())
        .fallback(FallbackConfig::Disabled)
        .build();

    let err = connection.declare("User", None, None).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::ConnectionConfig(_)));
    assert!(err.to_string().contains("MONGO_DB_CONNECTION_STRING"));
    assert!(connection.registry().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_forgets_database_and_types() {
    let connector = InMemoryConnector::new();
    let connection = Connection::builder(connector.clone())
        .fallback(FallbackConfig::Disabled)
        .build();

    connection
        .connect("memory://", "app", ConnectOptions::default())
        .await
        .unwrap();

    let users = connection.declare("User", None, None).await.unwrap();
    let mut user = users.create([("first_name", "Evan")]).unwrap();
    user.save().await.unwrap();

    connection.shutdown().await.unwrap();

    assert!(!connection.is_connected().await);
    assert!(connection.registry().await.is_empty());
    assert!(connection.declare("User", None, None).await.is_err());

    connection
        .connect("memory://", "app", ConnectOptions::default())
        .await
        .unwrap();

    let users = connection.declare("User", None, None).await.unwrap();
    assert_eq!(users.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_databases_are_isolated() {
    let connector = InMemoryConnector::new();

    let first = Connection::new(connector.clone());
    first
        .connect("memory://", "first", ConnectOptions::default())
        .await
        .unwrap();

    let second = Connection::new(connector.clone());
    second
        .connect("memory://", "second", ConnectOptions::default())
        .await
        .unwrap();

    let mut user = first
        .declare("User", None, None)
        .await
        .unwrap()
        .create([("first_name", "Evan")])
        .unwrap();
    user.save().await.unwrap();

    assert_eq!(second.declare("User", None, None).await.unwrap().count().await.unwrap(), 0);
    assert_eq!(connector.store("first").await.collection_names().await, vec!["User".to_string()]);
}
