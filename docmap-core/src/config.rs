//! Connection configuration.
//!
//! [`ConnectionConfig`] is `serde`-deserialisable so applications can embed it in
//! their own configuration files:
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct AppConfig {
//!     database: docmap::config::ConnectionConfig,
//! }
//! ```
//!
//! When a document type is declared before anything connected, the connection falls
//! back to the values named by [`CONNECTION_STRING_VAR`] and [`DATABASE_VAR`]; see
//! [`FallbackConfig`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration value holding the fallback connection string.
pub const CONNECTION_STRING_VAR: &str = "MONGO_DB_CONNECTION_STRING";
/// Configuration value holding the fallback database name.
pub const DATABASE_VAR: &str = "MONGO_DB_NAME";

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_BASE: u64 = 2;

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay_base() -> u64 {
    DEFAULT_RETRY_DELAY_BASE
}

/// Retry policy for establishing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Number of connection attempts. Zero is treated as one.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base of the exponential backoff, in seconds. Attempt `i` (from zero) that
    /// fails is followed by a sleep of `retry_delay_base ^ i` seconds.
    #[serde(default = "default_retry_delay_base")]
    pub retry_delay_base: u64,
}

impl ConnectOptions {
    pub fn new(retries: u32, retry_delay_base: u64) -> Self {
        Self { retries, retry_delay_base }
    }

    /// Number of attempts actually made.
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Delay after failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.retry_delay_base.saturating_pow(attempt))
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay_base: DEFAULT_RETRY_DELAY_BASE,
        }
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub connection_string: String,
    pub database: String,
    #[serde(default, flatten)]
    pub options: ConnectOptions,
}

impl ConnectionConfig {
    pub fn new(connection_string: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database: database.into(),
            options: ConnectOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// Reads the fallback values from the process environment.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the fallback values through `lookup`. Missing or empty values yield `None`.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Some(Self::new(read(CONNECTION_STRING_VAR)?, read(DATABASE_VAR)?))
    }
}

/// The source a connection consults when a document type is declared before
/// anything connected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FallbackConfig {
    /// Read [`CONNECTION_STRING_VAR`] and [`DATABASE_VAR`] from the process environment.
    #[default]
    Environment,
    /// Use fixed values.
    Fixed(ConnectionConfig),
    /// Never connect implicitly.
    Disabled,
}

impl FallbackConfig {
    pub fn resolve(&self) -> Option<ConnectionConfig> {
        match self {
            FallbackConfig::Environment => ConnectionConfig::from_env(),
            FallbackConfig::Fixed(config) => Some(config.clone()),
            FallbackConfig::Disabled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let options = ConnectOptions::default();

        assert_eq!(options.attempts(), 3);
        assert_eq!(options.delay_after(0), Duration::from_secs(1));
        assert_eq!(options.delay_after(1), Duration::from_secs(2));
        assert_eq!(options.delay_after(2), Duration::from_secs(4));
        assert_eq!(ConnectOptions::new(0, 2).attempts(), 1);
    }

    #[test]
    fn reads_fallback_values_through_lookup() {
        let values = HashMap::from([
            (CONNECTION_STRING_VAR, "mongodb://localhost:27017".to_string()),
            (DATABASE_VAR, "app".to_string()),
        ]);

        let config = ConnectionConfig::from_lookup(|name| values.get(name).cloned()).unwrap();
        assert_eq!(config.connection_string, "mongodb://localhost:27017");
        assert_eq!(config.database, "app");
        assert_eq!(config.options, ConnectOptions::default());

        let partial = HashMap::from([(DATABASE_VAR, "app".to_string())]);
        assert_eq!(ConnectionConfig::from_lookup(|name| partial.get(name).cloned()), None);

        let empty = HashMap::from([
            (CONNECTION_STRING_VAR, String::new()),
            (DATABASE_VAR, "app".to_string()),
        ]);
        assert_eq!(ConnectionConfig::from_lookup(|name| empty.get(name).cloned()), None);
    }

    #[test]
    fn deserializes_with_default_options() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{ "connection_string": "mongodb://db:27017", "database": "app", "retries": 5 }"#,
        )
        .unwrap();

        assert_eq!(config.options.retries, 5);
        assert_eq!(config.options.retry_delay_base, 2);
    }

    #[test]
    fn fixed_and_disabled_fallbacks() {
        let config = ConnectionConfig::new("mongodb://db:27017", "app");

        assert_eq!(FallbackConfig::Fixed(config.clone()).resolve(), Some(config));
        assert_eq!(FallbackConfig::Disabled.resolve(), None);
    }
}
