use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use super::IdempotencyError;
use super::engine::IdempotencyEngine;
use super::key::DEFAULT_KEY_PREFIX;
use crate::cache::{self, CacheStore};

/// How long a snapshot is replayable unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Shortest accepted TTL. Stores expire entries at millisecond resolution.
pub const MIN_TTL: Duration = Duration::from_millis(1);

/// Longest accepted TTL.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Request header carrying the client's idempotency key.
pub const DEFAULT_HEADER: &str = "Idempotency-Key";

/// Deserializable engine settings. Every field has a default, so an empty
/// document is valid (though it still needs a store handle to build).
///
/// ```
/// use rttp_idempotency::idempotency::IdempotencyConfig;
///
/// let config: IdempotencyConfig =
///     serde_json::from_str(r#"{"connection_string":"memory://","ttl_secs":60}"#).unwrap();
/// assert_eq!(config.ttl_secs, 60);
/// assert_eq!(config.header, "Idempotency-Key");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// `memory://` or a Redis URL. Leave unset when supplying a store handle.
    pub connection_string: Option<String>,
    pub ttl_secs: u64,
    pub header: String,
    pub key_prefix: String,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            ttl_secs: DEFAULT_TTL.as_secs(),
            header: DEFAULT_HEADER.to_owned(),
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
        }
    }
}

/// Builder for [`IdempotencyEngine`].
///
/// Exactly one cache source is required: an existing [`CacheStore`] handle via
/// [`store`](Self::store), or a connection string via
/// [`connection_string`](Self::connection_string).
pub struct IdempotencyEngineBuilder {
    store: Option<Arc<dyn CacheStore>>,
    connection_string: Option<String>,
    ttl: Duration,
    header: String,
    key_prefix: String,
}

impl Default for IdempotencyEngineBuilder {
    fn default() -> Self {
        Self::from_config(IdempotencyConfig::default())
    }
}

impl IdempotencyEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: IdempotencyConfig) -> Self {
        Self {
            store: None,
            connection_string: config.connection_string,
            ttl: Duration::from_secs(config.ttl_secs),
            header: config.header,
            key_prefix: config.key_prefix,
        }
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection_string = Some(url.into());
        self
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Validates the settings and opens the cache.
    ///
    /// # Errors
    ///
    /// - [`IdempotencyError::Configuration`] for a TTL outside
    ///   [`MIN_TTL`]..=[`MAX_TTL`] or with a sub-millisecond part, an empty header
    ///   name, a malformed connection string, or when neither or both of a
    ///   store and a connection string were given.
    /// - [`IdempotencyError::CacheUnavailable`] if the backend named by the
    ///   connection string can't be reached.
    pub async fn build(self) -> Result<IdempotencyEngine, IdempotencyError> {
        if !(MIN_TTL..=MAX_TTL).contains(&self.ttl) {
            return Err(IdempotencyError::Configuration(format!(
                "ttl must be between {MIN_TTL:?} and {MAX_TTL:?}, got {:?}",
                self.ttl
            )));
        }
        if self.ttl.subsec_nanos() % 1_000_000 != 0 {
            return Err(IdempotencyError::Configuration(format!(
                "ttl must be a whole number of milliseconds, got {:?}",
                self.ttl
            )));
        }
        if self.header.is_empty() {
            return Err(IdempotencyError::Configuration(
                "header name must not be empty".to_owned(),
            ));
        }

        let store = match (self.store, self.connection_string) {
            (Some(store), None) => {
                debug!("using supplied cache store");
                store
            }
            (None, Some(url)) => {
                debug!(url = %url, "connecting to cache");
                cache::connect(&url).await?
            }
            (None, None) => {
                return Err(IdempotencyError::Configuration(
                    "a cache store or connection string is required".to_owned(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(IdempotencyError::Configuration(
                    "supply either a cache store or a connection string, not both".to_owned(),
                ));
            }
        };

        info!(
            ttl_secs = self.ttl.as_secs(),
            header = %self.header,
            "idempotency engine ready"
        );

        Ok(IdempotencyEngine::from_parts(
            store,
            self.ttl,
            self.header,
            self.key_prefix,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn memory() -> Arc<dyn CacheStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: IdempotencyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, IdempotencyConfig::default());
        assert_eq!(config.ttl_secs, 3600);
        assert_eq!(config.key_prefix, "RTTP_REQUEST_");
        assert!(config.connection_string.is_none());
    }

    #[tokio::test]
    async fn store_handle_builds_with_defaults() {
        let engine = IdempotencyEngineBuilder::new().store(memory()).build().await.unwrap();
        assert_eq!(engine.ttl(), DEFAULT_TTL);
        assert_eq!(engine.header(), DEFAULT_HEADER);
    }

    #[tokio::test]
    async fn memory_connection_string_builds() {
        let config = IdempotencyConfig {
            connection_string: Some("memory://".to_owned()),
            ttl_secs: 5,
            ..IdempotencyConfig::default()
        };
        let engine = IdempotencyEngineBuilder::from_config(config).build().await.unwrap();
        assert_eq!(engine.ttl(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_cache_is_a_configuration_error() {
        let err = IdempotencyEngineBuilder::new().build().await.unwrap_err();
        assert!(matches!(err, IdempotencyError::Configuration(_)));
    }

    #[tokio::test]
    async fn both_cache_sources_is_a_configuration_error() {
        let err = IdempotencyEngineBuilder::new()
            .store(memory())
            .connection_string("memory://")
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, IdempotencyError::Configuration(_)));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let err = IdempotencyEngineBuilder::new()
            .store(memory())
            .ttl(Duration::ZERO)
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, IdempotencyError::Configuration(_)));
    }

    #[tokio::test]
    async fn ttl_outside_millisecond_range_is_rejected() {
        for ttl in [
            Duration::from_micros(500),
            Duration::from_micros(1500),
            MAX_TTL + Duration::from_secs(1),
            Duration::from_secs(u64::MAX),
        ] {
            let err = IdempotencyEngineBuilder::new()
                .store(memory())
                .ttl(ttl)
                .build()
                .await
                .unwrap_err();
            assert!(matches!(err, IdempotencyError::Configuration(_)), "{ttl:?}");
        }
    }

    #[tokio::test]
    async fn ttl_range_bounds_are_accepted() {
        for ttl in [MIN_TTL, MAX_TTL] {
            let engine = IdempotencyEngineBuilder::new()
                .store(memory())
                .ttl(ttl)
                .build()
                .await
                .unwrap();
            assert_eq!(engine.ttl(), ttl);
        }
    }

    #[tokio::test]
    async fn oversized_configured_ttl_is_rejected() {
        let config = IdempotencyConfig {
            connection_string: Some("memory://".to_owned()),
            ttl_secs: u64::MAX,
            ..IdempotencyConfig::default()
        };
        let err = IdempotencyEngineBuilder::from_config(config).build().await.unwrap_err();
        assert!(matches!(err, IdempotencyError::Configuration(_)));
    }

    #[tokio::test]
    async fn malformed_url_is_a_configuration_error() {
        let err = IdempotencyEngineBuilder::new()
            .connection_string("not a url")
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, IdempotencyError::Configuration(_)));
    }
}
