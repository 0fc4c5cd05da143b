//! Key-value cache port: the only shared state behind request idempotency.
//!
//! A [`CacheStore`] maps string keys to opaque byte payloads that expire after
//! a caller-supplied TTL. Expiry is entirely the store's business; callers
//! never see an expired entry. Stores must tolerate concurrent `get`/`set`
//! from many in-flight requests.
//!
//! Backends:
//!
//! - [`MemoryStore`]: in-process, per-entry expiry on the tokio clock.
//! - [`RedisStore`]: Redis `GET` / `PSETEX` over a multiplexed connection.
//!
//! [`connect`] picks a backend from a connection string.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// URL scheme selecting [`MemoryStore`] in [`connect`].
pub const MEMORY_SCHEME: &str = "memory://";

/// Failures reported by a cache backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Get/set-with-expiry storage for opaque payloads.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the payload stored under `key`, or `None` if it was never
    /// stored or has expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Stores `value` under `key`, replacing any previous payload. The entry
    /// expires `ttl` after this call.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> CacheStore for Arc<S>
where
    S: CacheStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }
}

/// Errors from [`connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The connection string could not be understood.
    #[error("invalid cache connection string {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: redis::RedisError,
    },

    /// The backend could not be reached.
    #[error(transparent)]
    Unavailable(#[from] StoreError),
}

/// Opens the backend named by `url`.
///
/// `memory://` yields a fresh [`MemoryStore`]; every other string is handed to
/// the Redis client (`redis://`, `rediss://`, `unix://`), and the connection is
/// established before this returns.
pub async fn connect(url: &str) -> Result<Arc<dyn CacheStore>, ConnectError> {
    if url.starts_with(MEMORY_SCHEME) {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let client = redis::Client::open(url).map_err(|source| ConnectError::InvalidUrl {
        url: url.to_owned(),
        source,
    })?;
    let store = RedisStore::from_client(&client).await?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_scheme_opens_memory_store() {
        let store = connect("memory://").await.unwrap();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn malformed_url_is_rejected_before_connecting() {
        let err = connect("not a url").await.err().unwrap();
        assert!(matches!(err, ConnectError::InvalidUrl { .. }));
    }
}
