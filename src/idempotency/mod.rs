//! Request idempotency: replay the first response to a retried request.
//!
//! A client marks a mutating request with an `Idempotency-Key` header. The
//! first request carrying a given key (per method) runs normally and its
//! response is snapshotted into a [`CacheStore`](crate::cache::CacheStore)
//! for a fixed TTL. Later requests with the same method and key, arriving
//! while the snapshot lives, get that exact response back and never reach
//! the resource.
//!
//! The pieces, leaves first:
//!
//! - [`IdempotencyKey`]: cache key derived from method + header value.
//! - [`ResponseSnapshot`]: byte codec for a complete response.
//! - [`IdempotencyEngine`]: `before` / `after` / `replay` phases and TTL.
//! - [`ScopePolicy`]: which requests the engine applies to.
//! - [`IdempotencyMiddleware`]: wires all of the above into an
//!   [`App`](crate::App).
//!
//! Only completed requests are deduplicated. Two concurrent first requests
//! with the same key both run, and the later store wins.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rttp_idempotency::cache::MemoryStore;
//! use rttp_idempotency::idempotency::{IdempotencyEngine, IdempotencyMiddleware};
//! use rttp_idempotency::{App, Router, Response, StatusCode};
//!
//! # async fn example() -> Result<(), rttp_idempotency::idempotency::IdempotencyError> {
//! let engine = IdempotencyEngine::builder()
//!     .store(Arc::new(MemoryStore::new()))
//!     .build()
//!     .await?;
//!
//! let mut router = Router::new();
//! router.idempotent_post("/orders", |_ctx| async { Response::new(StatusCode::CREATED) });
//!
//! let app = App::new(router).wrap(IdempotencyMiddleware::opt_in(engine));
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

use crate::cache::{ConnectError, StoreError};

mod config;
mod engine;
mod key;
mod middleware;
mod scope;
mod snapshot;

pub use config::{
    DEFAULT_HEADER, DEFAULT_TTL, IdempotencyConfig, IdempotencyEngineBuilder, MAX_TTL, MIN_TTL,
};
pub use engine::{IdempotencyEngine, Lookup};
pub use key::{DEFAULT_KEY_PREFIX, IdempotencyKey};
pub use middleware::IdempotencyMiddleware;
pub use scope::ScopePolicy;
pub use snapshot::{ResponseSnapshot, decode, encode};

/// Errors raised by the idempotency layer.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The engine was built without a usable cache or with invalid settings.
    #[error("idempotency misconfigured: {0}")]
    Configuration(String),

    /// The response holds state that can't be captured, such as a streaming body.
    #[error("response cannot be snapshotted: {0}")]
    SnapshotEncoding(String),

    /// A cached payload is not a valid snapshot.
    #[error("cached response snapshot is corrupt: {0}")]
    SnapshotDecoding(#[source] serde_json::Error),

    /// The cache backend failed a get or set.
    #[error("idempotency cache unavailable: {0}")]
    CacheUnavailable(#[from] StoreError),
}

impl From<ConnectError> for IdempotencyError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::InvalidUrl { .. } => Self::Configuration(err.to_string()),
            ConnectError::Unavailable(source) => Self::CacheUnavailable(source),
        }
    }
}
