use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::IdempotencyError;
use super::config::{DEFAULT_HEADER, DEFAULT_TTL, IdempotencyEngineBuilder};
use super::key::{DEFAULT_KEY_PREFIX, IdempotencyKey};
use super::snapshot::ResponseSnapshot;
use crate::cache::CacheStore;
use crate::context::Context;
use crate::{Request, Response};

/// Outcome of the pre-handler phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The request carries no idempotency key. Run the handler, store nothing.
    NotApplicable,
    /// Cache miss. Run the handler and store its response under the key.
    Proceed(IdempotencyKey),
    /// Cache hit. The snapshot is waiting in the request context; call
    /// [`IdempotencyEngine::replay`] instead of running the handler.
    Replay,
}

// Carries a cache hit from `before` to `replay` through the context extensions.
struct PendingReplay {
    key: IdempotencyKey,
    snapshot: ResponseSnapshot,
}

/// Looks up, stores, and replays response snapshots for keyed requests.
///
/// The engine holds no per-request state. Everything shared lives in the
/// [`CacheStore`], and a cache hit travels from [`before`](Self::before) to
/// [`replay`](Self::replay) inside the request's [`Context`].
pub struct IdempotencyEngine {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    header: String,
    key_prefix: String,
}

impl IdempotencyEngine {
    pub fn builder() -> IdempotencyEngineBuilder {
        IdempotencyEngineBuilder::new()
    }

    /// An engine over `store` with the default TTL, header, and key prefix.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::from_parts(
            store,
            DEFAULT_TTL,
            DEFAULT_HEADER.to_owned(),
            DEFAULT_KEY_PREFIX.to_owned(),
        )
    }

    pub(super) fn from_parts(
        store: Arc<dyn CacheStore>,
        ttl: Duration,
        header: String,
        key_prefix: String,
    ) -> Self {
        Self {
            store,
            ttl,
            header,
            key_prefix,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// The cache key for `request`, or `None` when it has no usable
    /// idempotency header.
    pub fn key_for(&self, request: &Request) -> Option<IdempotencyKey> {
        IdempotencyKey::derive_with_prefix(
            &self.key_prefix,
            request.method(),
            request.headers().get(&self.header),
        )
    }

    /// Pre-handler phase.
    ///
    /// On a hit the decoded snapshot is stashed in `ctx` and
    /// [`Lookup::Replay`] is returned.
    ///
    /// # Errors
    ///
    /// [`IdempotencyError::CacheUnavailable`] if the store fails, and
    /// [`IdempotencyError::SnapshotDecoding`] if the cached payload is corrupt.
    pub async fn before(&self, ctx: &mut Context) -> Result<Lookup, IdempotencyError> {
        let Some(key) = self.key_for(ctx.request()) else {
            return Ok(Lookup::NotApplicable);
        };

        let cached = self.store.get(key.as_str()).await.inspect_err(|e| {
            error!(key = %key, error = %e, "idempotency cache lookup failed");
        })?;

        let Some(payload) = cached else {
            debug!(key = %key, "idempotency cache miss");
            return Ok(Lookup::Proceed(key));
        };

        let snapshot = ResponseSnapshot::decode(&payload).inspect_err(|e| {
            error!(key = %key, error = %e, "cached response is corrupt");
        })?;

        debug!(key = %key, status = %snapshot.status(), "idempotency cache hit");
        ctx.extensions_mut().insert(PendingReplay { key, snapshot });
        Ok(Lookup::Replay)
    }

    /// Post-handler phase. Stores `response` when `lookup` is a miss and does
    /// nothing otherwise.
    ///
    /// A response that can't be snapshotted is logged and skipped, so the
    /// first caller still gets it.
    ///
    /// # Errors
    ///
    /// [`IdempotencyError::CacheUnavailable`] if the store fails.
    pub async fn after(&self, lookup: &Lookup, response: &Response) -> Result<(), IdempotencyError> {
        let Lookup::Proceed(key) = lookup else {
            return Ok(());
        };

        let payload = match ResponseSnapshot::capture(response).and_then(|s| s.encode()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "response not stored for replay");
                return Ok(());
            }
        };

        self.store
            .set(key.as_str(), payload, self.ttl)
            .await
            .inspect_err(|e| {
                error!(key = %key, error = %e, "idempotency cache store failed");
            })?;

        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "stored response for replay");
        Ok(())
    }

    /// Replay phase. Consumes the snapshot stashed by [`before`](Self::before)
    /// and overwrites every field of `response` with it.
    ///
    /// Returns `false`, leaving `response` untouched, if nothing is stashed
    /// for this request's key.
    pub fn replay(&self, ctx: &mut Context, response: &mut Response) -> bool {
        let Some(pending) = ctx.extensions_mut().remove::<PendingReplay>() else {
            return false;
        };
        if self.key_for(ctx.request()).as_ref() != Some(&pending.key) {
            warn!(key = %pending.key, "stashed replay does not belong to this request");
            return false;
        }

        debug!(key = %pending.key, "replaying cached response");
        pending.snapshot.apply_to(response);
        true
    }
}

impl fmt::Debug for IdempotencyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyEngine")
            .field("ttl", &self.ttl)
            .field("header", &self.header)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, StoreError};
    use crate::{Method, StatusCode};
    use async_trait::async_trait;
    use bytes::Bytes;

    struct Broken;

    #[async_trait]
    impl CacheStore for Broken {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
            Err(StoreError::Backend("down".to_owned()))
        }

        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".to_owned()))
        }
    }

    fn keyed(method: Method, key: &str) -> Context {
        Context::new(Request::new(method, "/orders").header("Idempotency-Key", key))
    }

    fn engine() -> (IdempotencyEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (IdempotencyEngine::new(store.clone()), store)
    }

    #[tokio::test]
    async fn no_header_is_not_applicable() {
        let (engine, store) = engine();
        let mut ctx = Context::new(Request::new(Method::Post, "/orders"));
        let lookup = engine.before(&mut ctx).await.unwrap();
        assert_eq!(lookup, Lookup::NotApplicable);

        engine.after(&lookup, &Response::new(StatusCode::OK)).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn miss_then_store_then_replay() {
        let (engine, store) = engine();

        let mut first = keyed(Method::Post, "ABCD");
        let lookup = engine.before(&mut first).await.unwrap();
        assert!(matches!(&lookup, Lookup::Proceed(k) if k.as_str() == "RTTP_REQUEST_4:POST:ABCD"));

        let original = Response::new(StatusCode::CREATED).header("trans_id", "1").body("made");
        engine.after(&lookup, &original).await.unwrap();
        assert_eq!(store.len(), 1);

        let mut second = keyed(Method::Post, "ABCD");
        assert_eq!(engine.before(&mut second).await.unwrap(), Lookup::Replay);

        let mut replayed = Response::new(StatusCode::INTERNAL_SERVER_ERROR).header("X-Junk", "1");
        assert!(engine.replay(&mut second, &mut replayed));
        assert_eq!(replayed.status(), StatusCode::CREATED);
        assert_eq!(replayed.headers().get("trans_id"), Some("1"));
        assert!(!replayed.headers().contains("x-junk"));
        assert_eq!(replayed.body_ref().as_bytes().map(|b| &b[..]), Some(&b"made"[..]));
        assert!(second.extensions().is_empty());
    }

    #[tokio::test]
    async fn replay_consumes_the_stash() {
        let (engine, _store) = engine();
        let mut ctx = keyed(Method::Post, "k");
        let lookup = engine.before(&mut ctx).await.unwrap();
        engine.after(&lookup, &Response::new(StatusCode::OK)).await.unwrap();

        let mut ctx = keyed(Method::Post, "k");
        engine.before(&mut ctx).await.unwrap();
        let mut response = Response::default();
        assert!(engine.replay(&mut ctx, &mut response));
        assert!(!engine.replay(&mut ctx, &mut response));
    }

    #[tokio::test]
    async fn replay_without_a_hit_leaves_response_alone() {
        let (engine, _store) = engine();
        let mut ctx = keyed(Method::Delete, "nothing");
        let mut response = Response::new(StatusCode::ACCEPTED);
        assert!(!engine.replay(&mut ctx, &mut response));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn methods_do_not_share_entries() {
        let (engine, _store) = engine();
        let mut post = keyed(Method::Post, "same");
        let lookup = engine.before(&mut post).await.unwrap();
        engine.after(&lookup, &Response::new(StatusCode::CREATED)).await.unwrap();

        let mut delete = keyed(Method::Delete, "same");
        assert!(matches!(engine.before(&mut delete).await.unwrap(), Lookup::Proceed(_)));
    }

    #[tokio::test]
    async fn streaming_response_is_skipped_not_failed() {
        let (engine, store) = engine();
        let mut ctx = keyed(Method::Post, "stream");
        let lookup = engine.before(&mut ctx).await.unwrap();

        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let response = Response::new(StatusCode::OK).streaming(rx);
        engine.after(&lookup, &response).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn corrupt_payload_is_an_error() {
        let (engine, store) = engine();
        store
            .set("RTTP_REQUEST_4:POST:bad", Bytes::from_static(b"{"), DEFAULT_TTL)
            .await
            .unwrap();

        let mut ctx = keyed(Method::Post, "bad");
        let err = engine.before(&mut ctx).await.unwrap_err();
        assert!(matches!(err, IdempotencyError::SnapshotDecoding(_)));
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let engine = IdempotencyEngine::new(Arc::new(Broken));
        let mut ctx = keyed(Method::Post, "k");
        let err = engine.before(&mut ctx).await.unwrap_err();
        assert!(matches!(err, IdempotencyError::CacheUnavailable(_)));

        let lookup = Lookup::Proceed(IdempotencyKey::derive(&Method::Post, Some("k")).unwrap());
        let err = engine.after(&lookup, &Response::new(StatusCode::OK)).await.unwrap_err();
        assert!(matches!(err, IdempotencyError::CacheUnavailable(_)));
    }

    #[tokio::test]
    async fn custom_header_and_prefix() {
        let store = Arc::new(MemoryStore::new());
        let engine = IdempotencyEngine::builder()
            .store(store.clone())
            .header("X-Request-Token")
            .key_prefix("orders:")
            .build()
            .await
            .unwrap();

        let request = Request::new(Method::Post, "/").header("x-request-token", "t1");
        assert_eq!(engine.key_for(&request).unwrap().as_str(), "orders:4:POST:t1");

        let ignored = Request::new(Method::Post, "/").header("Idempotency-Key", "t1");
        assert!(engine.key_for(&ignored).is_none());
    }
}
