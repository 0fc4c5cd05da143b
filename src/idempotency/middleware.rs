use std::sync::Arc;

use tracing::error;

use super::IdempotencyError;
use super::engine::{IdempotencyEngine, Lookup};
use super::scope::ScopePolicy;
use crate::context::Context;
use crate::middleware::{Middleware, Next};
use crate::router::ResponseFuture;
use crate::{Response, StatusCode};

/// Runs an [`IdempotencyEngine`] around every in-scope request.
///
/// Per request: check the [`ScopePolicy`], then [`before`](IdempotencyEngine::before).
/// A hit is replayed without calling the rest of the chain; a miss runs the
/// chain and hands the response to [`after`](IdempotencyEngine::after).
///
/// Cache failures answer `503 Service Unavailable` and a corrupt cached
/// snapshot answers `500`. Neither runs the resource.
pub struct IdempotencyMiddleware {
    engine: Arc<IdempotencyEngine>,
    policy: ScopePolicy,
}

impl IdempotencyMiddleware {
    pub fn new(engine: impl Into<Arc<IdempotencyEngine>>, policy: ScopePolicy) -> Self {
        Self {
            engine: engine.into(),
            policy,
        }
    }

    /// Applies to every request carrying a key.
    pub fn unconditional(engine: impl Into<Arc<IdempotencyEngine>>) -> Self {
        Self::new(engine, ScopePolicy::unconditional())
    }

    /// Applies only where the routed resource opts in for the request method.
    pub fn opt_in(engine: impl Into<Arc<IdempotencyEngine>>) -> Self {
        Self::new(engine, ScopePolicy::opt_in())
    }

    pub fn policy(&self) -> &ScopePolicy {
        &self.policy
    }

    pub fn engine(&self) -> &Arc<IdempotencyEngine> {
        &self.engine
    }
}

impl Middleware for IdempotencyMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> ResponseFuture {
        let in_scope = self
            .policy
            .applies(ctx.request().method(), ctx.resource().map(|r| r.as_ref()));
        let engine = Arc::clone(&self.engine);

        Box::pin(async move {
            if !in_scope {
                return next.run(ctx).await;
            }

            let lookup = match engine.before(&mut ctx).await {
                Ok(lookup) => lookup,
                Err(e) => return error_response(&e),
            };

            match lookup {
                Lookup::NotApplicable => next.run(ctx).await,
                Lookup::Replay => {
                    let mut response = Response::default();
                    if engine.replay(&mut ctx, &mut response) {
                        response
                    } else {
                        error!("cache hit was not stashed for replay");
                        Response::new(StatusCode::INTERNAL_SERVER_ERROR)
                    }
                }
                lookup @ Lookup::Proceed(_) => {
                    let response = next.run(ctx).await;
                    match engine.after(&lookup, &response).await {
                        Ok(()) => response,
                        Err(e) => error_response(&e),
                    }
                }
            }
        })
    }
}

fn error_response(err: &IdempotencyError) -> Response {
    let status = match err {
        IdempotencyError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Response::new(status).body(status.canonical_reason())
}
