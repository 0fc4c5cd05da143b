//! Routed resources and their capability flags.
//!
//! A [`Resource`] answers the methods it supports and declares, per method,
//! whether duplicate requests to it should be answered from the idempotency
//! cache. Capabilities are plain boolean queries with `false` defaults, so a
//! resource that says nothing is never idempotent.
//!
//! [`IdempotentPost`] and [`IdempotentDelete`] switch a capability on for any
//! existing resource without touching its type:
//!
//! ```rust
//! use rttp_idempotency::router::{IdempotentPost, Resource, ResponseFuture};
//! use rttp_idempotency::{Response, StatusCode, context::Context};
//!
//! struct Orders;
//!
//! impl Resource for Orders {
//!     fn on_post(&self, _ctx: Context) -> ResponseFuture {
//!         Box::pin(async { Response::new(StatusCode::CREATED) })
//!     }
//! }
//!
//! let orders = IdempotentPost(Orders);
//! assert!(orders.idempotent_post());
//! assert!(!orders.idempotent_delete());
//! ```

use std::{future::Future, pin::Pin, sync::Arc};

use crate::context::Context;
use crate::{Method, Response, StatusCode};

/// The boxed future every responder returns.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure. In practice you never construct this
/// type directly; use [`Router::post`](super::Router::post) and the other
/// method-specific helpers instead.
pub type Handler = Arc<dyn Fn(Context) -> ResponseFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below. Router methods accept `impl IntoHandler` so the two-type-parameter where-bound
/// does not need to be repeated at every call site.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> ResponseFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> ResponseFuture {
        Box::pin((self)(ctx))
    }
}

/// A routable target with one responder per HTTP method.
///
/// Every responder defaults to `405 Method Not Allowed`; implement the ones the
/// resource supports. [`dispatch`](Self::dispatch) picks the responder for the
/// request method.
pub trait Resource: Send + Sync + 'static {
    fn on_get(&self, ctx: Context) -> ResponseFuture {
        method_not_allowed(ctx)
    }

    fn on_post(&self, ctx: Context) -> ResponseFuture {
        method_not_allowed(ctx)
    }

    fn on_put(&self, ctx: Context) -> ResponseFuture {
        method_not_allowed(ctx)
    }

    fn on_patch(&self, ctx: Context) -> ResponseFuture {
        method_not_allowed(ctx)
    }

    fn on_delete(&self, ctx: Context) -> ResponseFuture {
        method_not_allowed(ctx)
    }

    /// Whether repeated POSTs carrying the same idempotency key replay the
    /// first response.
    fn idempotent_post(&self) -> bool {
        false
    }

    /// Whether repeated DELETEs carrying the same idempotency key replay the
    /// first response.
    fn idempotent_delete(&self) -> bool {
        false
    }

    /// Whether this resource handles `method` at all. The router keeps
    /// searching later routes when this returns `false`.
    fn allows(&self, _method: &Method) -> bool {
        true
    }

    /// Route the request to the responder for its method.
    fn dispatch(&self, ctx: Context) -> ResponseFuture {
        let method = ctx.request().method().clone();
        match method {
            Method::Get => self.on_get(ctx),
            Method::Post => self.on_post(ctx),
            Method::Put => self.on_put(ctx),
            Method::Patch => self.on_patch(ctx),
            Method::Delete => self.on_delete(ctx),
            _ => method_not_allowed(ctx),
        }
    }
}

fn method_not_allowed(_ctx: Context) -> ResponseFuture {
    Box::pin(async { Response::new(StatusCode::METHOD_NOT_ALLOWED) })
}

/// A single closure bound to one method, registered through the router's
/// method helpers.
pub(crate) struct Endpoint {
    method: Method,
    handler: Handler,
    idempotent: bool,
}

impl Endpoint {
    pub(crate) fn new(method: Method, handler: impl IntoHandler, idempotent: bool) -> Self {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        Self {
            method,
            handler,
            idempotent,
        }
    }
}

impl Resource for Endpoint {
    fn idempotent_post(&self) -> bool {
        self.idempotent && self.method == Method::Post
    }

    fn idempotent_delete(&self) -> bool {
        self.idempotent && self.method == Method::Delete
    }

    fn allows(&self, method: &Method) -> bool {
        &self.method == method
    }

    fn dispatch(&self, ctx: Context) -> ResponseFuture {
        (self.handler)(ctx)
    }
}

macro_rules! delegate_responders {
    () => {
        fn on_get(&self, ctx: Context) -> ResponseFuture {
            self.0.on_get(ctx)
        }

        fn on_post(&self, ctx: Context) -> ResponseFuture {
            self.0.on_post(ctx)
        }

        fn on_put(&self, ctx: Context) -> ResponseFuture {
            self.0.on_put(ctx)
        }

        fn on_patch(&self, ctx: Context) -> ResponseFuture {
            self.0.on_patch(ctx)
        }

        fn on_delete(&self, ctx: Context) -> ResponseFuture {
            self.0.on_delete(ctx)
        }

        fn allows(&self, method: &Method) -> bool {
            self.0.allows(method)
        }

        fn dispatch(&self, ctx: Context) -> ResponseFuture {
            self.0.dispatch(ctx)
        }
    };
}

/// Declares idempotent POSTs on the wrapped resource; every other capability
/// and responder is the wrapped resource's own.
pub struct IdempotentPost<R>(pub R);

impl<R: Resource> Resource for IdempotentPost<R> {
    delegate_responders!();

    fn idempotent_post(&self) -> bool {
        true
    }

    fn idempotent_delete(&self) -> bool {
        self.0.idempotent_delete()
    }
}

/// Declares idempotent DELETEs on the wrapped resource; every other capability
/// and responder is the wrapped resource's own.
pub struct IdempotentDelete<R>(pub R);

impl<R: Resource> Resource for IdempotentDelete<R> {
    delegate_responders!();

    fn idempotent_post(&self) -> bool {
        self.0.idempotent_post()
    }

    fn idempotent_delete(&self) -> bool {
        true
    }
}
