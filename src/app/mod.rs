//! Application: a [`Router`] wrapped in a middleware stack.
//!
//! Every request is routed first. The resulting [`Context`] (carrying the
//! matched resource, if any) then flows through the middleware in registration
//! order and finally into the resource. Unrouted requests still pass through
//! the middleware and end in a `404`/`405` response.

use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::router::{Handler, Resolution, ResponseFuture, Router};
use crate::{Request, Response};

/// A routed application with middleware.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_idempotency::{App, Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::OK) });
///
/// let app = App::new(router);
/// ```
pub struct App {
    router: Router,
    middlewares: Arc<[MiddlewareHandler]>,
}

impl App {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            middlewares: Arc::from(Vec::<MiddlewareHandler>::new()),
        }
    }

    /// Appends a middleware. The first middleware added is the outermost layer.
    #[must_use]
    pub fn wrap<M>(self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.wrap_handler(from_middleware(Arc::new(middleware)))
    }

    /// Appends an already type-erased middleware.
    #[must_use]
    pub fn wrap_handler(mut self, handler: MiddlewareHandler) -> Self {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(handler);
        self.middlewares = middlewares.into();
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Route `request`, run it through the middleware stack, and return the
    /// final response.
    pub async fn handle(&self, request: Request) -> Response {
        let resolution = self.router.resolve(request.method(), request.path());

        let (ctx, endpoint): (Context, Handler) = match resolution {
            Resolution::Matched { resource, params } => {
                let ctx = Context::routed(request, params, Arc::clone(&resource));
                let endpoint: Handler = Arc::new(move |ctx: Context| resource.dispatch(ctx));
                (ctx, endpoint)
            }
            miss => {
                let status = miss.miss_status().unwrap_or(crate::StatusCode::NOT_FOUND);
                let endpoint: Handler = Arc::new(move |_ctx: Context| -> ResponseFuture {
                    Box::pin(async move { Response::new(status) })
                });
                (Context::new(request), endpoint)
            }
        };

        Next::new(Arc::clone(&self.middlewares), endpoint)
            .run(ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, StatusCode};

    struct ResourceProbe;

    impl Middleware for ResourceProbe {
        fn handle(&self, ctx: Context, next: Next) -> ResponseFuture {
            let routed = ctx.resource().is_some();
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Routed", routed.to_string());
                response
            })
        }
    }

    fn app() -> App {
        let mut router = Router::new();
        router.post("/orders", |_ctx| async { Response::new(StatusCode::CREATED) });
        App::new(router).wrap(ResourceProbe)
    }

    #[tokio::test]
    async fn middleware_sees_routed_resource() {
        let response = app().handle(Request::new(Method::Post, "/orders")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-routed"), Some("true"));
    }

    #[tokio::test]
    async fn unrouted_requests_still_pass_through_middleware() {
        let app = app();

        let missing = app.handle(Request::new(Method::Post, "/refunds")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.headers().get("x-routed"), Some("false"));

        let wrong_method = app.handle(Request::new(Method::Get, "/orders")).await;
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
