//! Request routing: map URL patterns to [`Resource`]s.
//!
//! Three pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params                 |
//! |----------------------|----------------------------|---------------------------------|
//! | `/orders`            | `/orders`                  | *(none)*                        |
//! | `/orders/:id`        | `/orders/42`               | `id → "42"`                     |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"` |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//!
//! Routes are matched in registration order. A route is chosen when its pattern
//! matches and its resource [allows](Resource::allows) the request method; a
//! path that matches only routes for other methods resolves to
//! `405 Method Not Allowed`, and a path that matches nothing to `404 Not Found`.

use std::sync::Arc;

use crate::context::{Context, Parameters};
use crate::{Method, Request, Response, StatusCode};

mod resource;

pub use resource::{
    Handler, IdempotentDelete, IdempotentPost, IntoHandler, Resource, ResponseFuture,
};
use resource::Endpoint;

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

impl Pattern {
    /// Compile a route pattern string.
    ///
    /// Classified in order: a `/*` suffix is a wildcard prefix match, any `:`
    /// makes a parameterized pattern, everything else is an exact match.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    // Match `path`, returning the captured parameters on success.
    fn matches(&self, path: &str) -> Option<Parameters> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(Parameters::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = Parameters::new();
                for (segment, actual) in segments.iter().zip(path_segments) {
                    match segment {
                        Segment::Static(expected) if expected != actual => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), actual.to_string());
                        }
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                let mut params = Parameters::new();
                params.insert("wildcard".to_string(), suffix.to_string());
                Some(params)
            }
        }
    }
}

// A registered route binding a pattern to a resource.
struct Route {
    pattern: Pattern,
    resource: Arc<dyn Resource>,
}

/// The outcome of looking a request up in the [`Router`].
pub enum Resolution {
    /// A route accepted the request.
    Matched {
        resource: Arc<dyn Resource>,
        params: Parameters,
    },
    /// The path matched, but no route there accepts the method.
    MethodNotAllowed,
    NotFound,
}

impl Resolution {
    /// The status to answer with when the request was not matched.
    pub fn miss_status(&self) -> Option<StatusCode> {
        match self {
            Resolution::Matched { .. } => None,
            Resolution::MethodNotAllowed => Some(StatusCode::METHOD_NOT_ALLOWED),
            Resolution::NotFound => Some(StatusCode::NOT_FOUND),
        }
    }
}

/// HTTP request router that resolves requests to registered resources.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_idempotency::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
///
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::OK) });
///
/// // Retries of this POST with the same `Idempotency-Key` replay the first response.
/// router.idempotent_post("/orders", |_ctx| async {
///     Response::new(StatusCode::CREATED)
/// });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a [`Resource`] at `path`. The resource answers every method
    /// and declares its own idempotency capabilities.
    pub fn resource(&mut self, path: &str, resource: impl Resource) {
        self.routes.push(Route {
            pattern: Pattern::parse(path),
            resource: Arc::new(resource),
        });
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Get, path, handler, false);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Post, path, handler, false);
    }

    /// Register a `POST` handler whose duplicate requests are answered from the
    /// idempotency cache when the idempotency middleware runs in opt-in mode.
    pub fn idempotent_post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Post, path, handler, true);
    }

    /// Register a handler for `PUT` requests matching `path`.
    pub fn put(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Put, path, handler, false);
    }

    /// Register a handler for `PATCH` requests matching `path`.
    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Patch, path, handler, false);
    }

    /// Register a handler for `DELETE` requests matching `path`.
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Delete, path, handler, false);
    }

    /// The `DELETE` counterpart of [`idempotent_post`](Self::idempotent_post).
    pub fn idempotent_delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_endpoint(Method::Delete, path, handler, true);
    }

    fn add_endpoint(
        &mut self,
        method: Method,
        path: &str,
        handler: impl IntoHandler,
        idempotent: bool,
    ) {
        self.resource(path, Endpoint::new(method, handler, idempotent));
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.resource.allows(method) {
                return Resolution::Matched {
                    resource: Arc::clone(&route.resource),
                    params,
                };
            }
            path_matched = true;
        }

        if path_matched {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }

    /// Dispatch `request` straight to its resource, without any middleware.
    pub async fn route(&self, request: Request) -> Response {
        match self.resolve(request.method(), request.path()) {
            Resolution::Matched { resource, params } => {
                let ctx = Context::routed(request, params, Arc::clone(&resource));
                resource.dispatch(ctx).await
            }
            miss => Response::new(miss.miss_status().unwrap_or(StatusCode::NOT_FOUND)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: Method, path: &str) -> Request {
        Request::new(method, path)
    }

    // ── Pattern ──────────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_root() {
        assert!(matches!(Pattern::parse("/"), Pattern::Exact(s) if s == "/"));
    }

    #[test]
    fn pattern_parse_trailing_slash_stripped() {
        assert!(matches!(Pattern::parse("/orders/"), Pattern::Exact(s) if s == "/orders"));
    }

    #[test]
    fn pattern_parse_parameterized() {
        match Pattern::parse("/users/:id/orders/:order_id") {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 4);
                assert!(matches!(&segments[1], Segment::Parameter(s) if s == "id"));
                assert!(matches!(&segments[3], Segment::Parameter(s) if s == "order_id"));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn pattern_parse_wildcard() {
        assert!(matches!(Pattern::parse("/files/*"), Pattern::Wildcard(s) if s == "/files"));
    }

    #[test]
    fn pattern_exact_matches_with_trailing_slash() {
        let pat = Pattern::parse("/orders");
        assert!(pat.matches("/orders").is_some());
        assert!(pat.matches("/orders/").is_some());
        assert!(pat.matches("/refunds").is_none());
    }

    #[test]
    fn pattern_param_extracts_values() {
        let pat = Pattern::parse("/users/:id/orders/:order_id");
        let params = pat.matches("/users/7/orders/99").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("order_id"), Some("99"));
        assert!(pat.matches("/users/7").is_none());
        assert!(pat.matches("/people/7/orders/99").is_none());
    }

    #[test]
    fn pattern_wildcard_captures_suffix() {
        let pat = Pattern::parse("/files/*");
        let params = pat.matches("/files/docs/readme.txt").unwrap();
        assert_eq!(params.get("wildcard"), Some("/docs/readme.txt"));
        assert!(pat.matches("/other/readme.txt").is_none());
    }

    // ── Router ────────────────────────────────────────────────────────────────

    #[test]
    fn router_len_counts_registrations() {
        let mut router = Router::new();
        assert!(router.is_empty());
        router.get("/a", |_ctx| async { Response::new(StatusCode::OK) });
        router.idempotent_post("/a", |_ctx| async { Response::new(StatusCode::OK) });
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn router_unregistered_path_returns_404() {
        let router = Router::new();
        let res = router.route(make_request(Method::Get, "/")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn router_wrong_method_returns_405() {
        let mut router = Router::new();
        router.get("/hello", |_ctx| async { Response::new(StatusCode::OK) });
        let res = router.route(make_request(Method::Post, "/hello")).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn router_skips_routes_for_other_methods() {
        let mut router = Router::new();
        router.get("/orders", |_ctx| async { Response::new(StatusCode::OK) });
        router.post("/orders", |_ctx| async { Response::new(StatusCode::CREATED) });
        let res = router.route(make_request(Method::Post, "/orders")).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn router_first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_ctx| async { Response::new(StatusCode::OK) });
        router.get("/path", |_ctx| async { Response::new(StatusCode::ACCEPTED) });
        let res = router.route(make_request(Method::Get, "/path")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn router_parameterized_route_receives_params() {
        let mut router = Router::new();
        router.delete("/orders/:id", |ctx: Context| async move {
            let id = ctx.params().get("id").unwrap_or("").to_owned();
            Response::new(StatusCode::OK).body(id)
        });
        let res = router
            .route(make_request(Method::Delete, "/orders/42"))
            .await;
        assert_eq!(
            res.body_ref().as_bytes().map(|b| b.as_ref()),
            Some(&b"42"[..])
        );
    }

    #[test]
    fn resolve_exposes_endpoint_capabilities() {
        let mut router = Router::new();
        router.idempotent_post("/orders", |_ctx| async { Response::new(StatusCode::OK) });
        router.delete("/orders", |_ctx| async { Response::new(StatusCode::OK) });

        match router.resolve(&Method::Post, "/orders") {
            Resolution::Matched { resource, .. } => assert!(resource.idempotent_post()),
            _ => panic!("POST /orders should resolve"),
        }
        match router.resolve(&Method::Delete, "/orders") {
            Resolution::Matched { resource, .. } => assert!(!resource.idempotent_delete()),
            _ => panic!("DELETE /orders should resolve"),
        }
        assert!(matches!(
            router.resolve(&Method::Put, "/orders"),
            Resolution::MethodNotAllowed
        ));
        assert!(matches!(
            router.resolve(&Method::Put, "/nowhere"),
            Resolution::NotFound
        ));
    }
}
