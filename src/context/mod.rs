//! Per-request context, the request, its route match, and request-scoped state.
//!
//! A [`Context`] is created once routing has resolved the request, so every
//! middleware sees the path parameters and the target [`Resource`] before the
//! resource itself runs. [`Extensions`] is the scratch space middleware uses to
//! hand values from one phase of the request to another.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use crate::Request;
use crate::router::Resource;

/// Type-erased request extensions map, used to inject per-request state
/// into handlers without requiring handlers to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        return Self {
            map: HashMap::new(),
        };
    }

    /// Insert a value, returning the previous value of the same type
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    /// Get a value from the extensions map
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get a mutable reference to a value from the extensions map
    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Remove a value from the extensions map
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn contains<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Path parameters extracted from the matched route
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        return Self {
            map: HashMap::new(),
        };
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|value| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-request context handed through the middleware chain to the resource.
pub struct Context {
    request: Request,
    params: Parameters,
    resource: Option<Arc<dyn Resource>>,
    extensions: Extensions,
}

impl Context {
    /// Create a context for a request that did not match any route
    pub fn new(request: Request) -> Self {
        Self::with_params(request, Parameters::new())
    }

    /// Create a context carrying the parameters captured by routing
    pub fn with_params(request: Request, params: Parameters) -> Self {
        Self {
            request,
            params,
            resource: None,
            extensions: Extensions::new(),
        }
    }

    /// Create a context for a request routed to `resource`
    pub fn routed(request: Request, params: Parameters, resource: Arc<dyn Resource>) -> Self {
        Self {
            resource: Some(resource),
            ..Self::with_params(request, params)
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// The resource the router matched, or `None` for unrouted requests.
    pub fn resource(&self) -> Option<&Arc<dyn Resource>> {
        self.resource.as_ref()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.request.body();
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[derive(Debug, PartialEq)]
    struct Marker(&'static str);

    #[test]
    fn extensions_insert_replaces_and_returns_previous() {
        let mut ext = Extensions::new();
        assert!(ext.insert(Marker("first")).is_none());
        assert_eq!(ext.insert(Marker("second")), Some(Marker("first")));
        assert_eq!(ext.get::<Marker>(), Some(&Marker("second")));
    }

    #[test]
    fn extensions_remove_consumes() {
        let mut ext = Extensions::new();
        ext.insert(Marker("x"));
        assert!(ext.contains::<Marker>());
        assert_eq!(ext.remove::<Marker>(), Some(Marker("x")));
        assert!(ext.remove::<Marker>().is_none());
        assert!(ext.is_empty());
    }

    #[test]
    fn context_json_reads_request_body() {
        let request = Request::new(Method::Post, "/orders").with_body(r#"{"amount":5}"#);
        let ctx = Context::new(request);
        let value: serde_json::Value = ctx.json().unwrap();
        assert_eq!(value["amount"], 5);
        assert!(ctx.resource().is_none());
    }
}
