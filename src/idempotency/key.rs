use std::fmt;

use crate::Method;

/// Prefix of every cache key the engine writes unless configured otherwise.
pub const DEFAULT_KEY_PREFIX: &str = "RTTP_REQUEST_";

/// The cache key for one logical operation: a request method plus the
/// client's idempotency header value.
///
/// Keys have the shape `{prefix}{method length}:{method}:{value}`. The length
/// prefix fixes where the method ends, so no two `(method, value)` pairs can
/// produce the same key whatever characters either contains. The value is
/// used verbatim and compared case-sensitively; the method is the canonical
/// upper-case verb.
///
/// ```
/// use rttp_idempotency::Method;
/// use rttp_idempotency::idempotency::IdempotencyKey;
///
/// let key = IdempotencyKey::derive(&Method::Post, Some("ABCD")).unwrap();
/// assert_eq!(key.as_str(), "RTTP_REQUEST_4:POST:ABCD");
///
/// assert!(IdempotencyKey::derive(&Method::Post, Some("")).is_none());
/// assert!(IdempotencyKey::derive(&Method::Post, None).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derives a key under [`DEFAULT_KEY_PREFIX`]. Returns `None` when the
    /// header is absent or empty, meaning the client did not ask for
    /// idempotency.
    pub fn derive(method: &Method, header_value: Option<&str>) -> Option<Self> {
        Self::derive_with_prefix(DEFAULT_KEY_PREFIX, method, header_value)
    }

    pub fn derive_with_prefix(
        prefix: &str,
        method: &Method,
        header_value: Option<&str>,
    ) -> Option<Self> {
        let value = header_value.filter(|value| !value.is_empty())?;
        let method = method.as_str();
        Some(Self(format!("{prefix}{}:{method}:{value}", method.len())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
