use crate::Method;
use crate::router::Resource;

/// Decides, per request, whether the idempotency engine runs at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePolicy {
    /// Every request carrying an idempotency key, whatever its target.
    /// `methods` narrows this to a fixed set of methods when present.
    Unconditional { methods: Option<Vec<Method>> },

    /// Only requests whose routed resource declares the capability for the
    /// request method: [`Resource::idempotent_post`] for POST and
    /// [`Resource::idempotent_delete`] for DELETE. No other method qualifies.
    OptIn,
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self::unconditional()
    }
}

impl ScopePolicy {
    pub fn unconditional() -> Self {
        Self::Unconditional { methods: None }
    }

    /// Unconditional, but limited to POST and DELETE.
    pub fn mutating_only() -> Self {
        Self::Unconditional {
            methods: Some(vec![Method::Post, Method::Delete]),
        }
    }

    pub fn opt_in() -> Self {
        Self::OptIn
    }

    /// Whether a `method` request routed to `resource` is in scope.
    ///
    /// Under [`OptIn`](Self::OptIn) an unrouted request is never in scope.
    pub fn applies(&self, method: &Method, resource: Option<&dyn Resource>) -> bool {
        match self {
            Self::Unconditional { methods: None } => true,
            Self::Unconditional { methods: Some(methods) } => methods.contains(method),
            Self::OptIn => resource.is_some_and(|resource| match method {
                Method::Post => resource.idempotent_post(),
                Method::Delete => resource.idempotent_delete(),
                _ => false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{IdempotentDelete, IdempotentPost};

    struct Plain;
    impl Resource for Plain {}

    #[test]
    fn unconditional_ignores_resource() {
        let policy = ScopePolicy::unconditional();
        assert!(policy.applies(&Method::Post, None));
        assert!(policy.applies(&Method::Put, Some(&Plain)));
        assert!(policy.applies(&Method::Get, None));
    }

    #[test]
    fn mutating_only_restricts_methods() {
        let policy = ScopePolicy::mutating_only();
        assert!(policy.applies(&Method::Post, None));
        assert!(policy.applies(&Method::Delete, Some(&Plain)));
        assert!(!policy.applies(&Method::Put, None));
        assert!(!policy.applies(&Method::Get, None));
    }

    #[test]
    fn opt_in_without_flags_never_applies() {
        let policy = ScopePolicy::opt_in();
        for method in [Method::Post, Method::Delete, Method::Put, Method::Get] {
            assert!(!policy.applies(&method, Some(&Plain)));
            assert!(!policy.applies(&method, None));
        }
    }

    #[test]
    fn opt_in_flags_are_per_method() {
        let policy = ScopePolicy::opt_in();

        let post_only = IdempotentPost(Plain);
        assert!(policy.applies(&Method::Post, Some(&post_only)));
        assert!(!policy.applies(&Method::Delete, Some(&post_only)));

        let delete_only = IdempotentDelete(Plain);
        assert!(!policy.applies(&Method::Post, Some(&delete_only)));
        assert!(policy.applies(&Method::Delete, Some(&delete_only)));

        let both = IdempotentDelete(IdempotentPost(Plain));
        assert!(policy.applies(&Method::Post, Some(&both)));
        assert!(policy.applies(&Method::Delete, Some(&both)));
        assert!(!policy.applies(&Method::Patch, Some(&both)));
    }
}
