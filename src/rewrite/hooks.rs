//! Hook points and registries
//!
//! Five interception kinds, applied by the engine per visited node:
//!
//! | Hook       | Order applied        | Stops at            |
//! |------------|----------------------|---------------------|
//! | Normalizer | reverse registration | first match         |
//! | Inspector  | reverse registration | first failure       |
//! | Expander   | reverse registration | first match         |
//! | Filter     | registration order   | never               |
//! | Sourcer    | singleton            |                     |
//!
//! Registries are assembled once with `HookRegistryBuilder` and shared
//! read-only across requests.

use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;

use super::context::RewriteContext;
use super::errors::RewriteResult;

/// Rewrites a visited node into an equivalent canonical form
pub trait Normalizer: Send + Sync {
    fn name(&self) -> &str;

    /// Returns a replacement, or `None` to leave the node as is
    fn normalize(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>>;
}

/// Validates a visited node
pub trait Inspector: Send + Sync {
    fn name(&self) -> &str;

    /// Returns false to reject the request
    fn inspect(&self, ctx: &RewriteContext<'_>) -> RewriteResult<bool>;
}

/// Replaces a data reference with a query over other sources
pub trait Expander: Send + Sync {
    fn name(&self) -> &str;

    fn expand(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>>;
}

/// Wraps a visited node, typically restricting the rows it produces.
///
/// Every filter observes the original visited node; a returned tree that
/// references that node sees it substituted by the result of the filters
/// that ran before.
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    fn filter(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>>;
}

/// Sourcing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// No root exists yet; a constant native queryable is expected
    Root,
    /// A fragment relative to the established root is expected
    Embedded,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Root => "root",
            SourceMode::Embedded => "embedded",
        }
    }
}

/// Turns data references into backend-native fragments
pub trait Sourcer: Send + Sync {
    fn name(&self) -> &str;

    fn source(&self, ctx: &RewriteContext<'_>, mode: SourceMode) -> RewriteResult<Option<Expr>>;
}

/// Ordered hook lists plus the sourcer
#[derive(Clone, Default)]
pub struct HookRegistry {
    normalizers: Vec<Arc<dyn Normalizer>>,
    inspectors: Vec<Arc<dyn Inspector>>,
    expanders: Vec<Arc<dyn Expander>>,
    filters: Vec<Arc<dyn Filter>>,
    sourcer: Option<Arc<dyn Sourcer>>,
}

impl HookRegistry {
    /// Start building a registry
    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::new()
    }

    /// Normalizers, in registration order
    pub fn normalizers(&self) -> &[Arc<dyn Normalizer>] {
        &self.normalizers
    }

    /// Inspectors, in registration order
    pub fn inspectors(&self) -> &[Arc<dyn Inspector>] {
        &self.inspectors
    }

    /// Expanders, in registration order
    pub fn expanders(&self) -> &[Arc<dyn Expander>] {
        &self.expanders
    }

    /// Filters, in registration order
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    pub fn sourcer(&self) -> Option<&Arc<dyn Sourcer>> {
        self.sourcer.as_ref()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("normalizers", &self.normalizers.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("inspectors", &self.inspectors.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("expanders", &self.expanders.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("filters", &self.filters.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("sourcer", &self.sourcer.as_ref().map(|s| s.name()))
            .finish()
    }
}

/// Builder for hook registries
#[derive(Default)]
pub struct HookRegistryBuilder {
    registry: HookRegistry,
}

impl HookRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalizer(mut self, hook: impl Normalizer + 'static) -> Self {
        self.registry.normalizers.push(Arc::new(hook));
        self
    }

    pub fn inspector(mut self, hook: impl Inspector + 'static) -> Self {
        self.registry.inspectors.push(Arc::new(hook));
        self
    }

    pub fn expander(mut self, hook: impl Expander + 'static) -> Self {
        self.registry.expanders.push(Arc::new(hook));
        self
    }

    pub fn filter(mut self, hook: impl Filter + 'static) -> Self {
        self.registry.filters.push(Arc::new(hook));
        self
    }

    /// Set the sourcer, replacing any previous one
    pub fn sourcer(mut self, sourcer: impl Sourcer + 'static) -> Self {
        self.registry.sourcer = Some(Arc::new(sourcer));
        self
    }

    /// Set a shared sourcer
    pub fn shared_sourcer(mut self, sourcer: Arc<dyn Sourcer>) -> Self {
        self.registry.sourcer = Some(sourcer);
        self
    }

    pub fn build(self) -> Arc<HookRegistry> {
        Arc::new(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Filter for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn filter(&self, _ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>> {
            Ok(None)
        }
    }

    impl Sourcer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn source(&self, _ctx: &RewriteContext<'_>, _mode: SourceMode) -> RewriteResult<Option<Expr>> {
            Ok(None)
        }
    }

    #[test]
    fn test_registration_order_kept() {
        let registry = HookRegistry::builder()
            .filter(Named("first"))
            .filter(Named("second"))
            .build();

        let names: Vec<&str> = registry.filters().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_sourcer_is_singleton() {
        let registry = HookRegistry::builder()
            .sourcer(Named("a"))
            .sourcer(Named("b"))
            .build();

        assert_eq!(registry.sourcer().map(|s| s.name()), Some("b"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = HookRegistry::builder().build();
        assert!(registry.sourcer().is_none());
        assert!(registry.normalizers().is_empty());
        assert!(format!("{:?}", registry).contains("HookRegistry"));
    }
}
