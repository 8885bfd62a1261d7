//! Discovery of live view-models.
//!
//! [`Discovery`] hands out [`DiscoveryQuery`] values bound to the
//! coordinators of a shared [`CoordinatorRegistry`].

mod constraint;
mod query;

use std::sync::Arc;

pub use constraint::{
    ContextMatcher, ContextSelector, CoordinatorConstraint, Predicate, SpatialConstraint,
    SpatialRelation, StateSelector,
};
pub use query::{DiscoveryQuery, DiscoveryResult};

use crate::registry::CoordinatorRegistry;
use crate::view::ViewModel;

/// Factory for discovery queries.
#[derive(Debug, Clone)]
pub struct Discovery {
    registry: Arc<CoordinatorRegistry>,
}

impl Discovery {
    /// Create a discovery service over `registry`.
    pub fn new(registry: Arc<CoordinatorRegistry>) -> Self {
        Self { registry }
    }

    /// The registry queries are resolved against.
    pub fn registry(&self) -> &Arc<CoordinatorRegistry> {
        &self.registry
    }

    /// An unconstrained query over the coordinator for `VM`.
    ///
    /// Creates the coordinator if none exists yet.
    pub fn for_view_model<VM: ViewModel>(&self) -> DiscoveryQuery<VM> {
        DiscoveryQuery::new(self.registry.for_view_model::<VM>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::view::View;

    struct Badge;
    impl ViewModel for Badge {}

    #[test]
    fn test_queries_follow_registry() {
        let registry = Arc::new(CoordinatorRegistry::new());
        let discovery = Discovery::new(Arc::clone(&registry));

        assert_eq!(discovery.for_view_model::<Badge>().count(), 0);
        assert!(registry.contains::<Badge>());

        let view = View::new("badge");
        registry
            .for_view_model::<Badge>()
            .get(&view, Some("header"), &|| Ok::<_, ProviderError>(Badge))
            .unwrap();
        assert!(discovery.for_view_model::<Badge>().in_context("header").any());
    }
}
