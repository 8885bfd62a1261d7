//! The immutable discovery query builder.

use std::fmt;
use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::discovery::constraint::{
    ContextSelector, CoordinatorConstraint, Predicate, SpatialConstraint, SpatialRelation,
    StateSelector,
};
use crate::error::DiscoveryError;
use crate::logging::{PerfSpan, targets};
use crate::scene::{NodeId, SceneTree};
use crate::view::ViewModel;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// A composable filter over one coordinator's view-models.
///
/// Every builder method returns a new query and leaves `self` untouched, so a
/// partially built query can be shared and extended in several directions.
/// Execution runs three stages in order:
///
/// 1. coordinator stage: context selector crossed with a state filter,
/// 2. spatial stage: view-models bound to views on related scene nodes,
/// 3. predicate stage: every registered predicate must hold.
///
/// Setting a coordinator or spatial constraint replaces the previous one of
/// the same kind. Predicates accumulate.
///
/// Queries never cache. Each execution method re-runs the pipeline against
/// the current coordinator state, and the stages read separate snapshots.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use sharp_core::{Coordinator, DiscoveryQuery, View, ViewModel, ProviderError};
///
/// struct Score(u32);
/// impl ViewModel for Score {}
///
/// let coordinator = Arc::new(Coordinator::<Score>::new());
/// coordinator.get(&View::new("a"), Some("left"), &|| Ok::<_, ProviderError>(Score(3))).unwrap();
/// coordinator.get(&View::new("b"), Some("right"), &|| Ok::<_, ProviderError>(Score(9))).unwrap();
///
/// let high = DiscoveryQuery::new(coordinator)
///     .in_any_context()
///     .filter(|s: &Score| s.0 > 5);
/// assert_eq!(high.count(), 1);
/// ```
pub struct DiscoveryQuery<VM> {
    coordinator: Arc<Coordinator<VM>>,
    coordinator_constraint: CoordinatorConstraint,
    spatial_constraint: Option<SpatialConstraint>,
    predicates: Vec<Predicate<VM>>,
}

impl<VM: ViewModel> DiscoveryQuery<VM> {
    /// Create an unconstrained query over `coordinator`.
    pub fn new(coordinator: Arc<Coordinator<VM>>) -> Self {
        Self {
            coordinator,
            coordinator_constraint: CoordinatorConstraint::default(),
            spatial_constraint: None,
            predicates: Vec::new(),
        }
    }

    /// The coordinator this query reads.
    pub fn coordinator(&self) -> &Arc<Coordinator<VM>> {
        &self.coordinator
    }

    /// The coordinator stage constraint.
    pub fn coordinator_constraint(&self) -> &CoordinatorConstraint {
        &self.coordinator_constraint
    }

    /// The spatial stage constraint, if any.
    pub fn spatial_constraint(&self) -> Option<&SpatialConstraint> {
        self.spatial_constraint.as_ref()
    }

    /// Number of accumulated predicates.
    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    // =========================================================================
    // Coordinator stage
    // =========================================================================

    /// The view-model of the named context.
    pub fn in_context(&self, context: impl Into<String>) -> Self {
        self.with_context(ContextSelector::Named(context.into()))
    }

    /// View-models whose context name satisfies `matcher`.
    pub fn where_context<F>(&self, matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.with_context(ContextSelector::Matching(Arc::new(matcher)))
    }

    /// View-models bound to any context.
    pub fn in_any_context(&self) -> Self {
        self.with_context(ContextSelector::WithContext)
    }

    /// View-models paired with a single view outside any context.
    pub fn without_context(&self) -> Self {
        self.with_context(ContextSelector::WithoutContext)
    }

    /// Clear the context selector.
    pub fn with_or_without_context(&self) -> Self {
        self.with_context(ContextSelector::Any)
    }

    /// Only active view-models.
    pub fn that_are_active(&self) -> Self {
        self.with_state(StateSelector::Active)
    }

    /// Only orphaned view-models.
    pub fn that_are_orphaned(&self) -> Self {
        self.with_state(StateSelector::Orphaned)
    }

    /// Clear the state filter.
    pub fn that_exist(&self) -> Self {
        self.with_state(StateSelector::Any)
    }

    // =========================================================================
    // Spatial stage
    // =========================================================================

    /// View-models bound to views on direct children of `node`.
    pub fn children_of(&self, tree: Arc<dyn SceneTree>, node: NodeId) -> Self {
        self.with_spatial(tree, node, SpatialRelation::Children)
    }

    /// View-models bound to views below `node`, at most `max_depth` hops
    /// down, or anywhere in the subtree when `max_depth` is `None`.
    pub fn descendants_of(&self, tree: Arc<dyn SceneTree>, node: NodeId, max_depth: Option<usize>) -> Self {
        self.with_spatial(
            tree,
            node,
            SpatialRelation::Descendants {
                limit: max_depth,
                within: true,
            },
        )
    }

    /// View-models bound to views exactly `depth` hops below `node`.
    pub fn descendants_at_depth(&self, tree: Arc<dyn SceneTree>, node: NodeId, depth: usize) -> Self {
        self.with_spatial(
            tree,
            node,
            SpatialRelation::Descendants {
                limit: Some(depth),
                within: false,
            },
        )
    }

    /// View-models bound to views on the other children of `node`'s parent.
    pub fn siblings_of(&self, tree: Arc<dyn SceneTree>, node: NodeId) -> Self {
        self.with_spatial(tree, node, SpatialRelation::Siblings)
    }

    /// View-models bound to views on any child of `node`'s parent.
    pub fn siblings_of_including_self(&self, tree: Arc<dyn SceneTree>, node: NodeId) -> Self {
        self.with_spatial(tree, node, SpatialRelation::SiblingsAndSelf)
    }

    // =========================================================================
    // Predicate stage
    // =========================================================================

    /// Add a predicate every result must satisfy.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&VM) -> bool + Send + Sync + 'static,
    {
        self.with_predicate(Arc::new(predicate))
    }

    /// Add a predicate that holds when all of `predicates` hold.
    pub fn filter_all<I, F>(&self, predicates: I) -> DiscoveryResult<Self>
    where
        I: IntoIterator<Item = F>,
        F: Fn(&VM) -> bool + Send + Sync + 'static,
    {
        let predicates: Vec<F> = predicates.into_iter().collect();
        if predicates.is_empty() {
            return Err(DiscoveryError::EmptyPredicateSet);
        }
        Ok(self.with_predicate(Arc::new(move |vm: &VM| predicates.iter().all(|p| p(vm)))))
    }

    /// Add a predicate that holds when any of `predicates` holds.
    pub fn filter_any<I, F>(&self, predicates: I) -> DiscoveryResult<Self>
    where
        I: IntoIterator<Item = F>,
        F: Fn(&VM) -> bool + Send + Sync + 'static,
    {
        let predicates: Vec<F> = predicates.into_iter().collect();
        if predicates.is_empty() {
            return Err(DiscoveryError::EmptyPredicateSet);
        }
        Ok(self.with_predicate(Arc::new(move |vm: &VM| predicates.iter().any(|p| p(vm)))))
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Every matching view-model.
    pub fn all(&self) -> Vec<Arc<VM>> {
        self.execute("discovery::all")
    }

    /// The first matching view-model, if any.
    pub fn first(&self) -> Option<Arc<VM>> {
        self.execute("discovery::first").into_iter().next()
    }

    /// The only matching view-model.
    pub fn single(&self) -> DiscoveryResult<Arc<VM>> {
        let mut results = self.execute("discovery::single");
        match results.len() {
            0 => Err(DiscoveryError::NoMatch),
            1 => results.pop().ok_or(DiscoveryError::NoMatch),
            n => Err(DiscoveryError::MultipleMatches(n)),
        }
    }

    /// Whether anything matches.
    pub fn any(&self) -> bool {
        !self.execute("discovery::any").is_empty()
    }

    /// Number of matches.
    pub fn count(&self) -> usize {
        self.execute("discovery::count").len()
    }

    fn execute(&self, operation: &'static str) -> Vec<Arc<VM>> {
        let _perf = PerfSpan::new(operation);

        let mut results = self.coordinator_constraint.select(&self.coordinator);
        tracing::trace!(target: targets::DISCOVERY, constraint = ?self.coordinator_constraint, count = results.len(), "coordinator stage");

        if let Some(spatial) = &self.spatial_constraint {
            results = spatial.retain(results);
            tracing::trace!(target: targets::DISCOVERY, constraint = ?spatial, count = results.len(), "spatial stage");
        }

        if !self.predicates.is_empty() {
            results.retain(|vm| self.predicates.iter().all(|p| p(vm.as_ref())));
            tracing::trace!(target: targets::DISCOVERY, predicates = self.predicates.len(), count = results.len(), "predicate stage");
        }

        results
    }

    // =========================================================================
    // Copy-on-write helpers
    // =========================================================================

    fn with_context(&self, context: ContextSelector) -> Self {
        Self {
            coordinator_constraint: self.coordinator_constraint.with_context(context),
            ..self.clone()
        }
    }

    fn with_state(&self, state: StateSelector) -> Self {
        Self {
            coordinator_constraint: self.coordinator_constraint.with_state(state),
            ..self.clone()
        }
    }

    fn with_spatial(&self, tree: Arc<dyn SceneTree>, node: NodeId, relation: SpatialRelation) -> Self {
        Self {
            spatial_constraint: Some(SpatialConstraint::new(tree, node, relation)),
            ..self.clone()
        }
    }

    fn with_predicate(&self, predicate: Predicate<VM>) -> Self {
        let mut next = self.clone();
        next.predicates.push(predicate);
        next
    }
}

impl<VM> Clone for DiscoveryQuery<VM> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            coordinator_constraint: self.coordinator_constraint.clone(),
            spatial_constraint: self.spatial_constraint.clone(),
            predicates: self.predicates.clone(),
        }
    }
}

impl<VM> fmt::Debug for DiscoveryQuery<VM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryQuery")
            .field("coordinator", &self.coordinator_constraint)
            .field("spatial", &self.spatial_constraint)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::view::View;

    #[derive(Debug)]
    struct Item(u32);
    impl ViewModel for Item {}

    fn seeded() -> Arc<Coordinator<Item>> {
        let coordinator = Arc::new(Coordinator::new());
        for (n, context) in [(1, Some("alpha")), (2, Some("beta")), (3, None), (4, None)] {
            coordinator
                .get(&View::new(format!("v{n}")), context, &move || Ok::<_, ProviderError>(Item(n)))
                .unwrap();
        }
        coordinator
    }

    fn values(mut vms: Vec<Arc<Item>>) -> Vec<u32> {
        vms.sort_by_key(|vm| vm.0);
        vms.iter().map(|vm| vm.0).collect()
    }

    #[test]
    fn test_builder_does_not_mutate_source() {
        let base = DiscoveryQuery::new(seeded());
        let narrowed = base.in_context("alpha").filter(|i| i.0 > 0);

        assert_eq!(base.count(), 4);
        assert_eq!(base.predicate_count(), 0);
        assert_eq!(narrowed.count(), 1);
        assert_eq!(narrowed.predicate_count(), 1);
    }

    #[test]
    fn test_context_selector_overwrites() {
        let query = DiscoveryQuery::new(seeded()).in_context("alpha").in_context("beta");
        assert_eq!(values(query.all()), vec![2]);

        let query = query.without_context();
        assert_eq!(values(query.all()), vec![3, 4]);

        let query = query.with_or_without_context();
        assert_eq!(query.count(), 4);
    }

    #[test]
    fn test_where_context_matcher() {
        let query = DiscoveryQuery::new(seeded()).where_context(|c| c.starts_with('b'));
        assert_eq!(values(query.all()), vec![2]);
    }

    #[test]
    fn test_predicates_accumulate() {
        let query = DiscoveryQuery::new(seeded())
            .filter(|i| i.0 >= 2)
            .filter(|i| i.0 % 2 == 0);
        assert_eq!(values(query.all()), vec![2, 4]);
    }

    #[test]
    fn test_filter_all_and_any() {
        let base = DiscoveryQuery::new(seeded());

        let bounds: [fn(&Item) -> bool; 2] = [|i| i.0 > 1, |i| i.0 < 4];
        let both = base.filter_all(bounds).unwrap();
        assert_eq!(values(both.all()), vec![2, 3]);

        let either: [fn(&Item) -> bool; 2] = [|i| i.0 == 1, |i| i.0 == 4];
        assert_eq!(values(base.filter_any(either).unwrap().all()), vec![1, 4]);

        let empty: Vec<fn(&Item) -> bool> = Vec::new();
        assert_eq!(base.filter_all(empty.clone()).unwrap_err(), DiscoveryError::EmptyPredicateSet);
        assert_eq!(base.filter_any(empty).unwrap_err(), DiscoveryError::EmptyPredicateSet);
    }

    #[test]
    fn test_state_filters() {
        let coordinator = seeded();
        let view = View::new("late");
        let late = coordinator.get(&view, Some("gamma"), &|| Ok::<_, ProviderError>(Item(9))).unwrap();
        coordinator.unregister_view(&view, Some("gamma"));

        let query = DiscoveryQuery::new(coordinator);
        assert_eq!(values(query.that_are_orphaned().all()), vec![9]);
        assert_eq!(query.that_are_active().count(), 4);
        assert_eq!(query.that_are_orphaned().that_exist().count(), 5);
        // Orphans carry no context.
        assert!(!query.in_any_context().that_are_orphaned().any());
        assert!(Arc::ptr_eq(&query.that_are_orphaned().single().unwrap(), &late));
    }

    #[test]
    fn test_single() {
        let query = DiscoveryQuery::new(seeded());
        assert_eq!(query.in_context("alpha").single().map(|i| i.0), Ok(1));
        assert_eq!(query.in_context("missing").single().unwrap_err(), DiscoveryError::NoMatch);
        assert_eq!(query.without_context().single().unwrap_err(), DiscoveryError::MultipleMatches(2));
        assert!(query.in_context("missing").first().is_none());
    }
}
