//! Query constraints, one type per pipeline stage.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::scene::{NodeId, SceneTree, view_of};
use crate::view::{ByRef, ViewModel};

/// A context-name predicate.
pub type ContextMatcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A view-model predicate.
pub type Predicate<VM> = Arc<dyn Fn(&VM) -> bool + Send + Sync>;

/// Which view-models the coordinator stage starts from.
#[derive(Clone, Default)]
pub enum ContextSelector {
    /// Every tracked view-model, with or without a context.
    #[default]
    Any,
    /// The view-model of one named context.
    Named(String),
    /// View-models whose context name satisfies a matcher.
    Matching(ContextMatcher),
    /// View-models bound to any context.
    WithContext,
    /// View-models paired with a single view outside any context.
    WithoutContext,
}

impl fmt::Debug for ContextSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Matching(_) => f.write_str("Matching(..)"),
            Self::WithContext => f.write_str("WithContext"),
            Self::WithoutContext => f.write_str("WithoutContext"),
        }
    }
}

/// Lifecycle state filter applied after context selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateSelector {
    /// Active and orphaned view-models alike.
    #[default]
    Any,
    /// Only active view-models.
    Active,
    /// Only orphaned view-models.
    Orphaned,
}

/// Coordinator-indexed stage: a context selector crossed with a state filter.
///
/// Each selector is replaced, never combined, when set again.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConstraint {
    pub(crate) context: ContextSelector,
    pub(crate) state: StateSelector,
}

impl CoordinatorConstraint {
    /// The context selector.
    pub fn context(&self) -> &ContextSelector {
        &self.context
    }

    /// The state filter.
    pub fn state(&self) -> StateSelector {
        self.state
    }

    pub(crate) fn with_context(&self, context: ContextSelector) -> Self {
        Self {
            context,
            state: self.state,
        }
    }

    pub(crate) fn with_state(&self, state: StateSelector) -> Self {
        Self {
            context: self.context.clone(),
            state,
        }
    }

    /// Select view-models from `coordinator`.
    pub(crate) fn select<VM: ViewModel>(&self, coordinator: &Coordinator<VM>) -> Vec<Arc<VM>> {
        let selected = match (&self.context, self.state) {
            // Served straight from the state sets.
            (ContextSelector::Any, StateSelector::Any) => return coordinator.all(),
            (ContextSelector::Any, StateSelector::Active) => return coordinator.active(),
            (ContextSelector::Any, StateSelector::Orphaned) => return coordinator.orphans(),
            (ContextSelector::Named(name), _) => coordinator.view_model(name).into_iter().collect(),
            (ContextSelector::Matching(matcher), _) => {
                coordinator.view_models_with_context_matching(|context| matcher(context))
            }
            (ContextSelector::WithContext, _) => coordinator.view_models_with_context(),
            (ContextSelector::WithoutContext, _) => coordinator.view_models_without_context(),
        };

        let allowed: HashSet<ByRef<VM>> = match self.state {
            StateSelector::Any => return selected,
            StateSelector::Active => coordinator.active().iter().map(ByRef::new).collect(),
            StateSelector::Orphaned => coordinator.orphans().iter().map(ByRef::new).collect(),
        };
        selected
            .into_iter()
            .filter(|vm| allowed.contains(&ByRef::new(vm)))
            .collect()
    }
}

/// How candidate nodes relate to the reference node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialRelation {
    /// Direct children of the reference node.
    Children,
    /// Descendants of the reference node.
    ///
    /// With a `limit`, `within` keeps nodes 1 to `limit` hops below the
    /// reference; otherwise only nodes exactly `limit` hops below. Without a
    /// limit, the whole subtree below the reference is searched.
    Descendants {
        /// Maximum or exact hop count.
        limit: Option<usize>,
        /// Whether `limit` is an upper bound rather than an exact depth.
        within: bool,
    },
    /// Other children of the reference node's parent.
    Siblings,
    /// All children of the reference node's parent.
    SiblingsAndSelf,
}

/// Spatial stage: keeps view-models bound to views on a set of nodes.
#[derive(Clone)]
pub struct SpatialConstraint {
    tree: Arc<dyn SceneTree>,
    reference: NodeId,
    relation: SpatialRelation,
}

impl SpatialConstraint {
    /// Create a spatial constraint over `tree`.
    pub fn new(tree: Arc<dyn SceneTree>, reference: NodeId, relation: SpatialRelation) -> Self {
        Self {
            tree,
            reference,
            relation,
        }
    }

    /// The reference node.
    pub fn reference(&self) -> NodeId {
        self.reference
    }

    /// The relation to the reference node.
    pub fn relation(&self) -> SpatialRelation {
        self.relation
    }

    /// Nodes selected by the relation, in tree order.
    ///
    /// A reference node missing from the tree selects nothing, as does a
    /// sibling query on a root node.
    pub fn candidate_nodes(&self) -> Vec<NodeId> {
        let tree = self.tree.as_ref();
        if !tree.contains(self.reference) {
            return Vec::new();
        }

        match self.relation {
            SpatialRelation::Children => tree.children(self.reference),
            SpatialRelation::Descendants { limit, within } => {
                let mut nodes = Vec::new();
                collect_descendants(tree, self.reference, 0, limit, within, &mut nodes);
                nodes
            }
            SpatialRelation::Siblings => tree
                .parent(self.reference)
                .map(|parent| {
                    tree.children(parent)
                        .into_iter()
                        .filter(|&node| node != self.reference)
                        .collect()
                })
                .unwrap_or_default(),
            SpatialRelation::SiblingsAndSelf => tree
                .parent(self.reference)
                .map(|parent| tree.children(parent))
                .unwrap_or_default(),
        }
    }

    /// Keep the view-models bound to a view on at least one candidate node.
    pub(crate) fn retain<VM: ViewModel>(&self, view_models: Vec<Arc<VM>>) -> Vec<Arc<VM>> {
        let bound: HashSet<ByRef<VM>> = self
            .candidate_nodes()
            .into_iter()
            .filter_map(|node| view_of::<VM>(self.tree.as_ref(), node))
            .filter_map(|view| view.view_model())
            .map(ByRef)
            .collect();

        view_models
            .into_iter()
            .filter(|vm| bound.contains(&ByRef::new(vm)))
            .collect()
    }
}

impl fmt::Debug for SpatialConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialConstraint")
            .field("reference", &self.reference)
            .field("relation", &self.relation)
            .finish_non_exhaustive()
    }
}

fn collect_descendants(
    tree: &dyn SceneTree,
    node: NodeId,
    depth: usize,
    limit: Option<usize>,
    within: bool,
    out: &mut Vec<NodeId>,
) {
    for child in tree.children(node) {
        let child_depth = depth + 1;
        match limit {
            None => out.push(child),
            Some(limit) if (within && child_depth <= limit) || child_depth == limit => out.push(child),
            Some(_) => {}
        }
        if limit.is_none_or(|limit| child_depth < limit) {
            collect_descendants(tree, child, child_depth, limit, within, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SharedSceneGraph;

    // root
    //  |- a
    //  |   |- a1
    //  |       |- a11
    //  |- b
    //  |- c
    fn tree() -> (Arc<SharedSceneGraph>, [NodeId; 6]) {
        let scene = Arc::new(SharedSceneGraph::new());
        let root = scene.create_node("root");
        let a = scene.create_child(root, "a").unwrap();
        let a1 = scene.create_child(a, "a1").unwrap();
        let a11 = scene.create_child(a1, "a11").unwrap();
        let b = scene.create_child(root, "b").unwrap();
        let c = scene.create_child(root, "c").unwrap();
        (scene, [root, a, a1, a11, b, c])
    }

    fn nodes(scene: &Arc<SharedSceneGraph>, reference: NodeId, relation: SpatialRelation) -> Vec<NodeId> {
        SpatialConstraint::new(scene.clone(), reference, relation).candidate_nodes()
    }

    #[test]
    fn test_children() {
        let (scene, [root, a, _, _, b, c]) = tree();
        assert_eq!(nodes(&scene, root, SpatialRelation::Children), vec![a, b, c]);
    }

    #[test]
    fn test_descendants_limits() {
        let (scene, [root, a, a1, a11, b, c]) = tree();

        let unlimited = SpatialRelation::Descendants { limit: None, within: true };
        assert_eq!(nodes(&scene, root, unlimited), vec![a, a1, a11, b, c]);

        let within_two = SpatialRelation::Descendants { limit: Some(2), within: true };
        assert_eq!(nodes(&scene, root, within_two), vec![a, a1, b, c]);

        let exactly_two = SpatialRelation::Descendants { limit: Some(2), within: false };
        assert_eq!(nodes(&scene, root, exactly_two), vec![a1]);

        let zero = SpatialRelation::Descendants { limit: Some(0), within: true };
        assert!(nodes(&scene, root, zero).is_empty());
    }

    #[test]
    fn test_siblings() {
        let (scene, [root, a, _, _, b, c]) = tree();
        assert_eq!(nodes(&scene, b, SpatialRelation::Siblings), vec![a, c]);
        assert_eq!(nodes(&scene, b, SpatialRelation::SiblingsAndSelf), vec![a, b, c]);
        assert!(nodes(&scene, root, SpatialRelation::Siblings).is_empty());
    }

    #[test]
    fn test_missing_reference_selects_nothing() {
        let (scene, [_, a, ..]) = tree();
        scene.destroy(a).unwrap();
        assert!(nodes(&scene, a, SpatialRelation::Children).is_empty());
    }

    #[test]
    fn test_selectors_overwrite_independently() {
        let constraint = CoordinatorConstraint::default()
            .with_context(ContextSelector::Named("x".into()))
            .with_state(StateSelector::Active)
            .with_context(ContextSelector::WithoutContext);

        assert!(matches!(constraint.context(), ContextSelector::WithoutContext));
        assert_eq!(constraint.state(), StateSelector::Active);
    }
}
