//! Scene tree abstraction and a concrete scene graph.
//!
//! Discovery queries only need a handful of things from the scene: a node's
//! parent, its ordered children, and the view component attached to it. Those
//! needs are captured by the [`SceneTree`] trait so an application can plug in
//! its own hierarchy.
//!
//! [`SceneGraph`] is the bundled implementation: arena-backed nodes with
//! stable [`NodeId`]s, ordered children, cascade destroy, and per-node view
//! attachment. [`SharedSceneGraph`] wraps it in a `RwLock` and implements
//! [`SceneTree`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};

use crate::error::SceneError;
use crate::logging::targets;
use crate::view::{View, ViewModel};

new_key_type! {
    /// A stable identifier for a node in a scene tree.
    ///
    /// Ids stay valid while the tree is rearranged and become invalid when the
    /// node is destroyed.
    pub struct NodeId;
}

impl NodeId {
    /// Convert to a raw u64, for interop with external trees.
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }
}

/// Result type for scene operations.
pub type SceneResult<T> = std::result::Result<T, SceneError>;

/// Read access to an ordered tree of nodes with attached components.
///
/// Implementations answer for the present state of the tree; callers take no
/// lock across calls, so a sequence of calls may observe concurrent edits.
pub trait SceneTree: Send + Sync {
    /// Whether the node exists.
    fn contains(&self, node: NodeId) -> bool;

    /// The node's parent, or `None` for roots and unknown nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// The node's children in order. Empty for leaves and unknown nodes.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Number of children.
    fn child_count(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    /// The child at `index`.
    fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.children(node).get(index).copied()
    }

    /// The component of the given type attached to the node.
    fn component(&self, node: NodeId, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Fetch the `View<VM>` attached to a node.
pub fn view_of<VM: ViewModel>(tree: &dyn SceneTree, node: NodeId) -> Option<Arc<View<VM>>> {
    tree.component(node, TypeId::of::<View<VM>>())?
        .downcast::<View<VM>>()
        .ok()
}

struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    components: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl NodeData {
    fn new(name: String) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            components: HashMap::new(),
        }
    }
}

/// An arena-backed scene tree.
pub struct SceneGraph {
    nodes: SlotMap<NodeId, NodeData>,
}

impl SceneGraph {
    /// Create an empty scene graph.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Create a root node.
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        tracing::trace!(target: targets::SCENE, %name, "created node");
        self.nodes.insert(NodeData::new(name))
    }

    /// Create a node as the last child of `parent`.
    pub fn create_child(&mut self, parent: NodeId, name: impl Into<String>) -> SceneResult<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::InvalidNode);
        }
        let id = self.create_node(name);
        self.set_parent(id, Some(parent))?;
        Ok(id)
    }

    /// Remove a node and all of its descendants.
    ///
    /// Attached views are dropped from the tree; the coordinator is not told,
    /// callers unregister views themselves.
    pub fn destroy(&mut self, id: NodeId) -> SceneResult<()> {
        let descendants = self.collect_descendants(id)?;
        tracing::trace!(target: targets::SCENE, ?id, descendant_count = descendants.len(), "destroying subtree");

        if let Some(parent_id) = self.nodes.get(id).and_then(|d| d.parent) {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.retain(|&child| child != id);
            }
        }

        for child in descendants {
            self.nodes.remove(child);
        }
        self.nodes.remove(id);
        Ok(())
    }

    fn collect_descendants(&self, id: NodeId) -> SceneResult<Vec<NodeId>> {
        let mut result = Vec::new();
        self.collect_descendants_recursive(id, &mut result)?;
        Ok(result)
    }

    fn collect_descendants_recursive(&self, id: NodeId, result: &mut Vec<NodeId>) -> SceneResult<()> {
        let data = self.nodes.get(id).ok_or(SceneError::InvalidNode)?;
        for &child in &data.children {
            self.collect_descendants_recursive(child, result)?;
            result.push(child);
        }
        Ok(())
    }

    /// Whether the node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Move a node under a new parent, appended after existing children.
    ///
    /// `None` makes the node a root.
    pub fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> SceneResult<()> {
        if !self.nodes.contains_key(id) {
            return Err(SceneError::InvalidNode);
        }
        if let Some(parent_id) = new_parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(SceneError::InvalidNode);
            }
            if self.is_ancestor_of(id, parent_id) {
                return Err(SceneError::CircularParentage);
            }
        }

        if let Some(old_parent) = self.nodes.get(id).and_then(|d| d.parent) {
            if let Some(parent) = self.nodes.get_mut(old_parent) {
                parent.children.retain(|&child| child != id);
            }
        }
        if let Some(data) = self.nodes.get_mut(id) {
            data.parent = new_parent;
        }
        if let Some(parent_id) = new_parent {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.push(id);
            }
        }
        Ok(())
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(current_id) = current {
            if current_id == ancestor {
                return true;
            }
            current = self.nodes.get(current_id).and_then(|d| d.parent);
        }
        false
    }

    /// The node's parent.
    pub fn parent(&self, id: NodeId) -> SceneResult<Option<NodeId>> {
        self.nodes
            .get(id)
            .map(|d| d.parent)
            .ok_or(SceneError::InvalidNode)
    }

    /// The node's children in order.
    pub fn children(&self, id: NodeId) -> SceneResult<&[NodeId]> {
        self.nodes
            .get(id)
            .map(|d| d.children.as_slice())
            .ok_or(SceneError::InvalidNode)
    }

    /// The node's name.
    pub fn name(&self, id: NodeId) -> SceneResult<&str> {
        self.nodes
            .get(id)
            .map(|d| d.name.as_str())
            .ok_or(SceneError::InvalidNode)
    }

    /// Attach a view to a node, replacing any view of the same type.
    pub fn attach_view<VM: ViewModel>(&mut self, id: NodeId, view: Arc<View<VM>>) -> SceneResult<()> {
        let data = self.nodes.get_mut(id).ok_or(SceneError::InvalidNode)?;
        tracing::trace!(target: targets::SCENE, ?id, view = %view.id(), "attached view");
        data.components.insert(TypeId::of::<View<VM>>(), view);
        Ok(())
    }

    /// Detach and return the view of the given type.
    pub fn detach_view<VM: ViewModel>(&mut self, id: NodeId) -> SceneResult<Option<Arc<View<VM>>>> {
        let data = self.nodes.get_mut(id).ok_or(SceneError::InvalidNode)?;
        Ok(data
            .components
            .remove(&TypeId::of::<View<VM>>())
            .and_then(|component| component.downcast::<View<VM>>().ok()))
    }

    /// The view of the given type attached to a node.
    pub fn view<VM: ViewModel>(&self, id: NodeId) -> SceneResult<Option<Arc<View<VM>>>> {
        let data = self.nodes.get(id).ok_or(SceneError::InvalidNode)?;
        Ok(data
            .components
            .get(&TypeId::of::<View<VM>>())
            .cloned()
            .and_then(|component| component.downcast::<View<VM>>().ok()))
    }

    /// Number of components attached to a node.
    pub fn component_count(&self, id: NodeId) -> SceneResult<usize> {
        self.nodes
            .get(id)
            .map(|d| d.components.len())
            .ok_or(SceneError::InvalidNode)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes without a parent.
    pub fn root_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, data)| data.parent.is_none())
            .map(|(id, _)| id)
    }

    fn component(&self, id: NodeId, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.nodes.get(id)?.components.get(&type_id).cloned()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe [`SceneGraph`].
///
/// Reads take the shared lock and return owned data; edits take the
/// exclusive lock for one call.
#[derive(Default)]
pub struct SharedSceneGraph {
    inner: RwLock<SceneGraph>,
}

impl SharedSceneGraph {
    /// Create an empty shared scene graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root node.
    pub fn create_node(&self, name: impl Into<String>) -> NodeId {
        self.inner.write().create_node(name)
    }

    /// Create a child node.
    pub fn create_child(&self, parent: NodeId, name: impl Into<String>) -> SceneResult<NodeId> {
        self.inner.write().create_child(parent, name)
    }

    /// Destroy a node and its descendants.
    pub fn destroy(&self, id: NodeId) -> SceneResult<()> {
        self.inner.write().destroy(id)
    }

    /// Reparent a node.
    pub fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> SceneResult<()> {
        self.inner.write().set_parent(id, parent)
    }

    /// Node name (owned).
    pub fn name(&self, id: NodeId) -> SceneResult<String> {
        self.inner.read().name(id).map(str::to_owned)
    }

    /// Attach a view to a node.
    pub fn attach_view<VM: ViewModel>(&self, id: NodeId, view: Arc<View<VM>>) -> SceneResult<()> {
        self.inner.write().attach_view(id, view)
    }

    /// Detach a view from a node.
    pub fn detach_view<VM: ViewModel>(&self, id: NodeId) -> SceneResult<Option<Arc<View<VM>>>> {
        self.inner.write().detach_view::<VM>(id)
    }

    /// The view attached to a node.
    pub fn view<VM: ViewModel>(&self, id: NodeId) -> SceneResult<Option<Arc<View<VM>>>> {
        self.inner.read().view::<VM>(id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.read().node_count()
    }

    /// Root nodes.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.inner.read().root_nodes().collect()
    }

    /// Run a closure with the read lock held.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SceneGraph) -> R,
    {
        f(&self.inner.read())
    }
}

impl SceneTree for SharedSceneGraph {
    fn contains(&self, node: NodeId) -> bool {
        self.inner.read().contains(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.read().parent(node).ok().flatten()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .read()
            .children(node)
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    fn child_count(&self, node: NodeId) -> usize {
        self.inner.read().children(node).map_or(0, <[NodeId]>::len)
    }

    fn component(&self, node: NodeId, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.read().component(node, type_id)
    }
}

static_assertions::assert_impl_all!(SharedSceneGraph: Send, Sync);
