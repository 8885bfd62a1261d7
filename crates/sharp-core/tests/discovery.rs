//! Tests for discovery queries over coordinators and scene graphs.

use std::sync::Arc;

use sharp_core::{
    Coordinator, CoordinatorRegistry, Discovery, DiscoveryError, NodeId, ProviderError,
    SceneTree, SharedSceneGraph, View, ViewModel,
};

#[derive(Debug)]
struct Widget {
    label: &'static str,
}

impl ViewModel for Widget {}

#[derive(Debug)]
struct Tooltip;

impl ViewModel for Tooltip {}

struct Fixture {
    scene: Arc<SharedSceneGraph>,
    coordinator: Arc<Coordinator<Widget>>,
    discovery: Discovery,
    root: NodeId,
    header: NodeId,
    body: NodeId,
    list: NodeId,
    item: NodeId,
    footer: NodeId,
}

impl Fixture {
    fn tree(&self) -> Arc<dyn SceneTree> {
        self.scene.clone()
    }
}

/// Builds:
///
/// ```text
/// root (widget "root")
///  |- header (context "chrome")
///  |- body (widget "body")
///  |   |- list (widget "list")
///  |       |- item (widget "item")
///  |- footer (context "chrome")
/// ```
///
/// Header and footer share the "chrome" widget, which is labelled "header"
/// because the header view resolved it.
fn fixture() -> Fixture {
    let scene = Arc::new(SharedSceneGraph::new());
    let root = scene.create_node("root");
    let header = scene.create_child(root, "header").unwrap();
    let body = scene.create_child(root, "body").unwrap();
    let list = scene.create_child(body, "list").unwrap();
    let item = scene.create_child(list, "item").unwrap();
    let footer = scene.create_child(root, "footer").unwrap();

    let registry = Arc::new(CoordinatorRegistry::new());
    let coordinator = registry.for_view_model::<Widget>();

    let bind = |node: NodeId, label: &'static str, context: Option<&str>| {
        let view = View::new(label);
        coordinator
            .get(&view, context, &|| Ok::<_, ProviderError>(Widget { label }))
            .unwrap();
        scene.attach_view(node, view).unwrap();
    };
    bind(root, "root", None);
    bind(header, "header", Some("chrome"));
    bind(body, "body", None);
    bind(list, "list", None);
    bind(item, "item", None);
    bind(footer, "footer", Some("chrome"));

    Fixture {
        scene,
        coordinator,
        discovery: Discovery::new(registry),
        root,
        header,
        body,
        list,
        item,
        footer,
    }
}

fn labels(mut widgets: Vec<Arc<Widget>>) -> Vec<&'static str> {
    widgets.sort_by_key(|w| w.label);
    widgets.iter().map(|w| w.label).collect()
}

#[test]
fn test_descendants_within_depth_two() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>().descendants_of(f.tree(), f.root, Some(2));
    assert_eq!(labels(query.all()), vec!["body", "header", "list"]);
}

#[test]
fn test_descendants_unlimited_and_exact() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>();

    let everything = query.descendants_of(f.tree(), f.root, None);
    assert_eq!(labels(everything.all()), vec!["body", "header", "item", "list"]);

    let exact = query.descendants_at_depth(f.tree(), f.root, 3);
    assert_eq!(labels(exact.all()), vec!["item"]);
}

#[test]
fn test_children_and_siblings() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>();

    assert_eq!(labels(query.children_of(f.tree(), f.body).all()), vec!["list"]);
    assert_eq!(labels(query.siblings_of(f.tree(), f.body).all()), vec!["header"]);
    assert_eq!(
        labels(query.siblings_of_including_self(f.tree(), f.body).all()),
        vec!["body", "header"]
    );
    assert!(!query.siblings_of(f.tree(), f.root).any());
}

#[test]
fn test_spatial_constraint_replaces_previous() {
    let f = fixture();
    let query = f
        .discovery
        .for_view_model::<Widget>()
        .children_of(f.tree(), f.root)
        .children_of(f.tree(), f.list);
    assert_eq!(labels(query.all()), vec!["item"]);
}

#[test]
fn test_stages_combine() {
    let f = fixture();
    let query = f
        .discovery
        .for_view_model::<Widget>()
        .in_any_context()
        .children_of(f.tree(), f.root)
        .filter(|w| w.label != "root");

    let found = query.single().unwrap();
    assert_eq!(found.label, "header");
    assert!(Arc::ptr_eq(&found, &f.coordinator.view_model("chrome").unwrap()));
}

#[test]
fn test_shared_context_view_model_found_once() {
    let f = fixture();
    let query = f
        .discovery
        .for_view_model::<Widget>()
        .siblings_of_including_self(f.tree(), f.header)
        .in_context("chrome");
    assert_eq!(query.count(), 1);
}

#[test]
fn test_nodes_without_matching_views_never_match() {
    let f = fixture();
    let empty = f.scene.create_child(f.root, "spacer").unwrap();
    let other = f.scene.create_child(f.root, "tip").unwrap();
    f.scene.attach_view(other, View::<Tooltip>::new("tip")).unwrap();
    // A view of the right type that was never bound.
    let unbound = f.scene.create_child(f.root, "unbound").unwrap();
    f.scene.attach_view(unbound, View::<Widget>::new("unbound")).unwrap();

    let query = f.discovery.for_view_model::<Widget>();
    assert!(!query.children_of(f.tree(), empty).any());
    assert_eq!(labels(query.children_of(f.tree(), f.root).all()), vec!["body", "header"]);
}

#[test]
fn test_queries_see_later_mutations() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>().descendants_of(f.tree(), f.body, None);
    assert_eq!(query.count(), 2);

    f.scene.destroy(f.item).unwrap();
    assert_eq!(labels(query.all()), vec!["list"]);

    let list_view = f.scene.view::<Widget>(f.list).unwrap().unwrap();
    f.coordinator.unregister_view(&list_view, None);
    // Still bound through the scene, but now orphaned.
    assert_eq!(query.count(), 1);
    assert!(!query.that_are_active().any());
    assert_eq!(query.that_are_orphaned().count(), 1);
}

#[test]
fn test_reparenting_moves_results() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>();

    f.scene.set_parent(f.item, Some(f.footer)).unwrap();
    assert_eq!(labels(query.children_of(f.tree(), f.footer).all()), vec!["item"]);
    assert!(!query.children_of(f.tree(), f.list).any());
}

#[test]
fn test_single_reports_match_count() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>();

    assert_eq!(query.without_context().single().unwrap_err(), DiscoveryError::MultipleMatches(4));
    assert_eq!(query.in_context("missing").single().unwrap_err(), DiscoveryError::NoMatch);
    assert_eq!(query.in_context("chrome").filter(|_| true).count(), 1);
}

#[test]
fn test_disposed_registry_yields_empty_queries() {
    let f = fixture();
    let query = f.discovery.for_view_model::<Widget>();
    assert_eq!(query.count(), 5);

    f.discovery.registry().dispose();
    assert_eq!(query.count(), 0);
    assert!(f.coordinator.is_disposed());
    // A fresh coordinator is created on demand.
    assert_eq!(f.discovery.for_view_model::<Widget>().count(), 0);
}
