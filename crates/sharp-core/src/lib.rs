//! Core systems for SHARP.
//!
//! SHARP binds presentation components ("views") to the state objects behind
//! them ("view-models") inside a tree-shaped scene, and lets views share one
//! view-model by naming a common context.
//!
//! - **Coordinator**: per-type registry of views, view-models, and contexts
//!   with active/orphan lifecycle tracking
//! - **Registry**: lazily created coordinators keyed by view-model type
//! - **Discovery**: immutable queries filtering view-models by context,
//!   state, scene position, and predicates
//! - **Scene**: the tree abstraction queries walk, plus an in-memory graph
//! - **Providers**: how fresh view-models are resolved
//!
//! # Sharing a View-Model Through a Context
//!
//! ```
//! use std::sync::Arc;
//! use sharp_core::{CoordinatorRegistry, Discovery, ProviderError, View, ViewModel};
//!
//! struct Inventory {
//!     slots: usize,
//! }
//! impl ViewModel for Inventory {}
//!
//! let registry = Arc::new(CoordinatorRegistry::new());
//! let coordinator = registry.for_view_model::<Inventory>();
//! let provider = || Ok::<_, ProviderError>(Inventory { slots: 12 });
//!
//! let grid = View::with_context("grid", "player");
//! let summary = View::with_context("summary", "player");
//! let a = coordinator.get(&grid, Some("player"), &provider).unwrap();
//! let b = coordinator.get(&summary, Some("player"), &provider).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! let discovery = Discovery::new(registry);
//! let found = discovery
//!     .for_view_model::<Inventory>()
//!     .in_context("player")
//!     .single()
//!     .unwrap();
//! assert_eq!(found.slots, 12);
//! ```
//!
//! # Spatial Queries
//!
//! ```
//! use std::sync::Arc;
//! use sharp_core::{Coordinator, DiscoveryQuery, ProviderError, SharedSceneGraph, View, ViewModel};
//!
//! struct Label;
//! impl ViewModel for Label {}
//!
//! let scene = Arc::new(SharedSceneGraph::new());
//! let root = scene.create_node("root");
//! let row = scene.create_child(root, "row").unwrap();
//!
//! let coordinator = Arc::new(Coordinator::<Label>::new());
//! let view = View::new("label");
//! coordinator.get(&view, None, &|| Ok::<_, ProviderError>(Label)).unwrap();
//! scene.attach_view(row, view).unwrap();
//!
//! let query = DiscoveryQuery::new(coordinator);
//! assert_eq!(query.children_of(scene.clone(), root).count(), 1);
//! assert_eq!(query.descendants_at_depth(scene, root, 2).count(), 0);
//! ```

mod bimap;
mod coordinator;
pub mod discovery;
mod error;
pub mod logging;
mod provider;
mod registry;
pub mod scene;
mod view;

pub use bimap::{BiMap, BiSetMap};
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorCounts, CoordinatorResult, DEFAULT_TRANSIENT_PREFIX,
};
pub use discovery::{Discovery, DiscoveryQuery, DiscoveryResult};
pub use error::{
    CoordinatorError, DiscoveryError, MapError, ProviderError, RegistryError, Result, SceneError,
    SharpError,
};
pub use logging::{CoordinatorDebug, PerfSpan, SceneTreeDebug, TreeFormatOptions, TreeStyle};
pub use provider::{Container, Provider};
pub use registry::{CoordinatorRegistry, RegistryResult};
pub use scene::{NodeId, SceneGraph, SceneResult, SceneTree, SharedSceneGraph, view_of};
pub use view::{View, ViewId, ViewModel};
