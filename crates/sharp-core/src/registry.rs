//! Per-type coordinator registry.
//!
//! [`CoordinatorRegistry`] maps each view-model type to its
//! [`Coordinator`]. Coordinators are created lazily on first access and live
//! until cleared or until the registry is disposed. The registry is an
//! ordinary value: create one per application or session and share it with
//! whatever needs coordination or discovery.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sharp_core::{CoordinatorRegistry, View, ViewModel, ProviderError};
//!
//! struct Counter;
//! impl ViewModel for Counter {}
//!
//! let registry = CoordinatorRegistry::new();
//! let coordinator = registry.for_view_model::<Counter>();
//!
//! let view = View::<Counter>::with_context("counter", "main");
//! let vm = coordinator
//!     .get(&view, Some("main"), &|| Ok::<_, ProviderError>(Counter))
//!     .unwrap();
//!
//! assert!(Arc::ptr_eq(&vm, &registry.for_view_model::<Counter>().view_model("main").unwrap()));
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::error::RegistryError;
use crate::logging::targets;
use crate::view::ViewModel;

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Type-erased access to a coordinator for registry-wide operations.
trait ErasedCoordinator: Send + Sync {
    fn dispose(&self);
    fn view_model_type(&self) -> &'static str;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<VM: ViewModel> ErasedCoordinator for Coordinator<VM> {
    fn dispose(&self) {
        Coordinator::dispose(self);
    }

    fn view_model_type(&self) -> &'static str {
        type_name::<VM>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Map from view-model type to its coordinator.
pub struct CoordinatorRegistry {
    config: CoordinatorConfig,
    coordinators: RwLock<HashMap<TypeId, Arc<dyn ErasedCoordinator>>>,
}

impl CoordinatorRegistry {
    /// Create an empty registry whose coordinators use the default configuration.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Create an empty registry whose coordinators share `config`.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self {
            config,
            coordinators: RwLock::new(HashMap::new()),
        }
    }

    /// The configuration handed to new coordinators.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The coordinator for `VM`, created on first access.
    pub fn for_view_model<VM: ViewModel>(&self) -> Arc<Coordinator<VM>> {
        if let Some(existing) = self.lookup::<VM>() {
            return existing;
        }

        let mut coordinators = self.coordinators.write();
        // Another caller may have won the race between the two locks.
        let entry = coordinators.entry(TypeId::of::<VM>()).or_insert_with(|| {
            tracing::debug!(target: targets::REGISTRY, view_model = type_name::<VM>(), "creating coordinator");
            Arc::new(Coordinator::<VM>::with_config(self.config.clone())) as Arc<dyn ErasedCoordinator>
        });
        if let Some(coordinator) = downcast::<VM>(Arc::clone(entry)) {
            return coordinator;
        }

        tracing::error!(
            target: targets::REGISTRY,
            view_model = type_name::<VM>(),
            found = entry.view_model_type(),
            "registry entry holds a coordinator of another type, replacing it"
        );
        let coordinator = Arc::new(Coordinator::<VM>::with_config(self.config.clone()));
        *entry = Arc::clone(&coordinator) as Arc<dyn ErasedCoordinator>;
        coordinator
    }

    /// The coordinator for `VM` if one exists.
    pub fn get<VM: ViewModel>(&self) -> Option<Arc<Coordinator<VM>>> {
        self.lookup::<VM>()
    }

    /// Whether a coordinator exists for `VM`.
    pub fn contains<VM: ViewModel>(&self) -> bool {
        self.coordinators.read().contains_key(&TypeId::of::<VM>())
    }

    /// Number of coordinators.
    pub fn len(&self) -> usize {
        self.coordinators.read().len()
    }

    /// Whether the registry holds no coordinators.
    pub fn is_empty(&self) -> bool {
        self.coordinators.read().is_empty()
    }

    /// Remove the coordinator for `VM` without disposing it.
    ///
    /// Holders of the coordinator keep using it; the next
    /// [`for_view_model`](Self::for_view_model) call creates a fresh one.
    pub fn clear<VM: ViewModel>(&self) -> RegistryResult<()> {
        self.coordinators
            .write()
            .remove(&TypeId::of::<VM>())
            .map(|_| {
                tracing::debug!(target: targets::REGISTRY, view_model = type_name::<VM>(), "removed coordinator");
            })
            .ok_or(RegistryError::NoCoordinator(type_name::<VM>()))
    }

    /// Dispose the coordinator for `VM` and remove it.
    pub fn clear_everything<VM: ViewModel>(&self) -> RegistryResult<()> {
        let removed = self
            .coordinators
            .write()
            .remove(&TypeId::of::<VM>())
            .ok_or(RegistryError::NoCoordinator(type_name::<VM>()))?;
        // Dispose outside the registry lock.
        removed.dispose();
        Ok(())
    }

    /// Dispose every coordinator and empty the registry.
    pub fn dispose(&self) {
        let drained: Vec<_> = self.coordinators.write().drain().map(|(_, c)| c).collect();
        tracing::info!(target: targets::REGISTRY, coordinators = drained.len(), "disposing registry");
        for coordinator in drained {
            tracing::trace!(target: targets::REGISTRY, view_model = coordinator.view_model_type(), "disposing coordinator");
            coordinator.dispose();
        }
    }

    /// Type names of the view-models with a coordinator.
    pub fn view_model_types(&self) -> Vec<&'static str> {
        self.coordinators
            .read()
            .values()
            .map(|c| c.view_model_type())
            .collect()
    }

    fn lookup<VM: ViewModel>(&self) -> Option<Arc<Coordinator<VM>>> {
        let entry = self.coordinators.read().get(&TypeId::of::<VM>()).cloned()?;
        downcast::<VM>(entry)
    }
}

fn downcast<VM: ViewModel>(erased: Arc<dyn ErasedCoordinator>) -> Option<Arc<Coordinator<VM>>> {
    erased.into_any().downcast::<Coordinator<VM>>().ok()
}

impl Default for CoordinatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CoordinatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorRegistry")
            .field("view_models", &self.view_model_types())
            .finish()
    }
}

static_assertions::assert_impl_all!(CoordinatorRegistry: Send, Sync);
