//! Instance providers.
//!
//! The coordinator never constructs view-models itself; it asks a
//! [`Provider`] to resolve one whenever a view needs a fresh instance.
//! Closures returning `Result<VM, ProviderError>` are providers, and
//! [`Container`] offers a small type-keyed factory table for wiring
//! applications and tests.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::ProviderError;
use crate::logging::targets;

/// Something that can produce fresh instances of `VM`.
///
/// Resolution may fail; the coordinator propagates the error unchanged and
/// leaves its state untouched.
pub trait Provider<VM> {
    /// Produce a new instance.
    fn resolve(&self) -> Result<VM, ProviderError>;
}

impl<VM, F> Provider<VM> for F
where
    F: Fn() -> Result<VM, ProviderError>,
{
    fn resolve(&self) -> Result<VM, ProviderError> {
        self()
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Any + Send>, ProviderError> + Send + Sync>;

/// A type-keyed table of factories.
///
/// Registering a factory for a type replaces any previous one.
#[derive(Default)]
pub struct Container {
    factories: RwLock<HashMap<TypeId, Factory>>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an infallible factory for `T`.
    pub fn register<T, F>(&self, factory: F)
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_fallible(move || Ok(factory()));
    }

    /// Register a factory for `T` that may fail.
    pub fn register_fallible<T, F>(&self, factory: F)
    where
        T: Send + 'static,
        F: Fn() -> Result<T, ProviderError> + Send + Sync + 'static,
    {
        let erased: Factory = Box::new(move || {
            factory().map(|value| Box::new(value) as Box<dyn Any + Send>)
        });
        self.factories.write().insert(TypeId::of::<T>(), erased);
        tracing::trace!(target: targets::PROVIDER, type_name = type_name::<T>(), "registered factory");
    }

    /// Whether a factory is registered for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.factories.read().contains_key(&TypeId::of::<T>())
    }

    /// Resolve a fresh `T`.
    pub fn resolve<T: Send + 'static>(&self) -> Result<T, ProviderError> {
        let factories = self.factories.read();
        let factory = factories
            .get(&TypeId::of::<T>())
            .ok_or(ProviderError::NotRegistered(type_name::<T>()))?;
        let boxed = factory()?;
        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| ProviderError::Failed(format!("factory produced the wrong type for {}", type_name::<T>())))
    }
}

impl<VM: Send + 'static> Provider<VM> for Container {
    fn resolve(&self) -> Result<VM, ProviderError> {
        Container::resolve::<VM>(self)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("factories", &self.factories.read().len())
            .finish()
    }
}
