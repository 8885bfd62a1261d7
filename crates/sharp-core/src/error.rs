//! Error types for SHARP.
//!
//! Each subsystem has its own error enum; [`SharpError`] aggregates them for
//! callers that drive several subsystems at once.

use crate::view::ViewId;

/// Errors raised by the bidirectional maps in [`crate::bimap`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The key or the value is already present on one side of a bijection.
    #[error("duplicate key or value")]
    DuplicateKeyOrValue,
    /// The value already belongs to another key's set.
    #[error("value is already owned by another key")]
    ValueAlreadyOwned,
}

/// Errors raised by an instance provider while resolving a view-model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No factory is registered for the requested type.
    #[error("no factory registered for {0}")]
    NotRegistered(&'static str),
    /// The factory ran but could not produce an instance.
    #[error("failed to resolve instance: {0}")]
    Failed(String),
}

/// Errors raised by [`crate::Coordinator`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// The view is registered under a different context than the one requested.
    #[error("{view} is already registered with context '{current}', cannot bind to '{requested}'")]
    AlreadyBound {
        /// The conflicting view.
        view: ViewId,
        /// The context the view currently belongs to.
        current: String,
        /// The context that was requested.
        requested: String,
    },
    /// The view already owns a contextless view-model.
    #[error("{view} is already paired with a view-model without context")]
    AlreadyPaired {
        /// The conflicting view.
        view: ViewId,
    },
    /// A contextless view-model has no paired view to migrate.
    #[error("cannot find a view associated with view-model {0}")]
    ViewModelNotTracked(&'static str),
    /// The view has no current view-model and the context has none either.
    #[error("no view-model bound for context '{0}'")]
    ContextNotFound(String),
    /// The coordinator was disposed and no longer accepts registrations.
    #[error("coordinator for {0} has been disposed")]
    Disposed(&'static str),
    /// The instance provider failed; nothing was registered.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Internal bookkeeping rejected an insertion.
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Errors raised by [`crate::CoordinatorRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No coordinator was ever created for the type.
    #[error("no coordinator for {0}")]
    NoCoordinator(&'static str),
}

/// Errors raised while building or executing a discovery query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// `single()` found nothing.
    #[error("query matched no view-models")]
    NoMatch,
    /// `single()` found more than one result.
    #[error("query matched {0} view-models, expected exactly one")]
    MultipleMatches(usize),
    /// `filter_all`/`filter_any` was given no predicates.
    #[error("at least one predicate must be provided")]
    EmptyPredicateSet,
}

/// Errors raised by the scene graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// The node id is invalid or the node was destroyed.
    #[error("invalid or destroyed node id")]
    InvalidNode,
    /// Attempted to make a node its own ancestor.
    #[error("cannot set a node as its own parent or ancestor")]
    CircularParentage,
}

/// The aggregate error type for SHARP operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SharpError {
    /// Coordinator error.
    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    /// Discovery error.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    /// Scene graph error.
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
    /// Provider error surfaced outside a coordinator call.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// A specialized Result type for SHARP operations.
pub type Result<T> = std::result::Result<T, SharpError>;
