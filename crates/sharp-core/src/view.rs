//! Views, view-models, and reference identity.
//!
//! A [`View`] is the handle a presentation component holds: it carries the
//! context it asked for and a slot with the view-model the coordinator bound
//! to it. Both views and view-models are compared by reference, never by
//! value; [`ByRef`] provides that identity for hash-based bookkeeping.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// State owned by one or more views.
///
/// Implementors are stored behind `Arc` and compared by address. The
/// coordinator never calls [`dispose`](Self::dispose); releasing a view-model's
/// resources belongs to whoever owns it.
pub trait ViewModel: Send + Sync + 'static {
    /// Context that newly created views of this type ask for by default.
    fn default_context() -> Option<&'static str>
    where
        Self: Sized,
    {
        None
    }

    /// Release resources held by the view-model.
    fn dispose(&self) {}
}

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for a view, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        Self(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// A presentation component's handle into the coordinator.
///
/// Views are shared as `Arc<View<VM>>`; the coordinator keeps clones of the
/// `Arc` while the view is registered and updates the context and view-model
/// slots as bindings change.
pub struct View<VM> {
    id: ViewId,
    name: String,
    context: RwLock<Option<String>>,
    view_model: RwLock<Option<Arc<VM>>>,
}

impl<VM: ViewModel> View<VM> {
    /// Create a view that asks for the view-model type's default context.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), VM::default_context().map(str::to_owned))
    }

    /// Create a view that asks for a specific context.
    ///
    /// An empty string means "no context".
    pub fn with_context(name: impl Into<String>, context: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), non_empty(context.into()))
    }

    /// Create a view that asks for no context, ignoring the type's default.
    pub fn without_context(name: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), None)
    }

    fn build(name: String, context: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            id: ViewId::next(),
            name,
            context: RwLock::new(context),
            view_model: RwLock::new(None),
        })
    }
}

impl<VM> View<VM> {
    /// The view's identifier.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// The view's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The context this view belongs to, if any.
    pub fn context(&self) -> Option<String> {
        self.context.read().clone()
    }

    /// Set the context. Empty strings are stored as "no context".
    pub fn set_context(&self, context: Option<String>) {
        *self.context.write() = context.and_then(non_empty);
    }

    /// The view-model currently bound to this view.
    pub fn view_model(&self) -> Option<Arc<VM>> {
        self.view_model.read().clone()
    }

    /// Replace the bound view-model.
    pub fn set_view_model(&self, view_model: Option<Arc<VM>>) {
        *self.view_model.write() = view_model;
    }

    /// Whether `view_model` is the instance bound to this view.
    pub fn is_bound_to(&self, view_model: &Arc<VM>) -> bool {
        self.view_model
            .read()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, view_model))
    }
}

impl<VM> fmt::Debug for View<VM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("context", &*self.context.read())
            .field("bound", &self.view_model.read().is_some())
            .finish()
    }
}

/// An `Arc` compared and hashed by address.
pub(crate) struct ByRef<T>(pub(crate) Arc<T>);

impl<T> ByRef<T> {
    pub(crate) fn new(value: &Arc<T>) -> Self {
        Self(Arc::clone(value))
    }

    pub(crate) fn arc(&self) -> Arc<T> {
        Arc::clone(&self.0)
    }
}

impl<T> Clone for ByRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for ByRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for ByRef<T> {}

impl<T> Hash for ByRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl<T> fmt::Debug for ByRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByRef({:p})", Arc::as_ptr(&self.0))
    }
}

pub(crate) fn non_empty(context: String) -> Option<String> {
    if context.is_empty() { None } else { Some(context) }
}
