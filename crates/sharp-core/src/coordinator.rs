//! The view/view-model/context coordinator.
//!
//! A [`Coordinator<VM>`] owns every binding between views and view-models of
//! one type. It tracks five structures that move together:
//!
//! - the active set (view-models bound to at least one view),
//! - the orphan set (view-models whose views went away),
//! - the contextless pairing, a bijection between a view and its private
//!   view-model,
//! - the context membership map, context name to the set of views in it,
//! - the context binding, a bijection between context names and view-models.
//!
//! A view-model is active exactly when it appears in the contextless pairing
//! or the context binding, and orphaned when it appears in neither. A context
//! with no views left is deleted on the spot and its view-model is orphaned.
//!
//! # Locking
//!
//! All state sits behind one `RwLock`. Read operations take a shared
//! recursive lock and return owned snapshots, so callers can iterate without
//! holding anything. Mutations are serialized through the upgradable lock for
//! their whole run: validation and the [`Provider`] call happen under it, then
//! it is upgraded to exclusive for the actual update. Shared reads stay
//! possible while a provider runs, including reads made by the provider
//! itself on the same thread. A provider must not mutate the coordinator that
//! is calling it.
//!
//! # Failure atomicity
//!
//! Mutations validate and resolve new instances before touching any
//! structure. A rejected call or a failed provider leaves the coordinator
//! exactly as it was.

use std::any::type_name;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use uuid::Uuid;

use crate::bimap::{BiMap, BiSetMap};
use crate::error::CoordinatorError;
use crate::logging::targets;
use crate::provider::Provider;
use crate::view::{ByRef, View, ViewModel, non_empty};

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;

/// Default prefix for synthesized transient contexts.
pub const DEFAULT_TRANSIENT_PREFIX: &str = "__TransientContext__";

/// Configuration shared by coordinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Prefix for context names synthesized by [`Coordinator::coordinate_rebind`].
    pub transient_context_prefix: String,
    /// Emit a debug event for each view-model handed out by `get`.
    pub log_acquisitions: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            transient_context_prefix: DEFAULT_TRANSIENT_PREFIX.to_string(),
            log_acquisitions: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration with a custom transient context prefix.
    pub fn with_transient_prefix(prefix: impl Into<String>) -> Self {
        Self {
            transient_context_prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Enable or disable acquisition logging.
    pub fn log_acquisitions(mut self, enabled: bool) -> Self {
        self.log_acquisitions = enabled;
        self
    }

    /// Whether a context name was synthesized with this configuration.
    pub fn is_transient(&self, context: &str) -> bool {
        context.starts_with(&self.transient_context_prefix)
    }
}

/// Sizes of the coordinator's structures at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorCounts {
    /// Active view-models.
    pub active: usize,
    /// Orphaned view-models.
    pub orphan: usize,
    /// Live contexts.
    pub contexts: usize,
    /// Views registered under a context.
    pub views_with_context: usize,
    /// Views paired without a context.
    pub views_without_context: usize,
}

struct CoordinatorState<VM> {
    active: HashSet<ByRef<VM>>,
    orphan: HashSet<ByRef<VM>>,
    contextless: BiMap<ByRef<View<VM>>, ByRef<VM>>,
    context_views: BiSetMap<String, ByRef<View<VM>>>,
    context_view_models: BiMap<String, ByRef<VM>>,
    disposed: bool,
}

impl<VM> CoordinatorState<VM> {
    fn new() -> Self {
        Self {
            active: HashSet::new(),
            orphan: HashSet::new(),
            contextless: BiMap::new(),
            context_views: BiSetMap::new(),
            context_view_models: BiMap::new(),
            disposed: false,
        }
    }

    /// Reject a view that cannot take a new contextless view-model.
    fn check_free(&self, view: &Arc<View<VM>>) -> CoordinatorResult<()> {
        let key = ByRef::new(view);
        if let Some(current) = self.context_views.get_key(&key) {
            return Err(CoordinatorError::AlreadyBound {
                view: view.id(),
                current: current.clone(),
                requested: String::new(),
            });
        }
        if self.contextless.contains_key(&key) {
            return Err(CoordinatorError::AlreadyPaired { view: view.id() });
        }
        Ok(())
    }

    /// Reject a view that cannot join `context`.
    ///
    /// Joining the context the view already belongs to is allowed.
    fn check_can_join(&self, view: &Arc<View<VM>>, context: &str) -> CoordinatorResult<()> {
        let key = ByRef::new(view);
        if let Some(current) = self.context_views.get_key(&key) {
            if current != context {
                return Err(CoordinatorError::AlreadyBound {
                    view: view.id(),
                    current: current.clone(),
                    requested: context.to_string(),
                });
            }
        }
        if self.contextless.contains_key(&key) {
            return Err(CoordinatorError::AlreadyPaired { view: view.id() });
        }
        Ok(())
    }

    fn join_context(&mut self, view: &Arc<View<VM>>, context: &str) {
        // Already a member when the view repeats a request for its own context.
        self.context_views.try_insert(context.to_string(), ByRef::new(view));
        view.set_context(Some(context.to_string()));
    }

    fn orphan(&mut self, view_model: &ByRef<VM>) {
        if !self.active.remove(view_model) {
            return;
        }
        self.contextless.remove_by_value(view_model);
        self.orphan.insert(view_model.clone());
    }

    /// Remove a view from whichever structure holds it, orphaning view-models
    /// that lose their last view.
    fn detach(&mut self, view: &Arc<View<VM>>) -> bool {
        let key = ByRef::new(view);
        let mut detached = false;

        if let Some(context) = self.context_views.remove_by_value(&key) {
            detached = true;
            if !self.context_views.contains_key(&context) {
                if let Some(vm) = self.context_view_models.get_by_key(&context).cloned() {
                    self.orphan(&vm);
                }
                self.context_view_models.remove_by_key(&context);
                tracing::debug!(target: targets::COORDINATOR, %context, "context emptied");
            }
        }

        if let Some(vm) = self.contextless.get_by_key(&key).cloned() {
            detached = true;
            self.contextless.remove_by_key(&key);
            self.orphan(&vm);
        }

        detached
    }

    fn context_of(&self, view: &Arc<View<VM>>) -> Option<&String> {
        self.context_views.get_key(&ByRef::new(view))
    }

    fn clear(&mut self) {
        self.active.clear();
        self.orphan.clear();
        self.contextless.clear();
        self.context_views.clear();
        self.context_view_models.clear();
    }
}

/// What a rebind will do, decided before any structure changes.
enum Rebind<VM> {
    /// Nothing moves; the view keeps this view-model.
    Stay(Arc<VM>),
    /// The view leaves its current place and lands at `to`.
    Move {
        to: Option<String>,
        fresh: Option<Arc<VM>>,
    },
}

/// Per-type registry of view/view-model bindings.
///
/// See the [module documentation](self) for the invariants it maintains.
pub struct Coordinator<VM> {
    config: CoordinatorConfig,
    state: RwLock<CoordinatorState<VM>>,
}

impl<VM: ViewModel> Coordinator<VM> {
    /// Create an empty coordinator with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Create an empty coordinator.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        tracing::trace!(target: targets::COORDINATOR, view_model = type_name::<VM>(), "created coordinator");
        Self {
            config,
            state: RwLock::new(CoordinatorState::new()),
        }
    }

    /// The configuration this coordinator was built with.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Active view-models.
    pub fn active(&self) -> Vec<Arc<VM>> {
        self.state.read_recursive().active.iter().map(ByRef::arc).collect()
    }

    /// Orphaned view-models.
    pub fn orphans(&self) -> Vec<Arc<VM>> {
        self.state.read_recursive().orphan.iter().map(ByRef::arc).collect()
    }

    /// Active view-models followed by orphaned ones.
    pub fn all(&self) -> Vec<Arc<VM>> {
        let state = self.state.read_recursive();
        state
            .active
            .iter()
            .chain(state.orphan.iter())
            .map(ByRef::arc)
            .collect()
    }

    /// Views paired with a view-model outside any context.
    pub fn views_without_context(&self) -> Vec<Arc<View<VM>>> {
        self.state.read_recursive().contextless.keys().map(ByRef::arc).collect()
    }

    /// Views registered under some context.
    pub fn views_with_context(&self) -> Vec<Arc<View<VM>>> {
        self.state.read_recursive().context_views.values().map(ByRef::arc).collect()
    }

    /// View-models paired with a single view outside any context.
    pub fn view_models_without_context(&self) -> Vec<Arc<VM>> {
        self.state.read_recursive().contextless.values().map(ByRef::arc).collect()
    }

    /// View-models bound to a context.
    pub fn view_models_with_context(&self) -> Vec<Arc<VM>> {
        self.state
            .read_recursive()
            .context_view_models
            .values()
            .map(ByRef::arc)
            .collect()
    }

    /// View-models bound to a context whose name satisfies `matcher`.
    ///
    /// The matcher runs under the shared lock and must not mutate this
    /// coordinator.
    pub fn view_models_with_context_matching<F>(&self, matcher: F) -> Vec<Arc<VM>>
    where
        F: Fn(&str) -> bool,
    {
        self.state
            .read_recursive()
            .context_view_models
            .iter()
            .filter(|(context, _)| matcher(context.as_str()))
            .map(|(_, vm)| vm.arc())
            .collect()
    }

    /// The view-model bound to a context.
    pub fn view_model(&self, context: &str) -> Option<Arc<VM>> {
        self.state
            .read_recursive()
            .context_view_models
            .get_by_key(&context.to_string())
            .map(ByRef::arc)
    }

    /// The context a view is registered under.
    pub fn context_of_view(&self, view: &Arc<View<VM>>) -> Option<String> {
        self.state
            .read_recursive()
            .context_views
            .get_key(&ByRef::new(view))
            .cloned()
    }

    /// The context a view-model is bound to.
    pub fn context_of_view_model(&self, view_model: &Arc<VM>) -> Option<String> {
        self.state
            .read_recursive()
            .context_view_models
            .get_by_value(&ByRef::new(view_model))
            .cloned()
    }

    /// Names of all live contexts.
    pub fn all_contexts(&self) -> Vec<String> {
        self.state
            .read_recursive()
            .context_view_models
            .keys()
            .cloned()
            .collect()
    }

    /// Views currently bound to a view-model, through its context or its
    /// contextless pairing.
    pub fn views_for(&self, view_model: &Arc<VM>) -> Vec<Arc<View<VM>>> {
        let state = self.state.read_recursive();
        let key = ByRef::new(view_model);

        if let Some(view) = state.contextless.get_by_value(&key) {
            return vec![view.arc()];
        }
        state
            .context_view_models
            .get_by_value(&key)
            .and_then(|context| state.context_views.get_values(context))
            .map(|views| views.iter().map(ByRef::arc).collect())
            .unwrap_or_default()
    }

    /// Whether the view-model is active.
    pub fn is_active(&self, view_model: &Arc<VM>) -> bool {
        self.state.read_recursive().active.contains(&ByRef::new(view_model))
    }

    /// Whether the view-model is orphaned.
    pub fn is_orphaned(&self, view_model: &Arc<VM>) -> bool {
        self.state.read_recursive().orphan.contains(&ByRef::new(view_model))
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.state.read_recursive().disposed
    }

    /// Sizes of every tracked structure, taken under one lock.
    pub fn counts(&self) -> CoordinatorCounts {
        let state = self.state.read_recursive();
        CoordinatorCounts {
            active: state.active.len(),
            orphan: state.orphan.len(),
            contexts: state.context_view_models.len(),
            views_with_context: state.context_views.value_count(),
            views_without_context: state.contextless.len(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Acquire a view-model for `view`.
    ///
    /// - Without a context, a fresh view-model is resolved and paired with
    ///   the view alone.
    /// - With a context that already has a view-model, the view joins the
    ///   context and shares it.
    /// - With a new context, a fresh view-model is resolved and bound to it.
    ///
    /// The returned view-model is also stored in the view's slot, and the
    /// view's context field is updated.
    #[tracing::instrument(skip_all, target = "sharp_core::coordinator", level = "trace", fields(view = %view.id(), context = ?context))]
    pub fn get<P>(&self, view: &Arc<View<VM>>, context: Option<&str>, provider: &P) -> CoordinatorResult<Arc<VM>>
    where
        P: Provider<VM> + ?Sized,
    {
        let context = context.and_then(|c| non_empty(c.to_string()));

        let state = self.state.upgradable_read();
        self.ensure_live(&state)?;
        let fresh = self.resolve_for(&state, view, context.as_deref(), provider)?;
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        self.attach(&mut state, view, context.as_deref(), fresh)
    }

    /// Rebind `view` to `target`, a view-model this coordinator already tracks.
    ///
    /// When the target belongs to a context, the view moves into that
    /// context. When the target is a contextless view-model, its paired view
    /// and the target are first moved into a freshly named transient context,
    /// which the view then joins.
    #[tracing::instrument(skip_all, target = "sharp_core::coordinator", level = "trace", fields(view = %view.id()))]
    pub fn coordinate_rebind<P>(&self, view: &Arc<View<VM>>, target: &Arc<VM>, provider: &P) -> CoordinatorResult<Arc<VM>>
    where
        P: Provider<VM> + ?Sized,
    {
        let state = self.state.upgradable_read();
        self.ensure_live(&state)?;

        let view_key = ByRef::new(view);
        let target_key = ByRef::new(target);
        let from_context = state.context_views.get_key(&view_key).cloned();

        if let Some(to_context) = state.context_view_models.get_by_value(&target_key).cloned() {
            let plan = self.plan_rebind(&state, view, from_context.as_deref(), Some(&to_context), provider)?;
            return match plan {
                Rebind::Stay(vm) => Ok(vm),
                Rebind::Move { to, fresh } => {
                    let mut state = RwLockUpgradableReadGuard::upgrade(state);
                    self.relocate(&mut state, view, to.as_deref(), fresh)
                }
            };
        }

        let paired_view = state
            .contextless
            .get_by_value(&target_key)
            .cloned()
            .ok_or(CoordinatorError::ViewModelNotTracked(type_name::<VM>()))?;

        if paired_view == view_key {
            tracing::warn!(
                target: targets::COORDINATOR,
                view = %view.id(),
                "view is already bound to the target view-model, nothing to rebind"
            );
            return Ok(Arc::clone(target));
        }

        let transient = format!("{}{}", self.config.transient_context_prefix, Uuid::new_v4());
        tracing::debug!(target: targets::COORDINATOR, context = %transient, "promoting contextless view-model to transient context");

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.context_view_models.insert(transient.clone(), target_key.clone())?;
        state.contextless.remove_by_value(&target_key);
        state.join_context(&paired_view.0, &transient);

        self.relocate(&mut state, view, Some(&transient), None)
    }

    /// Move `view` out of `from_context` and acquire a view-model for
    /// `to_context`.
    ///
    /// The view is detached from wherever the coordinator actually holds it,
    /// so a contextless view orphans its private view-model. Rebinding to
    /// `from_context` or to the context the view is already in logs a warning
    /// and returns the current view-model unchanged.
    #[tracing::instrument(skip_all, target = "sharp_core::coordinator", level = "trace", fields(view = %view.id(), from = ?from_context, to = ?to_context))]
    pub fn rebind_to_context<P>(
        &self,
        view: &Arc<View<VM>>,
        from_context: Option<&str>,
        to_context: Option<&str>,
        provider: &P,
    ) -> CoordinatorResult<Arc<VM>>
    where
        P: Provider<VM> + ?Sized,
    {
        let state = self.state.upgradable_read();
        self.ensure_live(&state)?;
        match self.plan_rebind(&state, view, from_context, to_context, provider)? {
            Rebind::Stay(vm) => Ok(vm),
            Rebind::Move { to, fresh } => {
                let mut state = RwLockUpgradableReadGuard::upgrade(state);
                self.relocate(&mut state, view, to.as_deref(), fresh)
            }
        }
    }

    /// Remove `view` from the coordinator.
    ///
    /// If the view was the last one in its context, the context is deleted
    /// and its view-model orphaned. A contextless view orphans its
    /// view-model. Does nothing once the coordinator is disposed.
    #[tracing::instrument(skip_all, target = "sharp_core::coordinator", level = "trace", fields(view = %view.id(), context = ?context))]
    pub fn unregister_view(&self, view: &Arc<View<VM>>, context: Option<&str>) {
        let mut state = self.state.write();
        if state.disposed {
            tracing::trace!(target: targets::COORDINATOR, "coordinator disposed, ignoring unregister");
            return;
        }

        if let Some(expected) = context.filter(|c| !c.is_empty()) {
            let actual = state.context_views.get_key(&ByRef::new(view));
            if actual.is_some_and(|actual| actual != expected) {
                tracing::debug!(
                    target: targets::COORDINATOR,
                    view = %view.id(),
                    expected,
                    actual = ?actual,
                    "unregistering view from the context it actually belongs to"
                );
            }
        }

        if !state.detach(view) {
            tracing::trace!(target: targets::COORDINATOR, view = %view.id(), "view was not registered");
        }
    }

    /// Clear every tracked structure.
    ///
    /// View-models are released from tracking but not disposed. A second
    /// call logs a warning and does nothing.
    pub fn dispose(&self) {
        let mut state = self.state.write();
        if state.disposed {
            tracing::warn!(
                target: targets::COORDINATOR,
                view_model = type_name::<VM>(),
                "tried to dispose the coordinator twice, ignoring this call"
            );
            return;
        }
        tracing::info!(target: targets::COORDINATOR, view_model = type_name::<VM>(), "disposing coordinator");
        state.disposed = true;
        state.clear();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_live(&self, state: &CoordinatorState<VM>) -> CoordinatorResult<()> {
        if state.disposed {
            return Err(CoordinatorError::Disposed(type_name::<VM>()));
        }
        Ok(())
    }

    /// Validate the request and resolve a fresh view-model if the
    /// destination needs one. Does not mutate.
    fn resolve_for<P>(
        &self,
        state: &CoordinatorState<VM>,
        view: &Arc<View<VM>>,
        context: Option<&str>,
        provider: &P,
    ) -> CoordinatorResult<Option<Arc<VM>>>
    where
        P: Provider<VM> + ?Sized,
    {
        match context {
            None => {
                state.check_free(view)?;
                Ok(Some(Arc::new(provider.resolve()?)))
            }
            Some(context) => {
                state.check_can_join(view, context)?;
                if state.context_view_models.contains_key(&context.to_string()) {
                    Ok(None)
                } else {
                    Ok(Some(Arc::new(provider.resolve()?)))
                }
            }
        }
    }

    /// Register `view` at its destination. `fresh` must come from
    /// [`resolve_for`](Self::resolve_for) against the same state.
    fn attach(
        &self,
        state: &mut CoordinatorState<VM>,
        view: &Arc<View<VM>>,
        context: Option<&str>,
        fresh: Option<Arc<VM>>,
    ) -> CoordinatorResult<Arc<VM>> {
        let view_model = match (context, fresh) {
            (None, Some(vm)) => {
                let key = ByRef::new(&vm);
                state.contextless.insert(ByRef::new(view), key.clone())?;
                state.active.insert(key);
                view.set_context(None);
                if self.config.log_acquisitions {
                    tracing::debug!(target: targets::COORDINATOR, view = %view.id(), view_model = type_name::<VM>(), "new view-model without context");
                }
                vm
            }
            (Some(context), Some(vm)) => {
                let key = ByRef::new(&vm);
                state.context_view_models.insert(context.to_string(), key.clone())?;
                state.active.insert(key);
                state.join_context(view, context);
                if self.config.log_acquisitions {
                    tracing::debug!(target: targets::COORDINATOR, view = %view.id(), %context, "new view-model with context");
                }
                vm
            }
            (Some(context), None) => {
                let vm = state
                    .context_view_models
                    .get_by_key(&context.to_string())
                    .map(ByRef::arc)
                    .ok_or_else(|| CoordinatorError::ContextNotFound(context.to_string()))?;
                state.join_context(view, context);
                if self.config.log_acquisitions {
                    tracing::debug!(target: targets::COORDINATOR, view = %view.id(), %context, "sharing view-model of existing context");
                }
                vm
            }
            (None, None) => {
                return Err(CoordinatorError::ContextNotFound(String::new()));
            }
        };

        view.set_view_model(Some(Arc::clone(&view_model)));
        Ok(view_model)
    }

    /// Decide a rebind and resolve any fresh view-model. Does not mutate.
    fn plan_rebind<P>(
        &self,
        state: &CoordinatorState<VM>,
        view: &Arc<View<VM>>,
        from_context: Option<&str>,
        to_context: Option<&str>,
        provider: &P,
    ) -> CoordinatorResult<Rebind<VM>>
    where
        P: Provider<VM> + ?Sized,
    {
        let from_context = from_context.filter(|c| !c.is_empty());
        let to_context = to_context.filter(|c| !c.is_empty());
        let actual = state.context_of(view).map(String::as_str);

        if let Some(to) = to_context {
            if from_context == Some(to) || actual == Some(to) {
                tracing::warn!(
                    target: targets::COORDINATOR,
                    view = %view.id(),
                    context = to,
                    "trying to rebind to the same context, returning current view-model"
                );
                let current = view
                    .view_model()
                    .or_else(|| state.context_view_models.get_by_key(&to.to_string()).map(ByRef::arc))
                    .ok_or_else(|| CoordinatorError::ContextNotFound(to.to_string()))?;
                return Ok(Rebind::Stay(current));
            }
        }

        // Detaching only removes the view's own context, which differs from
        // `to_context` here, so the destination lookup stays valid.
        let needs_instance = match to_context {
            None => true,
            Some(to) => !state.context_view_models.contains_key(&to.to_string()),
        };
        let fresh = if needs_instance {
            Some(Arc::new(provider.resolve()?))
        } else {
            None
        };

        Ok(Rebind::Move {
            to: to_context.map(str::to_owned),
            fresh,
        })
    }

    /// Detach `view` and attach it at `to`.
    fn relocate(
        &self,
        state: &mut CoordinatorState<VM>,
        view: &Arc<View<VM>>,
        to: Option<&str>,
        fresh: Option<Arc<VM>>,
    ) -> CoordinatorResult<Arc<VM>> {
        state.detach(view);
        self.attach(state, view, to, fresh)
    }
}

impl<VM: ViewModel> Default for Coordinator<VM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<VM: ViewModel> std::fmt::Debug for Coordinator<VM> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("view_model", &type_name::<VM>())
            .field("counts", &self.counts())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
