//! Component definitions and their mounted instances.
//!
//! An instance renders eagerly: a state update outside of a render pass
//! re-runs the render function immediately and parks the result as the
//! pending subtree. Committing that subtree to the host happens either
//! synchronously (when the parent patches the instance) or on the next
//! [`Renderer::flush`](crate::Renderer::flush). Whichever commit runs first
//! takes the pending subtree, so a queued commit that finds nothing left is
//! simply skipped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace, warn};

use crate::context::ContextObserver;
use crate::error::RenderError;
use crate::fragment::HostHandle;
use crate::hooks::{EffectScope, HookSlots, Scope};
use crate::runtime::RuntimeHandle;
use crate::vnode::{Props, VNode};
use crate::NodeId;

/// Render attempts allowed in one render cycle before giving up.
pub const RE_RENDER_LIMIT: usize = 25;

pub type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_instance_id() -> InstanceId {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

type RenderFn = dyn Fn(&mut Scope<'_>, &Props) -> Render;

struct ComponentDef {
    name: &'static str,
    render: Box<RenderFn>,
}

/// A render function with an identity.
///
/// Two component nodes patch in place only if they were built from the same
/// `Component` value (or a clone of it).
#[derive(Clone)]
pub struct Component {
    def: Rc<ComponentDef>,
}

impl Component {
    pub fn new<F, R>(name: &'static str, render: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &Props) -> R + 'static,
        R: Into<Render>,
    {
        Self {
            def: Rc::new(ComponentDef {
                name,
                render: Box::new(move |scope: &mut Scope<'_>, props: &Props| -> Render {
                    render(scope, props).into()
                }),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn same(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.def, &other.def)
    }

    /// Shorthand for [`VNode::component`].
    pub fn node(&self, props: Props) -> VNode {
        VNode::component(self, props)
    }

    fn render(&self, scope: &mut Scope<'_>, props: &Props) -> Render {
        (self.def.render)(scope, props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.def.name).finish()
    }
}

/// What a render function produced.
#[derive(Debug, Default)]
pub enum Render {
    /// Nothing was returned. Rendering fails.
    #[default]
    Unset,
    /// Deliberately render nothing. Commits an empty text node so the
    /// instance keeps a place among its siblings. A list with no nodes
    /// converts to this.
    Empty,
    Node(VNode),
    /// Several roots; committed as a fragment with a warning.
    Siblings(Vec<VNode>),
    Text(String),
}

impl Render {
    /// Normalizes the render output. A subtree that would own no host node
    /// becomes an empty text node, so the instance can always be located
    /// through a live node of its own.
    pub(crate) fn into_vnode(self, component: &'static str) -> Result<VNode, RenderError> {
        let node = match self {
            Render::Unset => return Err(RenderError::NothingReturned { component }),
            Render::Empty => placeholder(),
            Render::Node(node) => node,
            Render::Text(text) => VNode::text(text),
            Render::Siblings(children) => {
                warn!(
                    "`{component}` rendered {} adjacent nodes without an enclosing node; \
                     wrapping them in a fragment",
                    children.len()
                );
                VNode::fragment(children)
            }
        };
        if node.owns_host_node() {
            Ok(node)
        } else {
            trace!("`{component}` rendered no host nodes; committing a placeholder");
            Ok(placeholder())
        }
    }
}

fn placeholder() -> VNode {
    VNode::text(String::new())
}

impl From<()> for Render {
    fn from(_: ()) -> Self {
        Render::Unset
    }
}

impl From<VNode> for Render {
    fn from(node: VNode) -> Self {
        Render::Node(node)
    }
}

impl From<Option<VNode>> for Render {
    fn from(node: Option<VNode>) -> Self {
        node.map_or(Render::Empty, Render::Node)
    }
}

impl From<Vec<VNode>> for Render {
    fn from(children: Vec<VNode>) -> Self {
        if children.is_empty() {
            Render::Empty
        } else {
            Render::Siblings(children)
        }
    }
}

impl From<&str> for Render {
    fn from(text: &str) -> Self {
        Render::Text(text.to_string())
    }
}

impl From<String> for Render {
    fn from(text: String) -> Self {
        Render::Text(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Mounted,
    Destroyed,
}

pub(crate) struct InstanceInner {
    pub(crate) id: InstanceId,
    pub(crate) component: Component,
    pub(crate) runtime: RuntimeHandle,
    pub(crate) props: RefCell<Props>,
    pub(crate) hooks: RefCell<HookSlots>,
    pub(crate) cursor: Cell<usize>,
    pub(crate) rendering: Cell<bool>,
    pub(crate) render_phase_update: Cell<bool>,
    render_attempts: Cell<usize>,
    pending: RefCell<Option<VNode>>,
    committed: RefCell<Option<VNode>>,
    commit_enqueued: Cell<bool>,
    effects_enqueued: Cell<bool>,
    lifecycle: Cell<Lifecycle>,
    renders: Cell<usize>,
    commits: Cell<usize>,
}

/// Resets per-render bookkeeping however the render exits.
struct RenderGuard<'a> {
    inner: &'a InstanceInner,
}

impl<'a> RenderGuard<'a> {
    fn enter(inner: &'a InstanceInner) -> Self {
        inner.rendering.set(true);
        Self { inner }
    }
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.inner.rendering.set(false);
        self.inner.render_phase_update.set(false);
        self.inner.cursor.set(0);
        self.inner.render_attempts.set(0);
    }
}

/// A mounted component: its hook slots, props and committed subtree.
#[derive(Clone)]
pub struct ComponentInstance {
    pub(crate) inner: Rc<InstanceInner>,
}

impl ComponentInstance {
    pub(crate) fn new(component: Component, props: Props, runtime: RuntimeHandle) -> Self {
        let id = next_instance_id();
        debug!("created instance #{id} of `{}`", component.name());
        Self {
            inner: Rc::new(InstanceInner {
                id,
                component,
                runtime,
                props: RefCell::new(props),
                hooks: RefCell::new(HookSlots::default()),
                cursor: Cell::new(0),
                rendering: Cell::new(false),
                render_phase_update: Cell::new(false),
                render_attempts: Cell::new(0),
                pending: RefCell::new(None),
                committed: RefCell::new(None),
                commit_enqueued: Cell::new(false),
                effects_enqueued: Cell::new(false),
                lifecycle: Cell::new(Lifecycle::Uninitialized),
                renders: Cell::new(0),
                commits: Cell::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<InstanceInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn name(&self) -> &'static str {
        self.inner.component.name()
    }

    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    pub fn props(&self) -> Props {
        self.inner.props.borrow().clone()
    }

    /// Times the render function has run.
    pub fn render_count(&self) -> usize {
        self.inner.renders.get()
    }

    /// Times a rendered subtree has been committed to the host.
    pub fn commit_count(&self) -> usize {
        self.inner.commits.get()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    pub fn handle(&self) -> InstanceHandle {
        InstanceHandle {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn host_handle(&self) -> HostHandle {
        self.inner
            .committed
            .borrow()
            .as_ref()
            .map_or(HostHandle::Empty, VNode::host_handle)
    }

    pub(crate) fn first_host_node(&self) -> Option<NodeId> {
        self.inner
            .committed
            .borrow()
            .as_ref()
            .and_then(VNode::first_host_node)
    }

    pub(crate) fn last_host_node(&self) -> Option<NodeId> {
        self.inner
            .committed
            .borrow()
            .as_ref()
            .and_then(VNode::last_host_node)
    }

    pub(crate) fn set_props(&self, props: Props) {
        *self.inner.props.borrow_mut() = props;
    }

    /// Runs the render function until it settles and parks the result as
    /// the pending subtree.
    ///
    /// State updates made by the render itself restart it. The cycle fails
    /// once it would need more than [`RE_RENDER_LIMIT`] attempts.
    pub(crate) fn render(&self) -> Result<(), RenderError> {
        let inner = &*self.inner;
        let component = inner.component.clone();
        let _guard = RenderGuard::enter(inner);
        loop {
            let attempts = inner.render_attempts.get() + 1;
            inner.render_attempts.set(attempts);
            if attempts > RE_RENDER_LIMIT {
                return Err(RenderError::TooManyReRenders {
                    component: component.name(),
                    attempts,
                });
            }
            inner.cursor.set(0);
            inner.render_phase_update.set(false);
            inner.hooks.borrow_mut().begin_render();
            let output = {
                let props = inner.props.borrow();
                let mut scope = Scope::new(self);
                component.render(&mut scope, &props)
            };
            inner.renders.set(inner.renders.get() + 1);
            if inner.render_phase_update.get() {
                trace!(
                    "`{}` (#{}) updated while rendering; attempt {attempts}",
                    component.name(),
                    inner.id
                );
                continue;
            }
            let subtree = output.into_vnode(component.name())?;
            *inner.pending.borrow_mut() = Some(subtree);
            return Ok(());
        }
    }

    /// Re-renders now and queues the commit for the next flush. Updates
    /// arriving before that flush share one queued commit.
    pub(crate) fn schedule_update(&self) -> Result<(), RenderError> {
        let inner = &*self.inner;
        if self.is_destroyed() {
            debug!("ignoring update of unmounted `{}` (#{})", self.name(), inner.id);
            return Ok(());
        }
        if inner.rendering.get() {
            inner.render_phase_update.set(true);
            return Ok(());
        }
        self.render()?;
        if !inner.commit_enqueued.replace(true) {
            inner
                .runtime
                .enqueue_commit(inner.id, Rc::downgrade(&self.inner));
        }
        Ok(())
    }

    pub(crate) fn dispatch<T: 'static, A>(
        &self,
        slot: usize,
        reducer: impl FnOnce(&T, A) -> T,
        payload: A,
    ) -> Result<(), RenderError> {
        if self.is_destroyed() {
            debug!("ignoring dispatch to unmounted `{}`", self.name());
            return Ok(());
        }
        let current = self.inner.hooks.borrow().state_value(slot);
        let Some(current) = current else {
            warn!("dispatch to empty state slot {slot} of `{}`", self.name());
            return Ok(());
        };
        let Some(typed) = current.downcast_ref::<T>() else {
            warn!(
                "dispatch to state slot {slot} of `{}` with a mismatched type",
                self.name()
            );
            return Ok(());
        };
        let next = reducer(typed, payload);
        self.inner.hooks.borrow_mut().set_state(slot, Rc::new(next));
        self.schedule_update()
    }

    pub(crate) fn take_pending(&self) -> Option<VNode> {
        self.inner.pending.borrow_mut().take()
    }

    pub(crate) fn take_committed(&self) -> Option<VNode> {
        self.inner.committed.borrow_mut().take()
    }

    pub(crate) fn restore_committed(&self, committed: Option<VNode>) {
        *self.inner.committed.borrow_mut() = committed;
    }

    pub(crate) fn clear_commit_enqueued(&self) {
        self.inner.commit_enqueued.set(false);
    }

    /// Stores the committed subtree and arms the effects it rendered.
    pub(crate) fn finish_commit(&self, committed: VNode) {
        let inner = &*self.inner;
        *inner.committed.borrow_mut() = Some(committed);
        inner.commits.set(inner.commits.get() + 1);
        if inner.lifecycle.get() == Lifecycle::Uninitialized {
            inner.lifecycle.set(Lifecycle::Mounted);
        }
        let armed = inner.hooks.borrow_mut().arm_effects();
        if armed && !inner.effects_enqueued.replace(true) {
            inner.runtime.enqueue_effects(Rc::downgrade(&self.inner));
        }
    }

    /// Runs armed effects in slot order, each after its previous teardown.
    pub(crate) fn flush_effects(&self) {
        let inner = &*self.inner;
        inner.effects_enqueued.set(false);
        if self.is_destroyed() {
            return;
        }
        let slots = inner.hooks.borrow().armed_slots();
        for slot in slots {
            let taken = inner.hooks.borrow_mut().take_armed(slot);
            let Some((teardown, setup)) = taken else {
                continue;
            };
            if let Some(teardown) = teardown {
                teardown();
            }
            let cleanup = setup(EffectScope).into_cleanup();
            inner.hooks.borrow_mut().set_teardown(slot, cleanup);
        }
    }

    /// Tears down every effect and marks the instance destroyed. Later
    /// updates and queued commits for it are ignored.
    pub(crate) fn destroy(&self, observer: Option<&dyn ContextObserver>) {
        let inner = &*self.inner;
        if inner.lifecycle.replace(Lifecycle::Destroyed) == Lifecycle::Destroyed {
            return;
        }
        let teardowns = inner.hooks.borrow_mut().take_teardowns();
        for teardown in teardowns {
            teardown();
        }
        inner.pending.borrow_mut().take();
        if let Some(observer) = observer {
            observer.instance_unmounted(inner.id);
        }
        debug!("destroyed `{}` (#{})", self.name(), inner.id);
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.inner.id)
            .field("component", &self.name())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

/// Weak handle used by setters, dispatchers and event handlers to reach an
/// instance without keeping it alive.
#[derive(Clone)]
pub struct InstanceHandle {
    id: InstanceId,
    inner: Weak<InstanceInner>,
}

impl InstanceHandle {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn upgrade(&self) -> Option<ComponentInstance> {
        self.inner.upgrade().map(ComponentInstance::from_inner)
    }

    pub fn is_mounted(&self) -> bool {
        self.upgrade()
            .is_some_and(|instance| instance.lifecycle() == Lifecycle::Mounted)
    }

    /// Replaces the state in `slot` with `reducer(current, payload)` and
    /// schedules a batched re-render. A no-op once the instance is gone.
    pub fn dispatch<T: 'static, A>(
        &self,
        slot: usize,
        reducer: impl FnOnce(&T, A) -> T,
        payload: A,
    ) -> Result<(), RenderError> {
        match self.upgrade() {
            Some(instance) => instance.dispatch(slot, reducer, payload),
            None => {
                debug!("dispatch to dropped instance #{}", self.id);
                Ok(())
            }
        }
    }

    /// Schedules a re-render without touching state.
    pub fn force_update(&self) -> Result<(), RenderError> {
        match self.upgrade() {
            Some(instance) => instance.schedule_update(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InstanceHandle").field(&self.id).finish()
    }
}

#[cfg(test)]
#[path = "tests/component_tests.rs"]
mod tests;
