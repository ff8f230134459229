use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use log::trace;

use crate::component::{InstanceId, InstanceInner};
use crate::error::HostError;
use crate::host::Host;
use crate::platform::RuntimeScheduler;

pub(crate) type HostCommand = Box<dyn FnOnce(&mut dyn Host) -> Result<(), HostError> + 'static>;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_flush: Cell<bool>,
    pass_depth: Cell<usize>,
    host_commands: RefCell<Vec<HostCommand>>,
    commit_queue: RefCell<VecDeque<(InstanceId, Weak<InstanceInner>)>>,
    effect_queue: RefCell<Vec<Weak<InstanceInner>>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_flush: Cell::new(false),
            pass_depth: Cell::new(0),
            host_commands: RefCell::new(Vec::new()),
            commit_queue: RefCell::new(VecDeque::new()),
            effect_queue: RefCell::new(Vec::new()),
        }
    }

    /// Inside a pass the request is only recorded; [`Self::settle`] asks
    /// the scheduler once the pass is over and work is still left.
    fn schedule(&self) {
        let was_requested = self.needs_flush.replace(true);
        if !was_requested && self.pass_depth.get() == 0 {
            self.scheduler.schedule_flush();
        }
    }

    fn enqueue_commit(&self, id: InstanceId, instance: Weak<InstanceInner>) {
        trace!("queueing commit for instance #{id}");
        self.commit_queue.borrow_mut().push_back((id, instance));
        self.schedule();
    }

    fn take_commits(&self) -> Vec<(InstanceId, Weak<InstanceInner>)> {
        self.commit_queue.borrow_mut().drain(..).collect()
    }

    fn has_commits(&self) -> bool {
        !self.commit_queue.borrow().is_empty()
    }

    /// Ends a pass. Clears the flush request once every queue is empty;
    /// otherwise asks the scheduler for the work left behind.
    fn settle(&self) {
        let depth = self.pass_depth.get().saturating_sub(1);
        self.pass_depth.set(depth);
        if depth > 0 {
            return;
        }
        if !self.has_commits() && self.host_commands.borrow().is_empty() {
            self.needs_flush.set(false);
        } else {
            self.needs_flush.set(true);
            self.scheduler.schedule_flush();
        }
    }
}

/// Queues shared between a [`Renderer`](crate::Renderer) and the component
/// instances it mounted.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Whether work is waiting for [`Renderer::flush`](crate::Renderer::flush).
    pub fn needs_flush(&self) -> bool {
        self.inner.needs_flush.get()
    }

    pub fn has_pending_commits(&self) -> bool {
        self.inner.has_commits()
    }

    #[cfg(test)]
    pub(crate) fn has_host_commands(&self) -> bool {
        !self.inner.host_commands.borrow().is_empty()
    }

    pub(crate) fn take_host_commands(&self) -> Vec<HostCommand> {
        self.inner.host_commands.borrow_mut().drain(..).collect()
    }

    pub(crate) fn take_commits(&self) -> Vec<(InstanceId, Weak<InstanceInner>)> {
        self.inner.take_commits()
    }

    pub(crate) fn take_effects(&self) -> Vec<Weak<InstanceInner>> {
        self.inner.effect_queue.borrow_mut().drain(..).collect()
    }

    pub(crate) fn enter_pass(&self) {
        let depth = &self.inner.pass_depth;
        depth.set(depth.get() + 1);
    }

    pub(crate) fn settle(&self) {
        self.inner.settle();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

/// Scheduler that ignores flush requests; the host polls
/// [`Runtime::needs_flush`] instead.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_flush(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler;

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_flush(&self) {}
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn enqueue_host_command(&self, command: HostCommand) {
        if let Some(inner) = self.0.upgrade() {
            inner.host_commands.borrow_mut().push(command);
            inner.schedule();
        }
    }

    pub(crate) fn enqueue_commit(&self, id: InstanceId, instance: Weak<InstanceInner>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_commit(id, instance);
        }
    }

    pub(crate) fn enqueue_effects(&self, instance: Weak<InstanceInner>) {
        if let Some(inner) = self.0.upgrade() {
            inner.effect_queue.borrow_mut().push(instance);
        }
    }
}
