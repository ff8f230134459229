//! Pluggable patch modules and the deferred-removal protocol.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use log::trace;

use crate::error::HostError;
use crate::fragment::{self, HostHandle};
use crate::host::Host;
use crate::runtime::RuntimeHandle;
use crate::vnode::VNode;

/// A participant in every patch pass.
///
/// `pre` and `post` bracket the outermost pass. `create`, `update` and
/// `destroy` run for every node the pass touches; modules that only care
/// about elements should ignore the rest. `remove` receives a shared
/// [`RemoveCallback`] and must eventually call [`RemoveCallback::done`].
pub trait Module {
    fn name(&self) -> &'static str;

    fn pre(&mut self) {}

    fn create(&mut self, _host: &mut dyn Host, _vnode: &VNode) -> Result<(), HostError> {
        Ok(())
    }

    fn update(&mut self, _host: &mut dyn Host, _old: &VNode, _new: &VNode) -> Result<(), HostError> {
        Ok(())
    }

    fn destroy(&mut self, _host: &mut dyn Host, _vnode: &VNode) -> Result<(), HostError> {
        Ok(())
    }

    fn remove(
        &mut self,
        _host: &mut dyn Host,
        _vnode: &VNode,
        done: RemoveCallback,
    ) -> Result<(), HostError> {
        done.done();
        Ok(())
    }

    fn post(&mut self) {}
}

struct Removal {
    remaining: Cell<usize>,
    handle: HostHandle,
    runtime: RuntimeHandle,
}

/// Countdown shared by every participant in a node's removal.
///
/// The node is detached from the host once all participants have signalled.
/// Extra calls after that are ignored.
#[derive(Clone)]
pub struct RemoveCallback {
    inner: Rc<Removal>,
}

impl RemoveCallback {
    pub(crate) fn new(handle: HostHandle, participants: usize, runtime: RuntimeHandle) -> Self {
        Self {
            inner: Rc::new(Removal {
                remaining: Cell::new(participants),
                handle,
                runtime,
            }),
        }
    }

    pub fn done(&self) {
        let remaining = self.inner.remaining.get();
        if remaining == 0 {
            return;
        }
        self.inner.remaining.set(remaining - 1);
        if remaining == 1 {
            let handle = self.inner.handle.clone();
            trace!("removal complete; detaching {:?}", handle.nodes());
            self.inner
                .runtime
                .enqueue_host_command(Box::new(move |host: &mut dyn Host| {
                    fragment::detach(host, &handle)
                }));
        }
    }

    /// Participants that have not signalled yet.
    pub fn pending(&self) -> usize {
        self.inner.remaining.get()
    }

    pub fn handle(&self) -> &HostHandle {
        &self.inner.handle
    }
}

impl fmt::Debug for RemoveCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoveCallback")
            .field("pending", &self.pending())
            .field("handle", &self.inner.handle)
            .finish()
    }
}

/// Mirrors element attributes onto host nodes.
#[derive(Debug, Default)]
pub struct AttributesModule;

impl Module for AttributesModule {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn create(&mut self, host: &mut dyn Host, vnode: &VNode) -> Result<(), HostError> {
        let (Some(elm), Some(data)) = (vnode.element_id(), vnode.data()) else {
            return Ok(());
        };
        for (name, value) in &data.attrs {
            host.set_attribute(elm, name, value)?;
        }
        Ok(())
    }

    fn update(&mut self, host: &mut dyn Host, old: &VNode, new: &VNode) -> Result<(), HostError> {
        let (Some(elm), Some(data)) = (new.element_id(), new.data()) else {
            return Ok(());
        };
        let previous = old.data().map(|data| &data.attrs);
        for (name, value) in &data.attrs {
            if previous.and_then(|attrs| attrs.get(name)) != Some(value) {
                host.set_attribute(elm, name, value)?;
            }
        }
        if let Some(previous) = previous {
            for name in previous.keys() {
                if !data.attrs.contains_key(name) {
                    host.remove_attribute(elm, name)?;
                }
            }
        }
        Ok(())
    }
}

/// Keeps host event listeners in sync with element `on` maps.
#[derive(Debug, Default)]
pub struct ListenersModule;

impl Module for ListenersModule {
    fn name(&self) -> &'static str {
        "listeners"
    }

    fn create(&mut self, host: &mut dyn Host, vnode: &VNode) -> Result<(), HostError> {
        let (Some(elm), Some(data)) = (vnode.element_id(), vnode.data()) else {
            return Ok(());
        };
        for (event, listener) in &data.on {
            host.add_listener(elm, event, listener)?;
        }
        Ok(())
    }

    fn update(&mut self, host: &mut dyn Host, old: &VNode, new: &VNode) -> Result<(), HostError> {
        let (Some(elm), Some(data)) = (new.element_id(), new.data()) else {
            return Ok(());
        };
        let previous = old.data().map(|data| &data.on);
        for (event, listener) in &data.on {
            let unchanged = previous
                .and_then(|on| on.get(event))
                .is_some_and(|old| old.same(listener));
            if !unchanged {
                host.add_listener(elm, event, listener)?;
            }
        }
        if let Some(previous) = previous {
            for event in previous.keys() {
                if !data.on.contains_key(event) {
                    host.remove_listener(elm, event)?;
                }
            }
        }
        Ok(())
    }

    fn destroy(&mut self, host: &mut dyn Host, vnode: &VNode) -> Result<(), HostError> {
        let (Some(elm), Some(data)) = (vnode.element_id(), vnode.data()) else {
            return Ok(());
        };
        for event in data.on.keys() {
            host.remove_listener(elm, event)?;
        }
        Ok(())
    }
}

/// The modules a renderer uses unless told otherwise.
pub fn default_modules() -> Vec<Box<dyn Module>> {
    vec![Box::new(AttributesModule), Box::new(ListenersModule)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Runtime, TestScheduler};
    use std::sync::Arc;

    #[test]
    fn detaches_only_after_every_participant() {
        let runtime = Runtime::new(Arc::new(TestScheduler));
        let callback = RemoveCallback::new(HostHandle::Node(3), 3, runtime.handle());
        callback.done();
        callback.clone().done();
        assert_eq!(callback.pending(), 1);
        assert!(!runtime.has_host_commands());
        callback.done();
        assert_eq!(callback.pending(), 0);
        assert!(runtime.has_host_commands());
    }

    #[test]
    fn late_signals_are_ignored() {
        let runtime = Runtime::new(Arc::new(TestScheduler));
        let callback = RemoveCallback::new(HostHandle::Empty, 1, runtime.handle());
        callback.done();
        callback.done();
        assert_eq!(runtime.take_host_commands().len(), 1);
    }
}
