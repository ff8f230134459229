use std::cell::RefCell;
use std::rc::Rc;

use vtree_core::{Host, HostError, Module, RemoveCallback, VNode};

/// Module that holds on to every removal of an element until released,
/// standing in for an exit transition.
#[derive(Clone, Debug, Default)]
pub struct HeldRemovals {
    held: Rc<RefCell<Vec<RemoveCallback>>>,
}

impl HeldRemovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.held.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.borrow().is_empty()
    }

    /// Signals every held removal. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let held = std::mem::take(&mut *self.held.borrow_mut());
        for done in &held {
            done.done();
        }
        held.len()
    }
}

impl Module for HeldRemovals {
    fn name(&self) -> &'static str {
        "held-removals"
    }

    fn remove(
        &mut self,
        _host: &mut dyn Host,
        vnode: &VNode,
        done: RemoveCallback,
    ) -> Result<(), HostError> {
        if vnode.tag().is_some() {
            self.held.borrow_mut().push(done);
        } else {
            done.done();
        }
        Ok(())
    }
}
