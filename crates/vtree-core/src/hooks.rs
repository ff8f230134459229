//! Hook slots and the render [`Scope`].
//!
//! Every hook call claims the next slot index. The mapping from call order to
//! slot is the only thing that ties a hook to its storage, so hooks must be
//! called in the same order on every render of an instance.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use log::warn;

use crate::collections::map::{BTreeMap, HashMap};
use crate::component::{ComponentInstance, InstanceHandle, InstanceId};
use crate::error::RenderError;

type EffectSetup = Box<dyn FnOnce(EffectScope) -> EffectResult>;
type Teardown = Box<dyn FnOnce()>;
type DepsEq = fn(&dyn Any, &dyn Any) -> bool;

fn deps_equal<D: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<D>(), b.downcast_ref::<D>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

struct MemoSlot {
    value: Box<dyn Any>,
    deps: Box<dyn Any>,
}

struct StagedEffect {
    deps: Option<Box<dyn Any>>,
    same: DepsEq,
    setup: EffectSetup,
}

#[derive(Default)]
struct EffectSlot {
    /// Recorded by the most recent render.
    staged: Option<StagedEffect>,
    /// Dependencies of the last armed run.
    deps: Option<Box<dyn Any>>,
    ever_armed: bool,
    armed: Option<EffectSetup>,
    teardown: Option<Teardown>,
}

#[derive(Default)]
pub(crate) struct HookSlots {
    state: HashMap<usize, Rc<dyn Any>>,
    memos: HashMap<usize, MemoSlot>,
    refs: HashMap<usize, Box<dyn Any>>,
    effects: BTreeMap<usize, EffectSlot>,
}

impl HookSlots {
    pub(crate) fn begin_render(&mut self) {
        for effect in self.effects.values_mut() {
            effect.staged = None;
        }
    }

    pub(crate) fn state_value(&self, slot: usize) -> Option<Rc<dyn Any>> {
        self.state.get(&slot).cloned()
    }

    pub(crate) fn set_state(&mut self, slot: usize, value: Rc<dyn Any>) {
        self.state.insert(slot, value);
    }

    /// Promotes staged effects whose dependencies changed since the last
    /// armed run. Returns whether anything is armed.
    pub(crate) fn arm_effects(&mut self) -> bool {
        let mut any = false;
        for effect in self.effects.values_mut() {
            if let Some(staged) = effect.staged.take() {
                let changed = !effect.ever_armed
                    || match (&staged.deps, &effect.deps) {
                        (Some(next), Some(previous)) => {
                            !(staged.same)(next.as_ref(), previous.as_ref())
                        }
                        _ => true,
                    };
                if changed {
                    effect.deps = staged.deps;
                    effect.ever_armed = true;
                    effect.armed = Some(staged.setup);
                }
            }
            any |= effect.armed.is_some();
        }
        any
    }

    pub(crate) fn armed_slots(&self) -> Vec<usize> {
        self.effects
            .iter()
            .filter(|(_, effect)| effect.armed.is_some())
            .map(|(slot, _)| *slot)
            .collect()
    }

    pub(crate) fn take_armed(&mut self, slot: usize) -> Option<(Option<Teardown>, EffectSetup)> {
        let effect = self.effects.get_mut(&slot)?;
        let setup = effect.armed.take()?;
        Some((effect.teardown.take(), setup))
    }

    pub(crate) fn set_teardown(&mut self, slot: usize, teardown: Option<Teardown>) {
        if let Some(effect) = self.effects.get_mut(&slot) {
            effect.teardown = teardown;
        }
    }

    /// Drops pending runs and hands back every teardown in slot order.
    pub(crate) fn take_teardowns(&mut self) -> Vec<Teardown> {
        self.effects
            .values_mut()
            .filter_map(|effect| {
                effect.staged = None;
                effect.armed = None;
                effect.teardown.take()
            })
            .collect()
    }
}

/// Handle passed to a render function for calling hooks.
pub struct Scope<'a> {
    instance: &'a ComponentInstance,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(instance: &'a ComponentInstance) -> Self {
        Self { instance }
    }

    fn next_slot(&mut self) -> usize {
        let cursor = &self.instance.inner.cursor;
        let slot = cursor.get();
        cursor.set(slot + 1);
        slot
    }

    fn slots(&self) -> &RefCell<HookSlots> {
        &self.instance.inner.hooks
    }

    /// Index the next hook call will claim.
    pub fn slot_cursor(&self) -> usize {
        self.instance.inner.cursor.get()
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance.id()
    }

    pub fn handle(&self) -> InstanceHandle {
        self.instance.handle()
    }

    /// Re-renders the instance. Called during render it restarts the
    /// current render instead.
    pub fn force_update(&self) -> Result<(), RenderError> {
        self.instance.schedule_update()
    }

    pub fn use_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, StateSetter<T>) {
        let slot = self.next_slot();
        let value = self.read_state(slot, init);
        (value, StateSetter::new(self.handle(), slot))
    }

    pub fn use_reducer<T, A, R>(
        &mut self,
        reducer: R,
        init: impl FnOnce() -> T,
    ) -> (T, Dispatcher<T, A>)
    where
        T: Clone + 'static,
        A: 'static,
        R: Fn(&T, A) -> T + 'static,
    {
        let slot = self.next_slot();
        let value = self.read_state(slot, init);
        let dispatcher = Dispatcher {
            handle: self.handle(),
            slot,
            reducer: Rc::new(reducer),
        };
        (value, dispatcher)
    }

    fn read_state<T: Clone + 'static>(&self, slot: usize, init: impl FnOnce() -> T) -> T {
        let existing = self.slots().borrow().state_value(slot);
        if let Some(existing) = existing {
            if let Some(value) = existing.downcast_ref::<T>() {
                return value.clone();
            }
            warn!(
                "state slot {slot} of `{}` changed type between renders; re-initializing",
                self.instance.name()
            );
        }
        let value = init();
        self.slots()
            .borrow_mut()
            .set_state(slot, Rc::new(value.clone()));
        value
    }

    /// Returns the cached value while `deps` compares equal to the previous
    /// render's dependencies; otherwise recomputes it.
    pub fn use_memo<T, D>(&mut self, deps: D, compute: impl FnOnce() -> T) -> T
    where
        T: Clone + 'static,
        D: PartialEq + 'static,
    {
        let slot = self.next_slot();
        let cached = self.slots().borrow().memos.get(&slot).and_then(|memo| {
            if memo.deps.downcast_ref::<D>() == Some(&deps) {
                memo.value.downcast_ref::<T>().cloned()
            } else {
                None
            }
        });
        if let Some(value) = cached {
            return value;
        }
        let value = compute();
        self.slots().borrow_mut().memos.insert(
            slot,
            MemoSlot {
                value: Box::new(value.clone()),
                deps: Box::new(deps),
            },
        );
        value
    }

    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> MutableRef<T> {
        let slot = self.next_slot();
        let existing = self
            .slots()
            .borrow()
            .refs
            .get(&slot)
            .map(|stored| stored.downcast_ref::<MutableRef<T>>().cloned());
        match existing {
            Some(Some(cell)) => return cell,
            Some(None) => warn!(
                "ref slot {slot} of `{}` changed type between renders; re-initializing",
                self.instance.name()
            ),
            None => {}
        }
        let cell = MutableRef::new(init());
        self.slots()
            .borrow_mut()
            .refs
            .insert(slot, Box::new(cell.clone()));
        cell
    }

    /// Runs `setup` after every commit of this instance.
    pub fn use_effect<F, R>(&mut self, setup: F)
    where
        F: FnOnce(EffectScope) -> R + 'static,
        R: Into<EffectResult>,
    {
        let slot = self.next_slot();
        self.stage_effect(slot, None, deps_equal::<()>, setup);
    }

    /// Runs `setup` after the first commit and after any commit whose
    /// `deps` differ from the ones of the last run.
    pub fn use_effect_with<D, F, R>(&mut self, deps: D, setup: F)
    where
        D: PartialEq + 'static,
        F: FnOnce(EffectScope) -> R + 'static,
        R: Into<EffectResult>,
    {
        let slot = self.next_slot();
        self.stage_effect(slot, Some(Box::new(deps)), deps_equal::<D>, setup);
    }

    fn stage_effect<F, R>(&mut self, slot: usize, deps: Option<Box<dyn Any>>, same: DepsEq, setup: F)
    where
        F: FnOnce(EffectScope) -> R + 'static,
        R: Into<EffectResult>,
    {
        let staged = StagedEffect {
            deps,
            same,
            setup: Box::new(move |scope: EffectScope| -> EffectResult { setup(scope).into() }),
        };
        self.slots()
            .borrow_mut()
            .effects
            .entry(slot)
            .or_default()
            .staged = Some(staged);
    }
}

/// Setter returned by [`Scope::use_state`].
pub struct StateSetter<T> {
    handle: InstanceHandle,
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            slot: self.slot,
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> StateSetter<T> {
    fn new(handle: InstanceHandle, slot: usize) -> Self {
        Self {
            handle,
            slot,
            _marker: PhantomData,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn set(&self, value: T) -> Result<(), RenderError> {
        self.handle.dispatch(self.slot, |_: &T, value: T| value, value)
    }

    pub fn update(&self, update: impl FnOnce(&T) -> T) -> Result<(), RenderError> {
        self.handle
            .dispatch(self.slot, move |current: &T, ()| update(current), ())
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("instance", &self.handle.id())
            .field("slot", &self.slot)
            .finish()
    }
}

/// Dispatcher returned by [`Scope::use_reducer`].
pub struct Dispatcher<T, A> {
    handle: InstanceHandle,
    slot: usize,
    reducer: Rc<dyn Fn(&T, A) -> T>,
}

impl<T, A> Clone for Dispatcher<T, A> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            slot: self.slot,
            reducer: Rc::clone(&self.reducer),
        }
    }
}

impl<T: 'static, A> Dispatcher<T, A> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn dispatch(&self, action: A) -> Result<(), RenderError> {
        let reducer = Rc::clone(&self.reducer);
        self.handle
            .dispatch(self.slot, move |current: &T, action: A| reducer(current, action), action)
    }
}

/// Mutable cell that survives re-renders without triggering them.
pub struct MutableRef<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> MutableRef<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }

    pub fn ptr_eq(&self, other: &MutableRef<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone> MutableRef<T> {
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EffectScope;

impl EffectScope {
    /// Registers `cleanup` to run before the next run of the effect and when
    /// the instance is unmounted.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> EffectResult {
        EffectResult::new(cleanup)
    }
}

#[derive(Default)]
pub struct EffectResult {
    cleanup: Option<Teardown>,
}

impl EffectResult {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub(crate) fn into_cleanup(self) -> Option<Teardown> {
        self.cleanup
    }
}

impl From<()> for EffectResult {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[path = "tests/hook_tests.rs"]
mod tests;
