//! The reconciler: mounts, patches and removes virtual trees against a
//! [`Host`].

use std::mem;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::collections::map::HashMap;
use crate::component::ComponentInstance;
use crate::context::ContextObserver;
use crate::error::RenderError;
use crate::fragment;
use crate::host::Host;
use crate::module::{default_modules, Module, RemoveCallback};
use crate::platform::RuntimeScheduler;
use crate::runtime::Runtime;
use crate::vnode::{same_vnode, Content, Key, NodeCallback, VNode, VNodeKind};
use crate::NodeId;

/// Where a node goes: inside `parent`, before `next` (or last).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Position {
    pub(crate) parent: NodeId,
    pub(crate) next: Option<NodeId>,
}

impl Position {
    fn append(parent: NodeId) -> Self {
        Self { parent, next: None }
    }

    fn before(self, next: Option<NodeId>) -> Self {
        Self {
            parent: self.parent,
            next,
        }
    }
}

/// The new side of a top-level patch.
#[derive(Debug)]
pub enum Tree {
    Node(VNode),
    /// Rejected: a root must be a single node.
    Siblings(Vec<VNode>),
}

impl From<VNode> for Tree {
    fn from(node: VNode) -> Self {
        Tree::Node(node)
    }
}

impl From<Vec<VNode>> for Tree {
    fn from(nodes: Vec<VNode>) -> Self {
        Tree::Siblings(nodes)
    }
}

/// The old side of a top-level patch.
#[derive(Debug, Default)]
pub enum PatchTarget {
    /// Nothing mounted yet; the new tree is appended to the parent.
    #[default]
    Unmounted,
    VNode(VNode),
    /// An existing host node, adopted as an empty element of the same tag.
    Host(NodeId),
}

impl From<VNode> for PatchTarget {
    fn from(node: VNode) -> Self {
        PatchTarget::VNode(node)
    }
}

impl From<Option<VNode>> for PatchTarget {
    fn from(node: Option<VNode>) -> Self {
        node.map_or(PatchTarget::Unmounted, PatchTarget::VNode)
    }
}

pub struct RendererBuilder<H: Host> {
    host: H,
    modules: Option<Vec<Box<dyn Module>>>,
    runtime: Option<Runtime>,
    observer: Option<Rc<dyn ContextObserver>>,
}

impl<H: Host> RendererBuilder<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            modules: None,
            runtime: None,
            observer: None,
        }
    }

    /// Replaces the default attribute and listener modules.
    pub fn modules(mut self, modules: Vec<Box<dyn Module>>) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Appends a module after the ones configured so far.
    pub fn module(mut self, module: impl Module + 'static) -> Self {
        self.modules
            .get_or_insert_with(default_modules)
            .push(Box::new(module));
        self
    }

    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn scheduler(self, scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        self.runtime(Runtime::new(scheduler))
    }

    pub fn observer(mut self, observer: Rc<dyn ContextObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Renderer<H> {
        Renderer {
            host: self.host,
            modules: self.modules.unwrap_or_else(default_modules),
            runtime: self.runtime.unwrap_or_default(),
            observer: self.observer,
            inserted: Vec::new(),
        }
    }
}

/// Drives a host tree from virtual trees.
///
/// Every public entry point is one pass: modules see `pre` first and `post`
/// last, insert hooks run after all host mutations of the pass, and effects
/// of committed components run at the very end, children before parents.
pub struct Renderer<H: Host> {
    host: H,
    modules: Vec<Box<dyn Module>>,
    runtime: Runtime,
    observer: Option<Rc<dyn ContextObserver>>,
    inserted: Vec<(NodeCallback, NodeId)>,
}

impl<H: Host> Renderer<H> {
    pub fn new(host: H) -> Self {
        RendererBuilder::new(host).build()
    }

    pub fn builder(host: H) -> RendererBuilder<H> {
        RendererBuilder::new(host)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Whether deferred commits or detaches are waiting for [`Self::flush`].
    pub fn needs_flush(&self) -> bool {
        self.runtime.needs_flush()
    }

    /// Appends `new` to `parent`.
    pub fn mount(&mut self, new: impl Into<Tree>, parent: NodeId) -> Result<VNode, RenderError> {
        self.patch(PatchTarget::Unmounted, new, parent)
    }

    /// Reconciles `old` into `new` under `parent` and returns the mounted
    /// tree, which is the `old` of the next call.
    pub fn patch(
        &mut self,
        old: impl Into<PatchTarget>,
        new: impl Into<Tree>,
        parent: NodeId,
    ) -> Result<VNode, RenderError> {
        let new = match new.into() {
            Tree::Node(node) => node,
            Tree::Siblings(_) => return Err(RenderError::UnwrappedSiblings),
        };
        let old = old.into();
        self.in_pass(move |renderer| renderer.patch_target(old, new, parent))
    }

    /// Removes a mounted tree, running destroy hooks and effect teardowns.
    pub fn unmount(&mut self, vnode: VNode) -> Result<(), RenderError> {
        self.in_pass(|renderer| renderer.remove_vnodes([vnode]))
    }

    /// Commits every queued component update, then runs their effects.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.in_pass(Self::drain_commits)
    }

    /// Re-renders `instance` and commits it immediately, superseding any
    /// queued commit for it.
    pub fn update_now(&mut self, instance: &ComponentInstance) -> Result<(), RenderError> {
        if instance.is_destroyed() {
            return Ok(());
        }
        self.in_pass(|renderer| {
            instance.render()?;
            renderer.commit_instance(instance, None)
        })
    }

    fn in_pass<T>(
        &mut self,
        work: impl FnOnce(&mut Self) -> Result<T, RenderError>,
    ) -> Result<T, RenderError> {
        self.runtime.enter_pass();
        for module in self.modules.iter_mut() {
            module.pre();
        }
        let result = work(self);
        let finished = self.finish_pass();
        let value = result?;
        finished?;
        Ok(value)
    }

    fn finish_pass(&mut self) -> Result<(), RenderError> {
        let applied = self.apply_host_commands();
        for (hook, elm) in mem::take(&mut self.inserted) {
            hook(elm);
        }
        for module in self.modules.iter_mut() {
            module.post();
        }
        self.run_effects();
        self.runtime.settle();
        applied
    }

    fn apply_host_commands(&mut self) -> Result<(), RenderError> {
        for command in self.runtime.take_host_commands() {
            command(&mut self.host)?;
        }
        Ok(())
    }

    fn run_effects(&mut self) {
        for instance in self.runtime.take_effects() {
            if let Some(inner) = instance.upgrade() {
                ComponentInstance::from_inner(inner).flush_effects();
            }
        }
    }

    fn drain_commits(&mut self) -> Result<(), RenderError> {
        loop {
            let batch = self.runtime.take_commits();
            if batch.is_empty() {
                return Ok(());
            }
            trace!("flushing {} queued commits", batch.len());
            for (id, instance) in batch {
                let Some(inner) = instance.upgrade() else {
                    trace!("instance #{id} dropped before its commit");
                    continue;
                };
                let instance = ComponentInstance::from_inner(inner);
                instance.clear_commit_enqueued();
                if instance.is_destroyed() {
                    continue;
                }
                self.commit_instance(&instance, None)?;
            }
            self.apply_host_commands()?;
        }
    }

    fn patch_target(
        &mut self,
        old: PatchTarget,
        mut new: VNode,
        parent: NodeId,
    ) -> Result<VNode, RenderError> {
        let old = match old {
            PatchTarget::Unmounted => {
                debug!("mounting tree into host node {parent}");
                self.create_elm(&mut new, Position::append(parent))?;
                return Ok(new);
            }
            PatchTarget::VNode(old) => old,
            PatchTarget::Host(id) => self.adopt_host_node(id),
        };
        let next = old
            .last_host_node()
            .and_then(|last| self.host.next_sibling(last));
        self.patch_root(old, new, Position { parent, next })
    }

    fn adopt_host_node(&self, id: NodeId) -> VNode {
        match self.host.tag_name(id) {
            Some(tag) => {
                let mut node = VNode::element(tag.to_lowercase());
                if let VNodeKind::Element(el) = &mut node.kind {
                    el.elm = Some(id);
                    el.content = Content::Children(Vec::new());
                }
                node
            }
            None => {
                let mut node = VNode::text(String::new());
                if let VNodeKind::Text(text) = &mut node.kind {
                    text.elm = Some(id);
                }
                node
            }
        }
    }

    /// Patches in place when possible, otherwise mounts `new` where `old`
    /// was and removes `old`.
    fn patch_root(
        &mut self,
        old: VNode,
        mut new: VNode,
        pos: Position,
    ) -> Result<VNode, RenderError> {
        if same_vnode(&old, &new) {
            self.patch_vnode(old, &mut new, pos)?;
        } else {
            let anchor = old.first_host_node().or(pos.next);
            self.create_elm(&mut new, pos.before(anchor))?;
            self.remove_vnodes([old])?;
        }
        Ok(new)
    }

    fn create_elm(&mut self, vnode: &mut VNode, pos: Position) -> Result<(), RenderError> {
        if vnode.tag().is_some() {
            return self.create_element(vnode, pos);
        }
        match &mut vnode.kind {
            VNodeKind::Element(_) => Ok(()),
            VNodeKind::Text(text) => {
                let elm = self.host.create_text_node(&text.text)?;
                text.elm = Some(elm);
                self.host.insert_before(pos.parent, elm, pos.next)?;
                Ok(())
            }
            VNodeKind::Fragment(fragment) => {
                for child in fragment.children.iter_mut() {
                    self.create_elm(child, pos)?;
                }
                Ok(())
            }
            VNodeKind::Component(node) => {
                let instance = ComponentInstance::new(
                    node.component.clone(),
                    node.effective_props(),
                    self.runtime.handle(),
                );
                node.instance = Some(instance.clone());
                instance.render()?;
                self.commit_instance(&instance, Some(pos))
            }
        }
    }

    fn create_element(&mut self, vnode: &mut VNode, pos: Position) -> Result<(), RenderError> {
        let VNodeKind::Element(el) = &mut vnode.kind else {
            return Ok(());
        };
        let elm = self
            .host
            .create_element(&el.tag, el.data.namespace.as_deref())?;
        el.elm = Some(elm);
        match &mut el.content {
            Content::Children(children) => {
                for child in children.iter_mut() {
                    self.create_elm(child, Position::append(elm))?;
                }
            }
            Content::Text(text) => {
                let text = self.host.create_text_node(text)?;
                self.host.append_child(elm, text)?;
            }
            Content::None => {}
        }
        let create_hook = el.data.hooks.create.clone();
        let insert_hook = el.data.hooks.insert.clone();
        for module in self.modules.iter_mut() {
            module.create(&mut self.host, vnode)?;
        }
        if let Some(hook) = create_hook {
            hook(elm);
        }
        self.host.insert_before(pos.parent, elm, pos.next)?;
        if let Some(hook) = insert_hook {
            self.inserted.push((hook, elm));
        }
        Ok(())
    }

    fn add_vnodes(&mut self, pos: Position, vnodes: &mut [VNode]) -> Result<(), RenderError> {
        for vnode in vnodes {
            self.create_elm(vnode, pos)?;
        }
        Ok(())
    }

    /// Removes `vnodes`, then applies whatever detaches completed
    /// synchronously.
    fn remove_vnodes(&mut self, vnodes: impl IntoIterator<Item = VNode>) -> Result<(), RenderError> {
        for vnode in vnodes {
            self.remove_vnode(vnode)?;
        }
        self.apply_host_commands()
    }

    fn remove_vnode(&mut self, vnode: VNode) -> Result<(), RenderError> {
        if let VNodeKind::Text(text) = &vnode.kind {
            if let Some(elm) = text.elm {
                if let Some(parent) = self.host.parent_node(elm) {
                    self.host.remove_child(parent, elm)?;
                }
            }
            return Ok(());
        }
        let handle = vnode.host_handle();
        self.invoke_destroy_hook(&vnode)?;
        let done = RemoveCallback::new(handle, self.modules.len() + 1, self.runtime.handle());
        for module in self.modules.iter_mut() {
            module.remove(&mut self.host, &vnode, done.clone())?;
        }
        let remove_hook = vnode.data().and_then(|data| data.hooks.remove.clone());
        match (vnode.element_id(), remove_hook) {
            (Some(elm), Some(hook)) => hook(elm, done),
            _ => done.done(),
        }
        Ok(())
    }

    /// Elements notify before their children; a component notifies after
    /// its rendered subtree so descendants tear down first.
    fn invoke_destroy_hook(&mut self, vnode: &VNode) -> Result<(), RenderError> {
        match &vnode.kind {
            VNodeKind::Element(el) => {
                if let (Some(elm), Some(hook)) = (el.elm, &el.data.hooks.destroy) {
                    hook(elm);
                }
                for module in self.modules.iter_mut() {
                    module.destroy(&mut self.host, vnode)?;
                }
                if let Content::Children(children) = &el.content {
                    for child in children {
                        self.invoke_destroy_hook(child)?;
                    }
                }
            }
            VNodeKind::Text(_) => {}
            VNodeKind::Fragment(fragment) => {
                for child in &fragment.children {
                    self.invoke_destroy_hook(child)?;
                }
            }
            VNodeKind::Component(node) => {
                if let Some(instance) = &node.instance {
                    let subtree = instance.take_committed();
                    let result = match &subtree {
                        Some(subtree) => self.invoke_destroy_hook(subtree),
                        None => Ok(()),
                    };
                    instance.restore_committed(subtree);
                    result?;
                    instance.destroy(self.observer.as_deref());
                }
            }
        }
        Ok(())
    }

    /// Commits the instance's pending subtree. Without an explicit position
    /// the instance is located through its current host nodes.
    fn commit_instance(
        &mut self,
        instance: &ComponentInstance,
        pos: Option<Position>,
    ) -> Result<(), RenderError> {
        if !instance.has_pending() {
            trace!("`{}` has nothing pending; commit skipped", instance.name());
            return Ok(());
        }
        let Some(pos) = pos.or_else(|| self.locate(instance)) else {
            return Err(RenderError::Detached {
                component: instance.name(),
            });
        };
        let Some(subtree) = instance.take_pending() else {
            return Ok(());
        };
        let committed = match instance.take_committed() {
            None => {
                let mut subtree = subtree;
                self.create_elm(&mut subtree, pos)?;
                subtree
            }
            Some(previous) => self.patch_root(previous, subtree, pos)?,
        };
        instance.finish_commit(committed);
        trace!("committed `{}` (#{})", instance.name(), instance.id());
        Ok(())
    }

    /// Every committed subtree owns a host node, so the instance is found
    /// through the live tree: the parent of its first node and the sibling
    /// after its last one.
    fn locate(&self, instance: &ComponentInstance) -> Option<Position> {
        let parent = instance
            .first_host_node()
            .and_then(|first| self.host.parent_node(first))?;
        let next = instance
            .last_host_node()
            .and_then(|last| self.host.next_sibling(last));
        Some(Position { parent, next })
    }

    fn patch_vnode(&mut self, old: VNode, new: &mut VNode, pos: Position) -> Result<(), RenderError> {
        debug_assert!(same_vnode(&old, new));
        if !old.is_bound() {
            return self.create_elm(new, pos);
        }
        if let (VNodeKind::Element(old_el), VNodeKind::Element(new_el)) = (&old.kind, &mut new.kind) {
            new_el.elm = old_el.elm;
            let update_hook = new_el.data.hooks.update.clone();
            for module in self.modules.iter_mut() {
                module.update(&mut self.host, &old, new)?;
            }
            if let (Some(elm), Some(hook)) = (new.element_id(), update_hook) {
                hook(elm);
            }
        }
        match (old.kind, &mut new.kind) {
            (VNodeKind::Element(old_el), VNodeKind::Element(new_el)) => {
                if let Some(elm) = old_el.elm {
                    self.patch_content(elm, old_el.content, &mut new_el.content)?;
                }
            }
            (VNodeKind::Text(old_text), VNodeKind::Text(new_text)) => {
                new_text.elm = old_text.elm;
                if let Some(elm) = old_text.elm {
                    if old_text.text != new_text.text {
                        self.host.set_text_content(elm, &new_text.text)?;
                    }
                }
            }
            (VNodeKind::Fragment(old_fragment), VNodeKind::Fragment(new_fragment)) => {
                self.update_children(pos, old_fragment.children, &mut new_fragment.children)?;
            }
            (VNodeKind::Component(old_node), VNodeKind::Component(new_node)) => {
                let Some(instance) = old_node.instance else {
                    return Err(RenderError::MissingInstance {
                        component: old_node.component.name(),
                    });
                };
                new_node.instance = Some(instance.clone());
                instance.set_props(new_node.effective_props());
                instance.render()?;
                self.commit_instance(&instance, Some(pos))?;
            }
            (old, _) => warn!("skipped patch of mismatched node {old:?}"),
        }
        Ok(())
    }

    fn patch_content(
        &mut self,
        elm: NodeId,
        old: Content,
        new: &mut Content,
    ) -> Result<(), RenderError> {
        match (old, new) {
            (Content::Children(old), Content::Children(new)) => {
                self.update_children(Position::append(elm), old, new)
            }
            (Content::Children(old), Content::None) => self.remove_vnodes(old),
            (Content::Children(old), Content::Text(text)) => {
                self.remove_vnodes(old)?;
                self.host.set_text_content(elm, text)?;
                Ok(())
            }
            (Content::Text(_), Content::Children(new)) => {
                self.host.set_text_content(elm, "")?;
                self.add_vnodes(Position::append(elm), new)
            }
            (Content::None, Content::Children(new)) => self.add_vnodes(Position::append(elm), new),
            (Content::Text(old), Content::Text(text)) => {
                if old != *text {
                    self.host.set_text_content(elm, text)?;
                }
                Ok(())
            }
            (Content::None, Content::Text(text)) => {
                self.host.set_text_content(elm, text)?;
                Ok(())
            }
            (Content::Text(_), Content::None) => {
                self.host.set_text_content(elm, "")?;
                Ok(())
            }
            (Content::None, Content::None) => Ok(()),
        }
    }

    /// Keyed four-pointer reconciliation of one sibling list.
    ///
    /// Matches are tried in order: start/start, end/end, start/end (moved
    /// right), end/start (moved left), then a key lookup over the remaining
    /// old range. Reused host nodes are patched and moved; unmatched new
    /// nodes are created; leftovers on the old side are removed last.
    fn update_children(
        &mut self,
        ctx: Position,
        old_children: Vec<VNode>,
        new_children: &mut [VNode],
    ) -> Result<(), RenderError> {
        if old_children.is_empty() {
            return self.add_vnodes(ctx, new_children);
        }
        if new_children.is_empty() {
            return self.remove_vnodes(old_children);
        }
        let mut old: Vec<Option<VNode>> = old_children.into_iter().map(Some).collect();
        let mut old_start: isize = 0;
        let mut old_end = old.len() as isize - 1;
        let mut new_start: isize = 0;
        let mut new_end = new_children.len() as isize - 1;
        let mut key_index: Option<HashMap<Key, usize>> = None;

        while old_start <= old_end && new_start <= new_end {
            let (os, oe) = (old_start as usize, old_end as usize);
            let (ns, ne) = (new_start as usize, new_end as usize);
            if old[os].is_none() {
                old_start += 1;
            } else if old[oe].is_none() {
                old_end -= 1;
            } else if same_slot(&old[os], &new_children[ns]) {
                let next = anchor(&old[os + 1..=oe], &new_children[ne + 1..], ctx.next);
                if let Some(previous) = old[os].take() {
                    self.patch_vnode(previous, &mut new_children[ns], ctx.before(next))?;
                }
                old_start += 1;
                new_start += 1;
            } else if same_slot(&old[oe], &new_children[ne]) {
                let next = anchor(&[], &new_children[ne + 1..], ctx.next);
                if let Some(previous) = old[oe].take() {
                    self.patch_vnode(previous, &mut new_children[ne], ctx.before(next))?;
                }
                old_end -= 1;
                new_end -= 1;
            } else if same_slot(&old[os], &new_children[ne]) {
                let next = anchor(&old[os + 1..=oe], &new_children[ne + 1..], ctx.next);
                if let Some(previous) = old[os].take() {
                    self.patch_vnode(previous, &mut new_children[ne], ctx.before(next))?;
                }
                let before = anchor(&[], &new_children[ne + 1..], ctx.next);
                self.move_before(ctx.parent, &new_children[ne], before)?;
                old_start += 1;
                new_end -= 1;
            } else if same_slot(&old[oe], &new_children[ns]) {
                let next = anchor(&[], &new_children[ne + 1..], ctx.next);
                if let Some(previous) = old[oe].take() {
                    self.patch_vnode(previous, &mut new_children[ns], ctx.before(next))?;
                }
                let before = anchor(&old[os..=oe], &new_children[ne + 1..], ctx.next);
                self.move_before(ctx.parent, &new_children[ns], before)?;
                old_end -= 1;
                new_start += 1;
            } else {
                let index = key_index.get_or_insert_with(|| key_index_of(&old, os, oe));
                let matched = new_children[ns]
                    .key
                    .as_ref()
                    .and_then(|key| index.get(key))
                    .copied()
                    .filter(|idx| same_slot(&old[*idx], &new_children[ns]));
                match matched {
                    Some(idx) => {
                        let next = anchor(&old[idx + 1..=oe], &new_children[ne + 1..], ctx.next);
                        if let Some(previous) = old[idx].take() {
                            self.patch_vnode(previous, &mut new_children[ns], ctx.before(next))?;
                        }
                        let before = anchor(&old[os..=oe], &new_children[ne + 1..], ctx.next);
                        self.move_before(ctx.parent, &new_children[ns], before)?;
                    }
                    None => {
                        let before = anchor(&old[os..=oe], &new_children[ne + 1..], ctx.next);
                        self.create_elm(&mut new_children[ns], ctx.before(before))?;
                    }
                }
                new_start += 1;
            }
        }

        if old_start > old_end {
            if new_start <= new_end {
                let (ns, ne) = (new_start as usize, new_end as usize);
                let before = anchor(&[], &new_children[ne + 1..], ctx.next);
                self.add_vnodes(ctx.before(before), &mut new_children[ns..=ne])?;
            }
        } else if new_start > new_end {
            let stale: Vec<VNode> = old[old_start as usize..=old_end as usize]
                .iter_mut()
                .filter_map(Option::take)
                .collect();
            self.remove_vnodes(stale)?;
        }
        Ok(())
    }

    fn move_before(
        &mut self,
        parent: NodeId,
        vnode: &VNode,
        before: Option<NodeId>,
    ) -> Result<(), RenderError> {
        let handle = vnode.host_handle();
        trace!("moving {:?} before {before:?} in {parent}", handle.nodes());
        fragment::insert_before(&mut self.host, parent, &handle, before)?;
        Ok(())
    }
}

fn same_slot(old: &Option<VNode>, new: &VNode) -> bool {
    old.as_ref().is_some_and(|old| same_vnode(old, new))
}

/// First key wins when old siblings share a key.
fn key_index_of(old: &[Option<VNode>], start: usize, end: usize) -> HashMap<Key, usize> {
    let mut index = HashMap::new();
    for (idx, child) in old.iter().enumerate().take(end + 1).skip(start) {
        if let Some(key) = child.as_ref().and_then(|child| child.key.clone()) {
            index.entry(key).or_insert(idx);
        }
    }
    index
}

/// First host node among the remaining old siblings, then among the already
/// placed new suffix, then the node after the whole list.
fn anchor(old: &[Option<VNode>], placed: &[VNode], fallback: Option<NodeId>) -> Option<NodeId> {
    old.iter()
        .flatten()
        .find_map(VNode::first_host_node)
        .or_else(|| placed.iter().find_map(VNode::first_host_node))
        .or(fallback)
}

#[cfg(test)]
#[path = "tests/patch_tests.rs"]
mod tests;
