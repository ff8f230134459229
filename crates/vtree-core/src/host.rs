//! Host adapter seam and an in-memory host tree.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::error::HostError;
use crate::vnode::{Listener, Value};
use crate::NodeId;

/// Operations the renderer needs from the real tree it drives.
///
/// Insertion follows DOM semantics: inserting a node that already has a
/// parent moves it, and a `None` reference appends.
pub trait Host {
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<NodeId, HostError>;
    fn create_text_node(&mut self, text: &str) -> Result<NodeId, HostError>;
    /// On a text node replaces its text. On an element replaces all of its
    /// children with a single text node, or with nothing for `""`.
    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), HostError>;
    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError>;
    /// Removal is final. A host may hand the ids of the removed subtree out
    /// again.
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;
    fn parent_node(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    /// Element tag name, `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<String>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), HostError>;
    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;
    /// Installs `listener` for `event`, replacing any previous one.
    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError>;
    fn remove_listener(&mut self, node: NodeId, event: &str) -> Result<(), HostError>;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.insert_before(parent, child, None)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostNodeKind {
    Element {
        tag: String,
        namespace: Option<String>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
pub struct HostNode {
    kind: HostNodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: IndexMap<String, Value>,
    listeners: IndexMap<String, Listener>,
}

impl HostNode {
    fn new(kind: HostNodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &HostNodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.listeners.contains_key(event)
    }
}

/// Arena-backed host tree used by tests, benches and headless apps.
///
/// A removed subtree gives its slots back and later creations reuse them,
/// so a `NodeId` must not be kept past the removal of its node.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Option<HostNode>>,
    free: Vec<NodeId>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached `root` element to mount into.
    pub fn create_root(&mut self) -> NodeId {
        self.push(HostNodeKind::Element {
            tag: "root".to_string(),
            namespace: None,
        })
    }

    fn push(&mut self, kind: HostNodeKind) -> NodeId {
        let node = HostNode::new(kind);
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&HostNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut HostNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(HostError::Missing { id })
    }

    /// Takes `id` and its descendants out of the arena.
    fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(id).and_then(Option::take) {
                pending.extend(node.children);
                self.free.push(id);
            }
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut HostNode, HostError> {
        let node = self.node_mut(id)?;
        match node.kind {
            HostNodeKind::Element { .. } => Ok(node),
            HostNodeKind::Text(_) => Err(HostError::NotAnElement { id }),
        }
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |node| &node.children)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.node(id).and_then(|node| node.attributes.get(name))
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            HostNodeKind::Text(text) => out.push_str(text),
            HostNodeKind::Element { .. } => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Invokes the listener registered for `event`. Returns whether one ran.
    pub fn dispatch(&self, id: NodeId, event: &str, payload: &Value) -> bool {
        let listener = self
            .node(id)
            .and_then(|node| node.listeners.get(event))
            .cloned();
        match listener {
            Some(listener) => {
                listener.call(payload);
                true
            }
            None => false,
        }
    }

    /// Compact markup of the children of `id`, e.g. `<li id="a">x</li>text`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            HostNodeKind::Text(text) => out.push_str(text),
            HostNodeKind::Element { tag, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    pub fn dump_tree(&self, root: Option<NodeId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Some(node) => {
                match &node.kind {
                    HostNodeKind::Element { tag, .. } => {
                        let _ = writeln!(output, "{indent}[{id}] <{tag}>");
                    }
                    HostNodeKind::Text(text) => {
                        let _ = writeln!(output, "{indent}[{id}] {text:?}");
                    }
                }
                for child in &node.children {
                    self.dump_node(output, *child, depth + 1);
                }
            }
            None => {
                let _ = writeln!(output, "{indent}[{id}] (missing)");
            }
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|node| node.parent) else {
            return;
        };
        if let Ok(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|id| *id != child);
        }
        if let Ok(node) = self.node_mut(child) {
            node.parent = None;
        }
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<NodeId, HostError> {
        Ok(self.push(HostNodeKind::Element {
            tag: tag.to_string(),
            namespace: namespace.map(str::to_string),
        }))
    }

    fn create_text_node(&mut self, text: &str) -> Result<NodeId, HostError> {
        Ok(self.push(HostNodeKind::Text(text.to_string())))
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), HostError> {
        let target = self.node_mut(node)?;
        if let HostNodeKind::Text(current) = &mut target.kind {
            *current = text.to_string();
            return Ok(());
        }
        let children = std::mem::take(&mut target.children);
        for child in children {
            self.release(child);
        }
        if !text.is_empty() {
            let text_node = self.push(HostNodeKind::Text(text.to_string()));
            self.insert_before(node, text_node, None)?;
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError> {
        self.element_mut(parent)?;
        self.node_mut(child)?;
        if reference == Some(child) {
            return Ok(());
        }
        if let Some(reference) = reference {
            let owner = self.node_mut(reference)?.parent;
            if owner != Some(parent) {
                return Err(HostError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }
        self.detach(child);
        let parent_node = self.element_mut(parent)?;
        let index = reference
            .and_then(|reference| parent_node.children.iter().position(|id| *id == reference))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        if self.node_mut(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child);
        self.release(child);
        Ok(())
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|node| node.parent)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_node(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|id| *id == node)?;
        siblings.get(index + 1).copied()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.kind {
            HostNodeKind::Element { tag, .. } => Some(tag.clone()),
            HostNodeKind::Text(_) => None,
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), HostError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.element_mut(node)?.attributes.shift_remove(name);
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.element_mut(node)?
            .listeners
            .insert(event.to_string(), listener.clone());
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeId, event: &str) -> Result<(), HostError> {
        self.element_mut(node)?.listeners.shift_remove(event);
        Ok(())
    }
}
