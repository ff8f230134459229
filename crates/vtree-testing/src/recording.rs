use indexmap::IndexMap;
use vtree_core::{Host, HostError, Listener, MemoryHost, NodeId, Value};

/// One mutation observed by a [`RecordingHost`].
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateElement { id: NodeId, tag: String },
    CreateText { id: NodeId, text: String },
    SetText { id: NodeId, text: String },
    /// `moved` is set when the child was attached somewhere before.
    Insert {
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
        moved: bool,
    },
    Remove { parent: NodeId, child: NodeId },
    SetAttribute { id: NodeId, name: String, value: Value },
    RemoveAttribute { id: NodeId, name: String },
    AddListener { id: NodeId, event: String },
    RemoveListener { id: NodeId, event: String },
}

impl HostOp {
    pub fn name(&self) -> &'static str {
        match self {
            HostOp::CreateElement { .. } => "create_element",
            HostOp::CreateText { .. } => "create_text",
            HostOp::SetText { .. } => "set_text",
            HostOp::Insert { moved: true, .. } => "move",
            HostOp::Insert { .. } => "insert",
            HostOp::Remove { .. } => "remove",
            HostOp::SetAttribute { .. } => "set_attribute",
            HostOp::RemoveAttribute { .. } => "remove_attribute",
            HostOp::AddListener { .. } => "add_listener",
            HostOp::RemoveListener { .. } => "remove_listener",
        }
    }
}

/// [`MemoryHost`] wrapper that logs every mutation it forwards.
#[derive(Debug, Default)]
pub struct RecordingHost {
    inner: MemoryHost,
    ops: Vec<HostOp>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_root(&mut self) -> NodeId {
        self.inner.create_root()
    }

    pub fn memory(&self) -> &MemoryHost {
        &self.inner
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Operation counts keyed by [`HostOp::name`], in first-seen order.
    pub fn op_counts(&self) -> IndexMap<&'static str, usize> {
        let mut counts = IndexMap::new();
        for op in &self.ops {
            *counts.entry(op.name()).or_insert(0) += 1;
        }
        counts
    }

    pub fn count(&self, name: &str) -> usize {
        self.ops.iter().filter(|op| op.name() == name).count()
    }
}

impl Host for RecordingHost {
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<NodeId, HostError> {
        let id = self.inner.create_element(tag, namespace)?;
        self.ops.push(HostOp::CreateElement {
            id,
            tag: tag.to_string(),
        });
        Ok(id)
    }

    fn create_text_node(&mut self, text: &str) -> Result<NodeId, HostError> {
        let id = self.inner.create_text_node(text)?;
        self.ops.push(HostOp::CreateText {
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), HostError> {
        self.inner.set_text_content(node, text)?;
        self.ops.push(HostOp::SetText {
            id: node,
            text: text.to_string(),
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError> {
        let moved = self.inner.parent_node(child).is_some();
        self.inner.insert_before(parent, child, reference)?;
        self.ops.push(HostOp::Insert {
            parent,
            child,
            before: reference,
            moved,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.inner.remove_child(parent, child)?;
        self.ops.push(HostOp::Remove { parent, child });
        Ok(())
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.inner.parent_node(node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.inner.next_sibling(node)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.tag_name(node)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), HostError> {
        self.inner.set_attribute(node, name, value)?;
        self.ops.push(HostOp::SetAttribute {
            id: node,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.inner.remove_attribute(node, name)?;
        self.ops.push(HostOp::RemoveAttribute {
            id: node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.inner.add_listener(node, event, listener)?;
        self.ops.push(HostOp::AddListener {
            id: node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeId, event: &str) -> Result<(), HostError> {
        self.inner.remove_listener(node, event)?;
        self.ops.push(HostOp::RemoveListener {
            id: node,
            event: event.to_string(),
        });
        Ok(())
    }
}
