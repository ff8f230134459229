//! Fragment-aware host operations.
//!
//! A fragment has no host node of its own. Its handle is the ordered list of
//! its children's handles, which may themselves be fragments. The helpers
//! here flatten those handles so inserts, removals and sibling lookups act on
//! every real node in document order.

use crate::error::HostError;
use crate::host::Host;
use crate::NodeId;

/// Host-side handle of a virtual node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HostHandle {
    #[default]
    Empty,
    Node(NodeId),
    Fragment(Vec<HostHandle>),
}

impl HostHandle {
    /// Every real node in document order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<NodeId>) {
        match self {
            HostHandle::Empty => {}
            HostHandle::Node(id) => out.push(*id),
            HostHandle::Fragment(children) => {
                for child in children {
                    child.collect(out);
                }
            }
        }
    }

    pub fn first(&self) -> Option<NodeId> {
        match self {
            HostHandle::Empty => None,
            HostHandle::Node(id) => Some(*id),
            HostHandle::Fragment(children) => children.iter().find_map(HostHandle::first),
        }
    }

    pub fn last(&self) -> Option<NodeId> {
        match self {
            HostHandle::Empty => None,
            HostHandle::Node(id) => Some(*id),
            HostHandle::Fragment(children) => children.iter().rev().find_map(HostHandle::last),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

/// Inserts every node of `handle` before `reference`, or appends when there
/// is no reference.
pub fn insert_before(
    host: &mut dyn Host,
    parent: NodeId,
    handle: &HostHandle,
    reference: Option<NodeId>,
) -> Result<(), HostError> {
    for node in handle.nodes() {
        host.insert_before(parent, node, reference)?;
    }
    Ok(())
}

/// Detaches every node of `handle` from whatever parent currently holds it.
/// Nodes that are already detached are skipped.
pub fn detach(host: &mut dyn Host, handle: &HostHandle) -> Result<(), HostError> {
    for node in handle.nodes() {
        if let Some(parent) = host.parent_node(node) {
            host.remove_child(parent, node)?;
        }
    }
    Ok(())
}

/// The host node following the last node of `handle`.
pub fn next_sibling(host: &dyn Host, handle: &HostHandle) -> Option<NodeId> {
    handle.last().and_then(|last| host.next_sibling(last))
}
