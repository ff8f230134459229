//! Virtual node descriptions.
//!
//! A [`VNode`] is an owned description of what the host tree should look
//! like. Once a node has been mounted it also carries the host handles (or
//! component instance) that back it; the renderer moves those handles from
//! the old tree into the new one while patching. Cloning a node yields an
//! unmounted copy of the description, so the same children can be handed to
//! a component on every render.

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use log::warn;

use crate::component::{Component, ComponentInstance};
use crate::fragment::HostHandle;
use crate::hash::fingerprint;
use crate::module::RemoveCallback;
use crate::NodeId;

/// Sibling identity used by the keyed diff.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
    Hash(u64),
}

impl Key {
    /// Builds a key from any hashable value.
    pub fn hashed<T: Hash + ?Sized>(value: &T) -> Self {
        Key::Hash(fingerprint(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => write!(f, "{value:?}"),
            Key::Hash(value) => write!(f, "#{value:016x}"),
        }
    }
}

/// Attribute and prop values.
///
/// Shared payloads compare by identity, the way a host would see a changed
/// object reference.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Any(Rc<dyn Any>),
}

impl Value {
    pub fn any<T: 'static>(value: T) -> Self {
        Value::Any(Rc::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Any(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Any(a), Value::Any(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::Any(value) => write!(f, "<any@{:p}>", Rc::as_ptr(value)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(value) => f.write_str(value),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

/// Event handler attached through [`VNode::on`].
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Value)>);

impl Listener {
    pub fn new(handler: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, payload: &Value) {
        (self.0)(payload)
    }

    pub fn same(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener@{:p}", Rc::as_ptr(&self.0))
    }
}

pub type NodeCallback = Rc<dyn Fn(NodeId)>;
pub type RemoveHook = Rc<dyn Fn(NodeId, RemoveCallback)>;

/// Per-node lifecycle callbacks.
///
/// `insert` runs once the whole patch pass has finished, so the node is
/// attached to the host tree by then. A `remove` hook becomes one of the
/// participants that must call [`RemoveCallback::done`] before the node is
/// detached.
#[derive(Clone, Default)]
pub struct NodeHooks {
    pub(crate) create: Option<NodeCallback>,
    pub(crate) insert: Option<NodeCallback>,
    pub(crate) update: Option<NodeCallback>,
    pub(crate) destroy: Option<NodeCallback>,
    pub(crate) remove: Option<RemoveHook>,
}

impl NodeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.create = Some(Rc::new(hook));
        self
    }

    pub fn on_insert(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.insert = Some(Rc::new(hook));
        self
    }

    pub fn on_update(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.update = Some(Rc::new(hook));
        self
    }

    pub fn on_destroy(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.destroy = Some(Rc::new(hook));
        self
    }

    pub fn on_remove(mut self, hook: impl Fn(NodeId, RemoveCallback) + 'static) -> Self {
        self.remove = Some(Rc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.create.is_none()
            && self.insert.is_none()
            && self.update.is_none()
            && self.destroy.is_none()
            && self.remove.is_none()
    }
}

impl fmt::Debug for NodeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHooks")
            .field("create", &self.create.is_some())
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("destroy", &self.destroy.is_some())
            .field("remove", &self.remove.is_some())
            .finish()
    }
}

/// Element data consumed by modules.
#[derive(Clone, Debug, Default)]
pub struct NodeData {
    pub namespace: Option<Rc<str>>,
    pub attrs: IndexMap<Rc<str>, Value>,
    pub on: IndexMap<Rc<str>, Listener>,
    pub hooks: NodeHooks,
}

/// What an element holds: nothing, child nodes, or a text shorthand.
#[derive(Clone, Debug, Default)]
pub enum Content {
    #[default]
    None,
    Children(Vec<VNode>),
    Text(String),
}

#[derive(Debug)]
pub struct Element {
    pub tag: Rc<str>,
    pub data: NodeData,
    pub content: Content,
    pub(crate) elm: Option<NodeId>,
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            data: self.data.clone(),
            content: self.content.clone(),
            elm: None,
        }
    }
}

#[derive(Debug)]
pub struct Text {
    pub text: String,
    pub(crate) elm: Option<NodeId>,
}

impl Clone for Text {
    fn clone(&self) -> Self {
        Self {
            text: self.text.clone(),
            elm: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Fragment {
    pub children: Vec<VNode>,
}

/// Declared properties handed to a component's render function.
#[derive(Clone, Debug, Default)]
pub struct Props {
    values: IndexMap<Rc<str>, Value>,
    children: Vec<VNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (&**name, value))
    }

    /// Effective props for a render: declared values plus the children
    /// passed to the component node.
    pub(crate) fn merged(&self, children: &[VNode]) -> Props {
        let mut merged = self.clone();
        merged.children = children.to_vec();
        merged
    }
}

pub struct ComponentNode {
    pub component: Component,
    pub props: Props,
    pub children: Vec<VNode>,
    pub(crate) instance: Option<ComponentInstance>,
}

impl ComponentNode {
    pub(crate) fn effective_props(&self) -> Props {
        self.props.merged(&self.children)
    }
}

impl Clone for ComponentNode {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            instance: None,
        }
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("component", &self.component.name())
            .field("props", &self.props)
            .field("children", &self.children.len())
            .field("instance", &self.instance.as_ref().map(ComponentInstance::id))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum VNodeKind {
    Element(Element),
    Text(Text),
    Fragment(Fragment),
    Component(ComponentNode),
}

#[derive(Clone, Debug)]
pub struct VNode {
    pub(crate) key: Option<Key>,
    pub(crate) kind: VNodeKind,
}

impl VNode {
    pub fn element(tag: impl Into<Rc<str>>) -> Self {
        Self {
            key: None,
            kind: VNodeKind::Element(Element {
                tag: tag.into(),
                data: NodeData::default(),
                content: Content::None,
                elm: None,
            }),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            key: None,
            kind: VNodeKind::Text(Text {
                text: text.into(),
                elm: None,
            }),
        }
    }

    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        Self {
            key: None,
            kind: VNodeKind::Fragment(Fragment {
                children: children.into_iter().collect(),
            }),
        }
    }

    pub fn component(component: &Component, props: Props) -> Self {
        Self {
            key: None,
            kind: VNodeKind::Component(ComponentNode {
                component: component.clone(),
                props,
                children: Vec::new(),
                instance: None,
            }),
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        let name: Rc<str> = name.into();
        match &mut self.kind {
            VNodeKind::Element(el) => {
                el.data.attrs.insert(name, value.into());
            }
            VNodeKind::Component(node) => node.props.set(name, value),
            _ => warn!("attribute `{name}` ignored on a non-element node"),
        }
        self
    }

    pub fn on(mut self, event: impl Into<Rc<str>>, listener: Listener) -> Self {
        let event: Rc<str> = event.into();
        if let VNodeKind::Element(el) = &mut self.kind {
            el.data.on.insert(event, listener);
        } else {
            warn!("listener `{event}` ignored on a non-element node");
        }
        self
    }

    pub fn ns(mut self, namespace: impl Into<Rc<str>>) -> Self {
        if let VNodeKind::Element(el) = &mut self.kind {
            el.data.namespace = Some(namespace.into());
        }
        self
    }

    pub fn hooks(mut self, hooks: NodeHooks) -> Self {
        if let VNodeKind::Element(el) = &mut self.kind {
            el.data.hooks = hooks;
        }
        self
    }

    pub fn child(self, child: VNode) -> Self {
        self.children([child])
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        match &mut self.kind {
            VNodeKind::Element(el) => match &mut el.content {
                Content::Children(existing) => existing.extend(children),
                content => *content = Content::Children(children.into_iter().collect()),
            },
            VNodeKind::Fragment(fragment) => fragment.children.extend(children),
            VNodeKind::Component(node) => node.children.extend(children),
            VNodeKind::Text(_) => warn!("children ignored on a text node"),
        }
        self
    }

    /// Text shorthand: the element's only content is a single text node.
    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        if let VNodeKind::Element(el) = &mut self.kind {
            el.content = Content::Text(text.into());
        }
        self
    }

    pub fn get_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn kind(&self) -> &VNodeKind {
        &self.kind
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Element(el) => Some(&el.tag),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&NodeData> {
        match &self.kind {
            VNodeKind::Element(el) => Some(&el.data),
            _ => None,
        }
    }

    /// Host node of an element or text node.
    pub fn element_id(&self) -> Option<NodeId> {
        match &self.kind {
            VNodeKind::Element(el) => el.elm,
            VNodeKind::Text(text) => text.elm,
            _ => None,
        }
    }

    pub fn instance(&self) -> Option<&ComponentInstance> {
        match &self.kind {
            VNodeKind::Component(node) => node.instance.as_ref(),
            _ => None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        match &self.kind {
            VNodeKind::Element(el) => el.elm.is_some(),
            VNodeKind::Text(text) => text.elm.is_some(),
            VNodeKind::Fragment(fragment) => fragment.children.iter().all(VNode::is_mounted),
            VNodeKind::Component(node) => node.instance.is_some(),
        }
    }

    /// Whether patching can reuse this node's host side.
    pub(crate) fn is_bound(&self) -> bool {
        match &self.kind {
            VNodeKind::Element(el) => el.elm.is_some(),
            VNodeKind::Text(text) => text.elm.is_some(),
            VNodeKind::Fragment(_) => true,
            VNodeKind::Component(node) => node.instance.is_some(),
        }
    }

    /// Whether mounting this description creates at least one host node.
    /// Components always do, since an empty render commits a placeholder.
    pub(crate) fn owns_host_node(&self) -> bool {
        match &self.kind {
            VNodeKind::Element(_) | VNodeKind::Text(_) | VNodeKind::Component(_) => true,
            VNodeKind::Fragment(fragment) => fragment.children.iter().any(VNode::owns_host_node),
        }
    }

    /// Host handle backing this node. Components resolve to whatever their
    /// committed subtree resolves to.
    pub fn host_handle(&self) -> HostHandle {
        match &self.kind {
            VNodeKind::Element(el) => el.elm.map_or(HostHandle::Empty, HostHandle::Node),
            VNodeKind::Text(text) => text.elm.map_or(HostHandle::Empty, HostHandle::Node),
            VNodeKind::Fragment(fragment) => {
                HostHandle::Fragment(fragment.children.iter().map(VNode::host_handle).collect())
            }
            VNodeKind::Component(node) => node
                .instance
                .as_ref()
                .map_or(HostHandle::Empty, ComponentInstance::host_handle),
        }
    }

    /// Real host nodes in document order, fragments flattened.
    pub fn host_nodes(&self) -> Vec<NodeId> {
        self.host_handle().nodes()
    }

    pub(crate) fn first_host_node(&self) -> Option<NodeId> {
        match &self.kind {
            VNodeKind::Element(el) => el.elm,
            VNodeKind::Text(text) => text.elm,
            VNodeKind::Fragment(fragment) => {
                fragment.children.iter().find_map(VNode::first_host_node)
            }
            VNodeKind::Component(node) => node
                .instance
                .as_ref()
                .and_then(ComponentInstance::first_host_node),
        }
    }

    pub(crate) fn last_host_node(&self) -> Option<NodeId> {
        match &self.kind {
            VNodeKind::Element(el) => el.elm,
            VNodeKind::Text(text) => text.elm,
            VNodeKind::Fragment(fragment) => {
                fragment.children.iter().rev().find_map(VNode::last_host_node)
            }
            VNodeKind::Component(node) => node
                .instance
                .as_ref()
                .and_then(ComponentInstance::last_host_node),
        }
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::text(text)
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::text(text)
    }
}

/// Two nodes are patchable in place when their keys match and they are the
/// same kind of node: same element tag, or same component definition.
pub fn same_vnode(a: &VNode, b: &VNode) -> bool {
    if a.key != b.key {
        return false;
    }
    match (&a.kind, &b.kind) {
        (VNodeKind::Element(x), VNodeKind::Element(y)) => x.tag == y.tag,
        (VNodeKind::Text(_), VNodeKind::Text(_)) => true,
        (VNodeKind::Fragment(_), VNodeKind::Fragment(_)) => true,
        (VNodeKind::Component(x), VNodeKind::Component(y)) => x.component.same(&y.component),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_vnode_requires_key_and_tag() {
        let a = VNode::element("li").key(1);
        assert!(same_vnode(&a, &VNode::element("li").key(1)));
        assert!(!same_vnode(&a, &VNode::element("li").key(2)));
        assert!(!same_vnode(&a, &VNode::element("div").key(1)));
        assert!(!same_vnode(&a, &VNode::element("li")));
    }

    #[test]
    fn text_and_fragment_match_their_own_kind() {
        assert!(same_vnode(&VNode::text("a"), &VNode::text("b")));
        assert!(same_vnode(
            &VNode::fragment(Vec::new()),
            &VNode::fragment(vec![VNode::text("x")])
        ));
        assert!(!same_vnode(&VNode::text("a"), &VNode::fragment(Vec::new())));
    }

    #[test]
    fn components_match_by_definition_identity() {
        let first = Component::new("Item", |_, _| VNode::text("x"));
        let twin = Component::new("Item", |_, _| VNode::text("x"));
        let a = VNode::component(&first, Props::new());
        assert!(same_vnode(&a, &VNode::component(&first, Props::new())));
        assert!(!same_vnode(&a, &VNode::component(&twin, Props::new())));
    }

    #[test]
    fn clone_drops_host_bindings() {
        let mut node = VNode::element("p").text_content("hi");
        if let VNodeKind::Element(el) = &mut node.kind {
            el.elm = Some(9);
        }
        assert_eq!(node.element_id(), Some(9));
        let copy = node.clone();
        assert_eq!(copy.element_id(), None);
        assert_eq!(copy.tag(), Some("p"));
    }

    #[test]
    fn text_shorthand_is_replaced_by_children() {
        let node = VNode::element("p")
            .text_content("old")
            .child(VNode::text("new"));
        match node.kind() {
            VNodeKind::Element(el) => {
                assert!(matches!(&el.content, Content::Children(children) if children.len() == 1))
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn shared_values_compare_by_identity() {
        let payload = Rc::new(5u8) as Rc<dyn Any>;
        let a = Value::Any(payload.clone());
        let b = Value::Any(payload);
        assert_eq!(a, b);
        assert_ne!(a, Value::any(5u8));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::from("x"), Value::Str(Rc::from("x")));
    }

    #[test]
    fn hashed_keys_are_deterministic() {
        assert_eq!(Key::hashed(&("row", 3)), Key::hashed(&("row", 3)));
        assert_ne!(Key::hashed("a"), Key::hashed("b"));
    }

    #[test]
    fn props_merge_children() {
        let props = Props::new().with("title", "x");
        let merged = props.merged(&[VNode::text("c")]);
        assert_eq!(merged.str("title"), Some("x"));
        assert_eq!(merged.children().len(), 1);
        assert!(props.children().is_empty());
    }
}
