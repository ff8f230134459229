#![doc = r"Keyed virtual-tree reconciler with a hook-based component runtime."]

pub mod collections;
pub mod component;
pub mod context;
pub mod error;
pub mod fragment;
pub mod hash;
pub mod hooks;
pub mod host;
pub mod module;
pub mod patch;
pub mod platform;
pub mod runtime;
pub mod vnode;

pub use component::{
    Component, ComponentInstance, InstanceHandle, InstanceId, Lifecycle, Render, RE_RENDER_LIMIT,
};
pub use context::ContextObserver;
pub use error::{HostError, RenderError};
pub use fragment::HostHandle;
pub use hooks::{Dispatcher, EffectResult, EffectScope, MutableRef, Scope, StateSetter};
pub use host::{Host, HostNode, HostNodeKind, MemoryHost};
pub use module::{default_modules, AttributesModule, ListenersModule, Module, RemoveCallback};
pub use patch::{PatchTarget, Renderer, RendererBuilder, Tree};
pub use platform::RuntimeScheduler;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use vnode::{
    same_vnode, Content, Key, Listener, NodeData, NodeHooks, Props, VNode, VNodeKind, Value,
};

#[cfg(test)]
pub use runtime::TestScheduler;

/// Opaque handle to a node owned by a [`Host`].
pub type NodeId = usize;
