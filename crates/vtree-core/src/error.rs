use thiserror::Error;

use crate::NodeId;

/// Failures reported by a [`Host`](crate::Host) adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host node {id} missing")]
    Missing { id: NodeId },
    #[error("host node {id} cannot hold children")]
    NotAnElement { id: NodeId },
    #[error("host node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("host adapter failure: {0}")]
    Adapter(String),
}

/// Errors surfaced by patching, rendering and dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(
        "too many re-renders of `{component}` ({attempts} attempts); \
         rendering stopped to prevent an infinite loop"
    )]
    TooManyReRenders {
        component: &'static str,
        attempts: usize,
    },
    #[error(
        "nothing was returned from render of `{component}`; \
         return `Render::Empty` to render nothing"
    )]
    NothingReturned { component: &'static str },
    #[error("adjacent nodes must be wrapped in an enclosing node; did you want a fragment?")]
    UnwrappedSiblings,
    #[error("component `{component}` has no live instance")]
    MissingInstance { component: &'static str },
    #[error("component `{component}` is not attached to a host parent")]
    Detached { component: &'static str },
    #[error(transparent)]
    Host(#[from] HostError),
}
