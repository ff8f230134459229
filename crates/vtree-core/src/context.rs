//! Notifications for context registries living outside the core.
//!
//! Providers and consumers are ordinary components built by a helper layer.
//! The renderer only reports the lifecycle events such a layer needs to keep
//! its subscriptions tidy.

use crate::component::InstanceId;

pub trait ContextObserver {
    /// Called once when an instance is destroyed, after its effect teardowns.
    fn instance_unmounted(&self, id: InstanceId);
}
