//! Platform abstraction for scheduling deferred commits.
//!
//! Components that update outside of a patch pass leave work on the
//! [`Runtime`](crate::Runtime) queue. The host decides when that work is
//! drained by calling [`Renderer::flush`](crate::Renderer::flush); the
//! scheduler is how the runtime asks for that to happen.

/// Requests flushes on behalf of the runtime.
///
/// Implementations only record or forward the request. The actual drain
/// must happen on the thread that owns the renderer, after the code that
/// triggered the update has returned.
pub trait RuntimeScheduler: Send + Sync {
    /// Ask the host to run [`Renderer::flush`](crate::Renderer::flush) soon.
    fn schedule_flush(&self);
}
