//! Standard runtime services backed by Rust's `std` library.
//!
//! Updates made by components only queue work; the thread owning the
//! [`Renderer`] drains it later. [`StdRuntime::run_until_idle`] is that drain
//! for tests and headless loops, and [`StdScheduler`] is how an event loop
//! learns that a drain is due.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::trace;
use vtree_core::{Host, RenderError, Renderer, RendererBuilder, Runtime, RuntimeHandle, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Flush requests from a `vtree-core` runtime, as seen by an event loop.
///
/// The request is a latch. The first `schedule_flush` after the owner took
/// the previous request sets it and calls the waker; further requests before
/// the owner polls with [`take_flush_request`](Self::take_flush_request)
/// only bump [`requests`](Self::requests). One wake therefore stands for one
/// drain, however many updates piled up behind it. The waker runs on the
/// thread that requested the flush and must not drain the renderer itself.
pub struct StdScheduler {
    latched: AtomicBool,
    requests: AtomicUsize,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            latched: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            waker: RwLock::new(None),
        }
    }

    /// Releases the latch. Returns whether a flush was requested since the
    /// previous call.
    pub fn take_flush_request(&self) -> bool {
        self.latched.swap(false, Ordering::AcqRel)
    }

    /// Total `schedule_flush` calls, latched or not.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.replace_waker(Some(Arc::new(waker)));
    }

    pub fn clear_flush_waker(&self) {
        self.replace_waker(None);
    }

    fn replace_waker(&self, waker: Option<Waker>) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = waker;
    }

    fn current_waker(&self) -> Option<Waker> {
        self.waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("latched", &self.latched.load(Ordering::Acquire))
            .field("requests", &self.requests())
            .field("has_waker", &self.current_waker().is_some())
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_flush(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if self.latched.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(waker) = self.current_waker() {
            waker();
        }
    }
}

/// Convenience container bundling the standard scheduler with a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    /// Returns a [`vtree_core::Runtime`] wired to the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Starts a renderer over `host` that shares this runtime.
    pub fn renderer<H: Host>(&self, host: H) -> RendererBuilder<H> {
        Renderer::builder(host).runtime(self.runtime())
    }

    /// Returns whether a flush was requested since the last poll.
    pub fn take_flush_request(&self) -> bool {
        self.scheduler.take_flush_request()
    }

    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_flush_waker(waker);
    }

    pub fn clear_flush_waker(&self) {
        self.scheduler.clear_flush_waker();
    }

    /// Flushes `renderer` while flush requests keep arriving, at most
    /// `max_rounds` times. Returns the number of flushes performed.
    pub fn run_until_idle<H: Host>(
        &self,
        renderer: &mut Renderer<H>,
        max_rounds: usize,
    ) -> Result<usize, RenderError> {
        let mut rounds = 0;
        while rounds < max_rounds && (self.take_flush_request() || renderer.needs_flush()) {
            renderer.flush()?;
            rounds += 1;
        }
        trace!("runtime idle after {rounds} flushes");
        Ok(rounds)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("needs_flush", &self.runtime.needs_flush())
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
