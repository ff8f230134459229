use vtree_core::{Module, NodeId, RenderError, Renderer, VNode};
use vtree_runtime_std::StdRuntime;

use crate::recording::{HostOp, RecordingHost};

/// Flushes allowed per [`RenderTestRule::pump_until_idle`] before giving up.
pub const MAX_PUMP_ROUNDS: usize = 64;

/// Headless harness for exercising virtual trees in tests.
///
/// `RenderTestRule` owns a recording host with a root element, keeps the
/// last mounted tree so each [`set_content`](Self::set_content) is a patch
/// against the previous one, and drives deferred commits through a
/// [`StdRuntime`] the way an event loop would.
pub struct RenderTestRule {
    runtime: StdRuntime,
    renderer: Renderer<RecordingHost>,
    root: NodeId,
    tree: Option<VNode>,
}

impl RenderTestRule {
    /// Create a rule with the default attribute and listener modules.
    pub fn new() -> Self {
        Self::with_modules(Vec::new())
    }

    /// Create a rule with `extra` modules appended to the defaults.
    pub fn with_modules(extra: Vec<Box<dyn Module>>) -> Self {
        let runtime = StdRuntime::new();
        let mut host = RecordingHost::new();
        let root = host.create_root();
        let mut modules = vtree_core::default_modules();
        modules.extend(extra);
        let renderer = runtime.renderer(host).modules(modules).build();
        Self {
            runtime,
            renderer,
            root,
            tree: None,
        }
    }

    /// Patch the root against `tree`; the first call mounts it.
    pub fn set_content(&mut self, tree: VNode) -> Result<(), RenderError> {
        let old = self.tree.take();
        let mounted = self.renderer.patch(old, tree, self.root)?;
        self.tree = Some(mounted);
        Ok(())
    }

    /// Remove the current tree, if any.
    pub fn clear_content(&mut self) -> Result<(), RenderError> {
        match self.tree.take() {
            Some(tree) => self.renderer.unmount(tree),
            None => Ok(()),
        }
    }

    /// Flush until no more work is requested. Returns the flushes performed.
    pub fn pump_until_idle(&mut self) -> Result<usize, RenderError> {
        let rounds = self
            .runtime
            .run_until_idle(&mut self.renderer, MAX_PUMP_ROUNDS)?;
        if self.renderer.needs_flush() {
            log::warn!("still busy after {MAX_PUMP_ROUNDS} flushes");
        }
        Ok(rounds)
    }

    /// Returns whether the runtime is waiting for a flush.
    pub fn is_idle(&self) -> bool {
        !self.renderer.needs_flush()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Markup of everything under the root.
    pub fn html(&self) -> String {
        self.renderer.host().memory().inner_html(self.root)
    }

    pub fn dump_tree(&self) -> String {
        self.renderer.host().memory().dump_tree(Some(self.root))
    }

    /// The mounted tree from the last successful [`set_content`](Self::set_content).
    pub fn tree(&self) -> Option<&VNode> {
        self.tree.as_ref()
    }

    pub fn host(&self) -> &RecordingHost {
        self.renderer.host()
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        self.renderer.host_mut().take_ops()
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<RecordingHost> {
        &mut self.renderer
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }
}

impl Default for RenderTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `RenderTestRule`.
pub fn run_test_render<R>(f: impl FnOnce(&mut RenderTestRule) -> R) -> R {
    let mut rule = RenderTestRule::new();
    f(&mut rule)
}
