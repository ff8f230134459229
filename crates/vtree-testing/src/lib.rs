//! Testing utilities and harness for vtree

pub mod modules;
pub mod recording;
pub mod testing;

pub use modules::HeldRemovals;
pub use recording::{HostOp, RecordingHost};
pub use testing::*;

pub mod prelude {
    pub use crate::modules::HeldRemovals;
    pub use crate::recording::{HostOp, RecordingHost};
    pub use crate::testing::*;
}
