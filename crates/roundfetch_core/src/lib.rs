//! Roundfetch core: pure two-phase pagination state machine.
mod error;
mod phase;
mod task;

pub use error::TaskError;
pub use phase::Phase;
pub use task::Task;
