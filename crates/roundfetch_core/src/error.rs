use thiserror::Error;

use crate::Phase;

/// Contract violations reported by [`crate::Task`].
///
/// These are programming errors on the caller's side; the task never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("operation {operation} not valid in phase {phase}")]
    Phase {
        operation: &'static str,
        phase: Phase,
    },
    #[error("index {index} out of range (len {len}) in phase {phase}")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        phase: Phase,
    },
    #[error("slot {index} is not set")]
    SlotUnset { index: usize },
    #[error("slot {index} is already set")]
    SlotAlreadySet { index: usize },
    #[error("results are incomplete: {missing} slot(s) unset")]
    ResultsIncomplete { missing: usize },
}
