//! Domain identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a task, assigned as 0, 1, 2, ... in submission order.
///
/// The id doubles as the index into the submission-ordered definitions
/// table, so lookups on the worker side are a plain slice access.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Index into the definitions table the workers hold.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
