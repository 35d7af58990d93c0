//! Events flowing from workers to the controller.

use std::fmt;

use super::TaskId;

/// One message on the event queue.
///
/// Produced by workers, consumed exactly once by the controller. Events from
/// a single worker arrive in program order (every `Log` for a task precedes
/// its terminal event); nothing is guaranteed across workers.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// Diagnostic text from a worker (start/termination notices).
    Message(String),
    TaskRunning(TaskId),
    TaskFinished(TaskId),
    TaskFailed(TaskId),
    /// A chunk of captured console output.
    Log { owner: LogOwner, chunk: String },
}

/// Who produced a captured chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogOwner {
    Task(TaskId),
    Worker(usize),
}

impl fmt::Display for LogOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => id.fmt(f),
            Self::Worker(n) => write!(f, "worker-{n}"),
        }
    }
}
