//! Domain model (ids, statuses, tasks, events).

pub mod events;
pub mod ids;
pub mod status;
pub mod task;

pub use events::{LogOwner, PoolEvent};
pub use ids::TaskId;
pub use status::{StatusSnapshot, TaskStatus};
pub use task::{TaskError, TaskFn};
