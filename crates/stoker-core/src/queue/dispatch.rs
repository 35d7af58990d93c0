//! Dispatch queue: task ids from the controller down to the workers.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use tokio::time::Duration;

use crate::domain::TaskId;

/// FIFO of task ids awaiting execution.
///
/// Design:
/// - The controller owns the write end and fills it before workers start.
/// - The pop is atomic, so no id reaches two workers.
/// - A pop on an empty queue waits a bounded interval for a push and
///   re-checks once before reporting emptiness. An emptiness snapshot taken
///   separately from the pop would let two workers race and strand an id;
///   the bounded wait closes that gap.
pub struct DispatchQueue {
    state: Mutex<VecDeque<TaskId>>,
    notify: Notify,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, id: TaskId) {
        self.state.lock().await.push_back(id);
        self.notify.notify_one();
    }

    /// Pop the next id, or `None` once the queue stays empty through
    /// `idle_wait`. `None` is the worker's signal to exit.
    pub async fn pop(&self, idle_wait: Duration) -> Option<TaskId> {
        if let Some(id) = self.state.lock().await.pop_front() {
            return Some(id);
        }

        tokio::select! {
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(idle_wait) => {}
        }

        self.state.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
