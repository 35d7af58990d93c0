//! Task life cycle and aggregate status counts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Life cycle of one task.
///
/// Transitions only move forward (`Waiting` → `Running` → terminal);
/// `Finished` and `Failed` are terminal and never change again. The pool is
/// the only writer, and only in response to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Running,
    Finished,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Counts by status at the moment of the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub waiting: usize,
    pub running: usize,
    pub failed: usize,
    pub finished: usize,
    pub total: usize,
}

impl StatusSnapshot {
    pub fn from_statuses(statuses: &[TaskStatus]) -> Self {
        let mut snapshot = Self {
            total: statuses.len(),
            ..Self::default()
        };
        for status in statuses {
            match status {
                TaskStatus::Waiting => snapshot.waiting += 1,
                TaskStatus::Running => snapshot.running += 1,
                TaskStatus::Finished => snapshot.finished += 1,
                TaskStatus::Failed => snapshot.failed += 1,
            }
        }
        snapshot
    }

    /// Completion predicate: every known task reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.finished + self.failed == self.total
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "waiting={} running={} failed={} finished={} total={}",
            self.waiting, self.running, self.failed, self.finished, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_finished_and_failed_are_terminal() {
        assert!(!TaskStatus::Waiting.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Finished.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn snapshot_counts_each_status() {
        let statuses = [
            TaskStatus::Waiting,
            TaskStatus::Running,
            TaskStatus::Finished,
            TaskStatus::Finished,
            TaskStatus::Failed,
        ];
        let snapshot = StatusSnapshot::from_statuses(&statuses);
        assert_eq!(snapshot.waiting, 1);
        assert_eq!(snapshot.running, 1);
        assert_eq!(snapshot.finished, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.total, 5);
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn empty_registry_is_complete() {
        assert!(StatusSnapshot::from_statuses(&[]).is_complete());
    }

    #[test]
    fn snapshot_serializes_round_trip() {
        let snapshot = StatusSnapshot {
            waiting: 0,
            running: 0,
            failed: 1,
            finished: 2,
            total: 3,
        };
        let serialized = serde_json::to_string(&snapshot).unwrap();
        let deserialized: StatusSnapshot = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, snapshot);
    }

    #[test]
    fn display_matches_report_format() {
        let snapshot = StatusSnapshot {
            waiting: 0,
            running: 0,
            failed: 0,
            finished: 3,
            total: 3,
        };
        assert_eq!(
            snapshot.to_string(),
            "waiting=0 running=0 failed=0 finished=3 total=3"
        );
    }
}
