//! Status - 状態ごとの件数

use serde::Serialize;

use super::lease_manager::LeaseCounts;
use crate::domain::TaskState;

/// Cached tasks per state. Completed tasks are usually evicted, so
/// `completed` only counts ones that were fetched again afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub created: usize,
    pub leased: usize,
    pub running: usize,
    pub failed: usize,
    pub aborted: usize,
    pub paused: usize,
    pub resumed: usize,
    pub started: usize,
    pub stopped: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn from_states(states: impl IntoIterator<Item = TaskState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            let slot = match state {
                TaskState::Created => &mut counts.created,
                TaskState::Leased => &mut counts.leased,
                TaskState::Running => &mut counts.running,
                TaskState::Failed => &mut counts.failed,
                TaskState::Aborted => &mut counts.aborted,
                TaskState::Paused => &mut counts.paused,
                TaskState::Resumed => &mut counts.resumed,
                TaskState::Started => &mut counts.started,
                TaskState::Stopped => &mut counts.stopped,
                TaskState::Completed => &mut counts.completed,
            };
            *slot += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.created
            + self.leased
            + self.running
            + self.failed
            + self.aborted
            + self.paused
            + self.resumed
            + self.started
            + self.stopped
            + self.completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub tasks: TaskCounts,
    pub leases: LeaseCounts,
}
