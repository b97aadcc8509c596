//! Task record and its state machine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Task state.
///
/// State transitions:
/// - Created -> Leased -> (Running | Failed | Aborted | Paused | Resumed) -> Completed
/// - Started / Stopped are accepted as worker-reported intermediate states.
///
/// Only `Completed` and `Aborted` are terminal. Transitions requested through
/// `UpdateTask` are not checked for legality; the caller owns that decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Initial state, eligible for leasing.
    Created,

    /// A lease has been granted for this task.
    Leased,

    Running,
    Failed,
    Aborted,
    Paused,
    Resumed,
    Started,
    Stopped,

    /// Finished; the task is evicted from the cache once it gets here.
    Completed,
}

impl TaskState {
    pub const ALL: [TaskState; 10] = [
        TaskState::Created,
        TaskState::Leased,
        TaskState::Running,
        TaskState::Failed,
        TaskState::Aborted,
        TaskState::Paused,
        TaskState::Resumed,
        TaskState::Started,
        TaskState::Stopped,
        TaskState::Completed,
    ];

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Leased => "leased",
            TaskState::Running => "running",
            TaskState::Failed => "failed",
            TaskState::Aborted => "aborted",
            TaskState::Paused => "paused",
            TaskState::Resumed => "resumed",
            TaskState::Started => "started",
            TaskState::Stopped => "stopped",
            TaskState::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized task state '{0}'")]
pub struct UnknownTaskState(pub String);

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TaskState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownTaskState(s.to_string()))
    }
}

/// A unit of work with persistent identity.
///
/// This is the record written to `tasks/<id>.json`; every field below is
/// persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: TaskState,

    /// Caller-defined bytes, stored base64-encoded.
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: HashMap<String, String>,
}

impl Task {
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        description: impl Into<String>,
        payload: Vec<u8>,
        metadata: HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            state: TaskState::Created,
            payload,
            metadata,
        }
    }

    /// Overwrite state and payload.
    pub fn apply_update(&mut self, state: TaskState, payload: Vec<u8>, now: DateTime<Utc>) {
        self.state = state;
        self.payload = payload;
        self.touch(now);
    }

    pub fn mark_leased(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Leased;
        self.touch(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Completed;
        self.touch(now);
    }

    // updated_at never moves backwards, even if the clock does.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at);
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

mod payload_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
