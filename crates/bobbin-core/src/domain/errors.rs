//! Errors - エラー型と分類
//!
//! Managers return `BobbinError`; the transport side maps `ErrorKind` to its
//! own failure codes and must not swallow any kind.

use thiserror::Error;

use super::ids::{IdParseError, LeaseId, TaskId};
use super::task::UnknownTaskState;
use crate::ports::StoreError;

/// ErrorKind は失敗の分類（transport でのマッピング用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Expired,
    PermissionDenied,
    NotAvailable,
    Storage,
}

#[derive(Debug, Error)]
pub enum BobbinError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("lease not found: {0}")]
    LeaseNotFound(LeaseId),

    #[error("task {task_id} is already leased by {lease_id} until it expires")]
    LeaseConflict { task_id: TaskId, lease_id: LeaseId },

    #[error("lease {0} has expired")]
    LeaseExpired(LeaseId),

    #[error("lease {lease_id} belongs to '{owner}', not '{requested_by}'")]
    PermissionDenied {
        lease_id: LeaseId,
        owner: String,
        requested_by: String,
    },

    #[error("no unleased task available")]
    NoUnleasedTask,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl BobbinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BobbinError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BobbinError::TaskNotFound(_) | BobbinError::LeaseNotFound(_) => ErrorKind::NotFound,
            BobbinError::LeaseConflict { .. } => ErrorKind::Conflict,
            BobbinError::LeaseExpired(_) => ErrorKind::Expired,
            BobbinError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            BobbinError::NoUnleasedTask => ErrorKind::NotAvailable,
            BobbinError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<IdParseError> for BobbinError {
    fn from(err: IdParseError) -> Self {
        BobbinError::InvalidArgument(err.to_string())
    }
}

impl From<UnknownTaskState> for BobbinError {
    fn from(err: UnknownTaskState) -> Self {
        BobbinError::InvalidArgument(err.to_string())
    }
}
