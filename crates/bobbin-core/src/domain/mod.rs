//! Domain model (IDs, task and lease records, errors).

pub mod errors;
pub mod ids;
pub mod lease;
pub mod task;

pub use errors::{BobbinError, ErrorKind};
pub use ids::{IdParseError, LeaseId, TaskId};
pub use lease::Lease;
pub use task::{Task, TaskState, UnknownTaskState};
