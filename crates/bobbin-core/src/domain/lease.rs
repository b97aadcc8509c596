//! Lease record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LeaseId, TaskId};

/// A time-bounded, owner-identified grant over one task.
///
/// `task_id` is a back-reference, not ownership: the task may be deleted or
/// completed while the lease is still on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub task_id: TaskId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Lease {
    pub fn new(
        id: LeaseId,
        task_id: TaskId,
        duration: Duration,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let owner = owner.into();
        Self {
            id,
            task_id,
            created_at: now,
            expires_at: now + duration,
            created_by: owner.clone(),
            updated_at: now,
            updated_by: owner,
        }
    }

    /// Expiry is evaluated lazily: a lease is expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.created_by == owner
    }

    /// Move the deadline to `expires_at`, recording who did it.
    pub fn extend_to(&mut self, expires_at: DateTime<Utc>, owner: &str, now: DateTime<Utc>) {
        self.expires_at = expires_at;
        self.updated_at = now;
        self.updated_by = owner.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn sample(now: DateTime<Utc>) -> Lease {
        Lease::new(
            LeaseId::from_ulid(Ulid::new()),
            TaskId::from_ulid(Ulid::new()),
            Duration::minutes(1),
            "alice",
            now,
        )
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let lease = sample(now);

        assert!(!lease.is_expired(now));
        assert!(!lease.is_expired(lease.expires_at));
        assert!(lease.is_expired(lease.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn new_lease_is_stamped_with_owner() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let lease = sample(now);

        assert_eq!(lease.created_by, "alice");
        assert_eq!(lease.updated_by, "alice");
        assert_eq!(lease.expires_at, now + Duration::minutes(1));
        assert!(lease.is_owned_by("alice"));
        assert!(!lease.is_owned_by("bob"));
    }

    #[test]
    fn json_field_names_are_snake_case() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let value = serde_json::to_value(sample(now)).unwrap();
        for field in [
            "id",
            "task_id",
            "created_at",
            "expires_at",
            "created_by",
            "updated_at",
            "updated_by",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }
}
