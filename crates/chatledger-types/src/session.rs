//! Session type for chatledger.
//!
//! A session is a named, owner-scoped conversation thread. At most one
//! non-deleted session exists per (owner_id, normalized title) pair;
//! the store enforces this with a partial unique index and the write
//! path pre-checks it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named conversation thread belonging to a single owner.
///
/// Sessions are soft-deleted only; `deleted` rows stay queryable by id.
/// The `version` counter backs optimistic concurrency: every successful
/// field update increments it, and a writer carrying a stale version is
/// rejected with a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: String,
    /// Normalized title (trimmed, internal whitespace collapsed).
    pub title: String,
    pub favorite: bool,
    pub deleted: bool,
    /// Optimistic concurrency counter, incremented on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh active session with version 0 and both timestamps
    /// set to now.
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id: owner_id.into(),
            title: title.into(),
            favorite: false,
            deleted: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("u1", "Trip planning");
        assert_eq!(session.owner_id, "u1");
        assert_eq!(session.title, "Trip planning");
        assert!(!session.favorite);
        assert!(!session.deleted);
        assert_eq!(session.version, 0);
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_session_serialize() {
        let session = Session::new("u1", "Trip planning");
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"owner_id\":\"u1\""));
        assert!(json.contains("\"version\":0"));
    }
}
