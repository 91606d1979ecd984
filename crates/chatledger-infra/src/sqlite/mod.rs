//! SQLite persistence for chatledger.
//!
//! Repository implementations over a split reader/writer pool in WAL
//! mode. Raw queries with private Row structs; no ORM.

pub mod message;
pub mod pool;
pub mod session;

pub use message::SqliteMessageRepository;
pub use pool::DatabasePool;
pub use session::SqliteSessionRepository;

use chatledger_types::error::RepositoryError;
use chrono::{DateTime, Utc};

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
