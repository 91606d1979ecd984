//! Message and sender types for chatledger.
//!
//! Messages are ordered exclusively by the per-session `seq` counter;
//! timestamps are metadata only. Sender is a closed enum so every
//! decision point (dedup, edit eligibility, cascade stop) handles the
//! variants exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Originator of a message within a session.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender IN ('user', 'assistant', 'system'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
            Sender::System => write!(f, "system"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            // Legacy spelling used by earlier exports.
            "ai" => Ok(Sender::Assistant),
            "system" => Ok(Sender::System),
            other => Err(format!("invalid sender: '{other}'")),
        }
    }
}

/// A single message within a session.
///
/// `content` is always stored normalized and `fingerprint` is the
/// SHA-256 of that normalized content; among non-deleted messages of
/// one session at most one User message carries a given fingerprint.
/// `context` is caller-supplied auxiliary text, never computed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender: Sender,
    pub content: String,
    /// Lowercase-hex SHA-256 of the normalized content.
    pub fingerprint: String,
    pub context: Option<String>,
    /// Per-session monotonic sequence number, the sole ordering key.
    pub seq: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
