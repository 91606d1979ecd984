//! MessageRepository trait definition.
//!
//! Storage port for message records. Implementations live in
//! chatledger-infra (e.g., `SqliteMessageRepository`). Every multi-step
//! mutation declared here (insert with sequence assignment, edit plus
//! cascade, paired delete, bulk tombstone) must execute as a single
//! atomic unit against the store.

use chatledger_types::error::RepositoryError;
use chatledger_types::message::Message;
use uuid::Uuid;

/// Repository trait for message persistence.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait MessageRepository: Send + Sync {
    /// Insert a new message, assigning the next per-session sequence
    /// number atomically with the insert. The caller's `seq` field is
    /// a placeholder; the returned message carries the assigned value.
    ///
    /// A duplicate active User fingerprint in the same session (two
    /// concurrent identical appends racing past the service pre-check)
    /// surfaces as `Conflict` from the partial unique index.
    fn insert(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Get a message by id, scoped to a session. Deleted rows are
    /// still found.
    fn get_in_session(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Find the active User message in a session carrying the given
    /// fingerprint, if any.
    fn find_active_user_by_fingerprint(
        &self,
        session_id: &Uuid,
        fingerprint: &str,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Ordered paged scan by session, sequence ascending. `active_only`
    /// filters out tombstoned rows.
    fn list_ordered(
        &self,
        session_id: &Uuid,
        active_only: bool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Apply a user edit and its cascade invalidation in one
    /// transaction: rewrite the edited message's content, fingerprint,
    /// and updated_at, then tombstone every active Assistant message
    /// following it in sequence order, stopping at the first active
    /// User or System message. The boundary scan runs inside the same
    /// transaction, so a reply committed by a concurrent turn is still
    /// swept. Returns the number of replies tombstoned.
    fn apply_user_edit(
        &self,
        updated: &Message,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Tombstone a message in one transaction; when the target is a
    /// User message and the immediately following active message is an
    /// Assistant reply, that reply is tombstoned too. A tombstoned
    /// target is a no-op. Returns whether a paired reply was swept.
    fn soft_delete_paired(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Tombstone every message in a session. Used only by the
    /// session-level delete cascade. Returns the number of rows newly
    /// tombstoned.
    fn soft_delete_all_in_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
