//! SessionRepository trait definition.
//!
//! Storage port for session records. Implementations live in
//! chatledger-infra (e.g., `SqliteSessionRepository`) and must expose a
//! uniqueness constraint on (owner_id, title) among non-deleted
//! sessions, reporting its violation as `RepositoryError::Conflict` so
//! callers can distinguish it from other write errors.

use chatledger_types::error::RepositoryError;
use chatledger_types::session::Session;
use uuid::Uuid;

/// Repository trait for session persistence.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionRepository: Send + Sync {
    /// Insert a new session. A concurrent writer holding the same
    /// (owner_id, title) key surfaces as `Conflict`.
    fn insert(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Get a session by id, deleted or not.
    fn get_by_id(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Find the active (non-deleted) session for an owner and
    /// normalized title, if any.
    fn find_active_by_owner_and_title(
        &self,
        owner_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Whether the owner has ever had any session, deleted or not.
    fn exists_by_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Update a session's fields under an optimistic version check.
    ///
    /// `session.version` must be the version the caller last read; the
    /// stored row is updated and its version incremented only when the
    /// versions match. A mismatch on an existing row is `Conflict`,
    /// an unknown id is `NotFound`. Returns the session with the new
    /// version.
    fn update_with_version(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// List active (non-deleted) sessions for an owner, newest first.
    fn list_active_by_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// List active favorite sessions for an owner, newest first.
    fn list_favorites_by_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;
}
