//! Session store orchestrating session identity, uniqueness, and
//! soft-delete.
//!
//! Generic over `SessionRepository` and `MessageRepository` (the latter
//! for the delete cascade) to maintain clean architecture:
//! chatledger-core never depends on chatledger-infra.

use chatledger_types::error::{ChatError, RepositoryError};
use chatledger_types::session::Session;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::fingerprint::normalize;
use crate::message::repository::MessageRepository;
use crate::session::repository::SessionRepository;

/// Owns session lifecycle: create-or-get, rename, favorite flag, and
/// cascading soft-delete.
///
/// All field updates go through the repository's version-checked write,
/// so a stale concurrent update is rejected with `Conflict` rather than
/// overwritten.
pub struct SessionStore<S: SessionRepository, M: MessageRepository> {
    sessions: S,
    messages: M,
}

impl<S: SessionRepository, M: MessageRepository> SessionStore<S, M> {
    pub fn new(sessions: S, messages: M) -> Self {
        Self { sessions, messages }
    }

    /// Access the session repository.
    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Idempotent create: return the owner's existing active session
    /// for the normalized title if present, else create one.
    ///
    /// Race policy: when two concurrent creations target the same key,
    /// exactly one insert wins; the loser observes the store's
    /// uniqueness violation and reports it as `Conflict`. It never
    /// silently merges into the winner.
    pub async fn create_or_get(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<Session, ChatError> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(ChatError::InvalidArgument("owner id must not be empty".to_string()));
        }
        let title = normalize(Some(title));
        if title.is_empty() {
            return Err(ChatError::InvalidArgument("title must not be empty".to_string()));
        }

        if let Some(existing) = self
            .sessions
            .find_active_by_owner_and_title(owner_id, &title)
            .await?
        {
            debug!(session_id = %existing.id, owner_id, "Reusing existing session");
            return Ok(existing);
        }

        let session = Session::new(owner_id, title);
        let created = match self.sessions.insert(&session).await {
            Ok(created) => created,
            Err(RepositoryError::Conflict(msg)) => {
                warn!(owner_id, title = %session.title, "Unique constraint hit on session create");
                return Err(ChatError::Conflict(msg));
            }
            Err(e) => return Err(e.into()),
        };
        info!(session_id = %created.id, owner_id, "Session created");
        Ok(created)
    }

    /// Get a session by id. Deleted sessions are still found, to
    /// support status queries; only an id that never existed is
    /// `NotFound`.
    pub async fn get(&self, id: &Uuid) -> Result<Session, ChatError> {
        self.sessions
            .get_by_id(id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("session not found: {id}")))
    }

    /// Rename a session. An unchanged normalized title still refreshes
    /// `updated_at`; a title held by another active session of the
    /// same owner is `Conflict` (pre-checked, with the store constraint
    /// as the race backstop).
    pub async fn rename(&self, id: &Uuid, new_title: &str) -> Result<Session, ChatError> {
        let mut session = self.get(id).await?;
        let title = normalize(Some(new_title));
        if title.is_empty() {
            return Err(ChatError::InvalidArgument("title must not be empty".to_string()));
        }

        if title != session.title {
            if let Some(other) = self
                .sessions
                .find_active_by_owner_and_title(&session.owner_id, &title)
                .await?
            {
                if other.id != session.id {
                    warn!(session_id = %id, owner_id = %session.owner_id, title, "Duplicate rename blocked");
                    return Err(ChatError::Conflict(
                        "another session with the same title already exists for this owner"
                            .to_string(),
                    ));
                }
            }
        }

        session.title = title;
        session.updated_at = Utc::now();
        let updated = self.sessions.update_with_version(&session).await?;
        info!(session_id = %id, "Session renamed");
        Ok(updated)
    }

    /// Set or clear the favorite flag, under the same optimistic
    /// version discipline as rename.
    pub async fn mark_favorite(&self, id: &Uuid, favorite: bool) -> Result<Session, ChatError> {
        let mut session = self.get(id).await?;
        session.favorite = favorite;
        session.updated_at = Utc::now();
        let updated = self.sessions.update_with_version(&session).await?;
        info!(session_id = %id, favorite, "Session favorite flag updated");
        Ok(updated)
    }

    /// Soft-delete a session and all of its messages.
    ///
    /// Idempotent: deleting an already-deleted session succeeds as a
    /// no-op. The session row is tombstoned first, then the message
    /// cascade runs.
    pub async fn soft_delete(&self, id: &Uuid) -> Result<(), ChatError> {
        let mut session = self.get(id).await?;
        if session.deleted {
            info!(session_id = %id, "Session already deleted");
            return Ok(());
        }

        session.deleted = true;
        session.updated_at = Utc::now();
        self.sessions.update_with_version(&session).await?;

        let tombstoned = self.messages.soft_delete_all_in_session(id).await?;
        info!(session_id = %id, messages = tombstoned, "Session and its messages soft deleted");
        Ok(())
    }

    /// List the owner's active sessions.
    ///
    /// An owner who never had any session at all is `NotFound`; an
    /// owner whose sessions are all deleted gets an empty list.
    pub async fn list_active(&self, owner_id: &str) -> Result<Vec<Session>, ChatError> {
        self.ensure_owner_known(owner_id).await?;
        Ok(self.sessions.list_active_by_owner(owner_id).await?)
    }

    /// List the owner's active favorite sessions. An empty favorite
    /// set is a valid answer; only an unknown owner is `NotFound`.
    pub async fn list_favorites(&self, owner_id: &str) -> Result<Vec<Session>, ChatError> {
        self.ensure_owner_known(owner_id).await?;
        Ok(self.sessions.list_favorites_by_owner(owner_id).await?)
    }

    async fn ensure_owner_known(&self, owner_id: &str) -> Result<(), ChatError> {
        if !self.sessions.exists_by_owner(owner_id).await? {
            warn!(owner_id, "Owner has no session history");
            return Err(ChatError::NotFound(format!("owner not found: {owner_id}")));
        }
        Ok(())
    }
}
