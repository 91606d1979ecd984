//! Message log: per-session ordered messages with idempotent User
//! appends, cascade invalidation on edit, and turn-paired delete.
//!
//! Ordering is always by the per-session sequence counter; timestamps
//! are metadata only, so "immediately following" stays well defined
//! under high write rates.

use chatledger_types::error::{ChatError, RepositoryError};
use chatledger_types::message::{Message, Sender};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::fingerprint::{fingerprint, normalize};
use crate::message::repository::MessageRepository;
use crate::session::repository::SessionRepository;

/// Result of `edit_user`: either the content normalized to what was
/// already stored (no side effects at all), or the message was
/// rewritten and its stale replies tombstoned.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    Unchanged(Message),
    Updated(Message),
}

impl EditOutcome {
    pub fn message(&self) -> &Message {
        match self {
            EditOutcome::Unchanged(m) | EditOutcome::Updated(m) => m,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            EditOutcome::Unchanged(m) | EditOutcome::Updated(m) => m,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, EditOutcome::Updated(_))
    }
}

/// Owns all message mutation for sessions.
///
/// Generic over `SessionRepository` (existence checks) and
/// `MessageRepository` (storage).
pub struct MessageLog<S: SessionRepository, M: MessageRepository> {
    sessions: S,
    messages: M,
}

impl<S: SessionRepository, M: MessageRepository> MessageLog<S, M> {
    pub fn new(sessions: S, messages: M) -> Self {
        Self { sessions, messages }
    }

    /// Access the message repository.
    pub fn messages(&self) -> &M {
        &self.messages
    }

    /// Append a message to a session.
    ///
    /// User messages are idempotent per (session, normalized content):
    /// an active User message with the same fingerprint is returned
    /// unchanged -- no new row, no timestamp or context update.
    /// Assistant and System messages always insert; a repeated reply
    /// wording is a legitimate distinct turn.
    pub async fn append(
        &self,
        session_id: &Uuid,
        sender: Sender,
        content: &str,
        context: Option<String>,
    ) -> Result<Message, ChatError> {
        self.ensure_session_exists(session_id).await?;

        let normalized = normalize(Some(content));
        if normalized.is_empty() {
            return Err(ChatError::InvalidArgument("content must not be empty".to_string()));
        }
        let fp = fingerprint(&normalized);

        match sender {
            Sender::User => {
                if let Some(existing) = self
                    .messages
                    .find_active_user_by_fingerprint(session_id, &fp)
                    .await?
                {
                    debug!(
                        message_id = %existing.id,
                        session_id = %session_id,
                        "Reusing existing user message for identical content"
                    );
                    return Ok(existing);
                }
            }
            Sender::Assistant | Sender::System => {}
        }

        let now = Utc::now();
        let message = Message {
            id: Uuid::now_v7(),
            session_id: *session_id,
            sender,
            content: normalized,
            fingerprint: fp,
            context,
            // Assigned by the repository atomically with the insert.
            seq: 0,
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        Ok(self.messages.insert(&message).await?)
    }

    /// Active or full ordered history of a session, sequence ascending.
    pub async fn list_ordered(
        &self,
        session_id: &Uuid,
        active_only: bool,
    ) -> Result<Vec<Message>, ChatError> {
        self.ensure_session_exists(session_id).await?;
        Ok(self
            .messages
            .list_ordered(session_id, active_only, None, None)
            .await?)
    }

    /// Paged variant of [`list_ordered`](Self::list_ordered) for the
    /// transport layer's pagination.
    pub async fn list_page(
        &self,
        session_id: &Uuid,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, ChatError> {
        self.ensure_session_exists(session_id).await?;
        Ok(self
            .messages
            .list_ordered(session_id, active_only, Some(limit), Some(offset))
            .await?)
    }

    /// Edit a User message and invalidate the replies that answered the
    /// now-stale content.
    ///
    /// Only User turns are editable, to preserve provenance of
    /// generated output. When the new content normalizes to the stored
    /// content this is a no-op. Otherwise the message is rewritten and
    /// every Assistant message following it in sequence order is
    /// tombstoned, stopping at (and not touching) the first active
    /// User or System message -- unrelated later turns survive. The
    /// rewrite and the sweep run as one repository transaction.
    pub async fn edit_user(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
        new_content: &str,
    ) -> Result<EditOutcome, ChatError> {
        let message = self.get_active_in_session(session_id, message_id).await?;

        match message.sender {
            Sender::User => {}
            Sender::Assistant | Sender::System => {
                return Err(ChatError::InvalidArgument(
                    "only user messages can be edited".to_string(),
                ));
            }
        }

        let normalized = normalize(Some(new_content));
        if normalized.is_empty() {
            return Err(ChatError::InvalidArgument("content must not be empty".to_string()));
        }
        if normalized == message.content {
            info!(message_id = %message_id, "Content unchanged; skipping cascade");
            return Ok(EditOutcome::Unchanged(message));
        }

        let mut updated = message;
        updated.fingerprint = fingerprint(&normalized);
        updated.content = normalized;
        updated.updated_at = Utc::now();

        let stale_replies = self.messages.apply_user_edit(&updated).await?;
        info!(
            message_id = %message_id,
            stale_replies,
            "User message edited, stale replies tombstoned"
        );
        Ok(EditOutcome::Updated(updated))
    }

    /// Tombstone a message of any sender. When the target is a User
    /// message and the immediately following active message is its
    /// Assistant reply, that reply is tombstoned too: one user turn,
    /// at most one paired reply. Assistant and System targets are
    /// removed alone. Deleting an already tombstoned message is a
    /// no-op.
    pub async fn delete_message(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<(), ChatError> {
        match self.messages.soft_delete_paired(session_id, message_id).await {
            Ok(paired_reply) => {
                info!(
                    message_id = %message_id,
                    session_id = %session_id,
                    paired_reply,
                    "Message tombstoned"
                );
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(ChatError::NotFound(format!(
                "message {message_id} not found in session {session_id}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_session_exists(&self, session_id: &Uuid) -> Result<(), ChatError> {
        match self.sessions.get_by_id(session_id).await? {
            Some(_) => Ok(()),
            None => Err(ChatError::NotFound(format!("session not found: {session_id}"))),
        }
    }

    async fn get_active_in_session(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<Message, ChatError> {
        match self.messages.get_in_session(session_id, message_id).await? {
            Some(m) if !m.deleted => Ok(m),
            // Tombstoned rows behave as absent for targeted edits.
            _ => Err(ChatError::NotFound(format!(
                "message {message_id} not found in session {session_id}"
            ))),
        }
    }
}
