//! Conversation orchestrator: drives one full turn.
//!
//! A turn is append user message, build prompt from active history,
//! cross the provider boundary, append the reply. The provider call
//! happens strictly between the two store writes and holds no store
//! resources, so a hung provider stalls only its own turn.

use chatledger_types::error::{ChatError, CompletionError};
use chatledger_types::message::{Message, Sender};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::conversation::prompt::{render_prompt, HistoryWindow};
use crate::conversation::provider::CompletionProvider;
use crate::message::log::{EditOutcome, MessageLog};
use crate::message::repository::MessageRepository;
use crate::session::repository::SessionRepository;

/// Result of `regenerate`: either the edit was a no-op (no reply was
/// deleted and none generated), or the stale replies were swept and a
/// fresh one appended.
#[derive(Debug, Clone)]
pub enum RegenerateOutcome {
    Unchanged { user: Message },
    Regenerated { user: Message, reply: Message },
}

/// Drives turn-by-turn exchange with the completion provider.
///
/// Provider failures are absorbed: every user turn always receives
/// exactly one reply row, a sentinel `[AI ERROR: ...]` text standing in
/// when the upstream call fails. No retries anywhere; the dedup
/// mechanism is a correctness device, not failure recovery.
pub struct ConversationOrchestrator<S, M, P, W>
where
    S: SessionRepository,
    M: MessageRepository,
    P: CompletionProvider,
    W: HistoryWindow,
{
    log: MessageLog<S, M>,
    provider: P,
    window: W,
}

impl<S, M, P, W> ConversationOrchestrator<S, M, P, W>
where
    S: SessionRepository,
    M: MessageRepository,
    P: CompletionProvider,
    W: HistoryWindow,
{
    pub fn new(log: MessageLog<S, M>, provider: P, window: W) -> Self {
        Self {
            log,
            provider,
            window,
        }
    }

    /// Access the underlying message log.
    pub fn log(&self) -> &MessageLog<S, M> {
        &self.log
    }

    /// Run one full turn: append the user message (idempotent), render
    /// the windowed history, call the provider, append and return the
    /// Assistant reply.
    pub async fn respond(
        &self,
        session_id: &Uuid,
        user_content: &str,
    ) -> Result<Message, ChatError> {
        info!(session_id = %session_id, "Generating reply");

        self.log
            .append(session_id, Sender::User, user_content, None)
            .await?;

        self.reply_from_history(session_id).await
    }

    /// Edit a user turn and regenerate its reply.
    ///
    /// Delegates the cascade invalidation to the message log; when the
    /// new content normalizes to the stored content nothing is deleted
    /// and no new reply is generated.
    pub async fn regenerate(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
        new_content: &str,
    ) -> Result<RegenerateOutcome, ChatError> {
        match self.log.edit_user(session_id, message_id, new_content).await? {
            EditOutcome::Unchanged(user) => Ok(RegenerateOutcome::Unchanged { user }),
            EditOutcome::Updated(user) => {
                info!(message_id = %message_id, "Regenerating reply after edit");
                let reply = self.reply_from_history(session_id).await?;
                Ok(RegenerateOutcome::Regenerated { user, reply })
            }
        }
    }

    /// Steps shared by `respond` and `regenerate`: fetch active
    /// history, window, render, call the provider, append the reply.
    async fn reply_from_history(&self, session_id: &Uuid) -> Result<Message, ChatError> {
        let history = self.log.list_ordered(session_id, true).await?;
        let prompt = render_prompt(self.window.select(&history));
        debug!(session_id = %session_id, prompt_len = prompt.len(), "Calling completion provider");

        // The provider round trip runs between the two store writes;
        // no store resource is held across it.
        // An empty reply would be rejected by the append validation,
        // so it is folded into the sentinel path as well.
        let reply_text = match self.provider.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                error!(session_id = %session_id, "Completion provider returned empty text");
                format!("[AI ERROR: {}]", CompletionError::Empty)
            }
            Err(err) => {
                error!(session_id = %session_id, %err, "Completion provider failed");
                format!("[AI ERROR: {err}]")
            }
        };

        let reply = self
            .log
            .append(session_id, Sender::Assistant, &reply_text, None)
            .await?;
        info!(session_id = %session_id, reply_id = %reply.id, "Reply saved");
        Ok(reply)
    }
}
