//! End-to-end conversation flow over real SQLite storage with a
//! stubbed completion provider: idempotent appends, turn pairing,
//! cascade invalidation, regeneration, and sentinel replies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chatledger_core::conversation::orchestrator::{ConversationOrchestrator, RegenerateOutcome};
use chatledger_core::conversation::prompt::FullHistory;
use chatledger_core::conversation::provider::CompletionProvider;
use chatledger_core::message::log::MessageLog;
use chatledger_core::session::repository::SessionRepository;
use chatledger_core::session::store::SessionStore;
use chatledger_infra::sqlite::{DatabasePool, SqliteMessageRepository, SqliteSessionRepository};
use chatledger_types::error::{ChatError, CompletionError};
use chatledger_types::message::Sender;
use chatledger_types::session::Session;

/// Provider stub: numbered replies, recording the last prompt.
struct StubProvider {
    calls: AtomicUsize,
    last_prompt: Mutex<String>,
}

impl StubProvider {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.last_prompt.lock().unwrap().clone()
    }
}

impl CompletionProvider for &StubProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_prompt.lock().unwrap() = prompt.to_string();
        Ok(format!("reply {n}"))
    }
}

/// Provider stub that always fails upstream.
struct BrokenProvider;

impl CompletionProvider for BrokenProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })
    }
}

struct Harness {
    sessions: SqliteSessionRepository,
    messages: SqliteMessageRepository,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("flow.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        let pool = DatabasePool::new(&url).await.unwrap();
        Self {
            sessions: SqliteSessionRepository::new(pool.clone()),
            messages: SqliteMessageRepository::new(pool),
        }
    }

    fn store(&self) -> SessionStore<SqliteSessionRepository, SqliteMessageRepository> {
        SessionStore::new(self.sessions.clone(), self.messages.clone())
    }

    fn log(&self) -> MessageLog<SqliteSessionRepository, SqliteMessageRepository> {
        MessageLog::new(self.sessions.clone(), self.messages.clone())
    }

    fn orchestrator<P: CompletionProvider>(
        &self,
        provider: P,
    ) -> ConversationOrchestrator<SqliteSessionRepository, SqliteMessageRepository, P, FullHistory>
    {
        ConversationOrchestrator::new(self.log(), provider, FullHistory)
    }
}

#[tokio::test]
async fn user_append_is_idempotent_across_whitespace() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();

    let log = h.log();
    let m1 = log.append(&session.id, Sender::User, "hi", None).await.unwrap();
    let m2 = log.append(&session.id, Sender::User, "hi  ", None).await.unwrap();

    assert_eq!(m1.id, m2.id);
    assert_eq!(log.list_ordered(&session.id, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_or_get_reuses_and_conflicts_on_backstop() {
    let h = Harness::new().await;
    let store = h.store();

    let s1 = store.create_or_get("u1", "Trip").await.unwrap();
    // Whitespace-variant title reuses the same session
    let s2 = store.create_or_get("u1", "  Trip ").await.unwrap();
    assert_eq!(s1.id, s2.id);

    // A writer that raced past the pre-check hits the store constraint
    // and observes Conflict; it is never merged into the winner.
    let err = h.sessions.insert(&Session::new("u1", "Trip")).await.unwrap_err();
    assert!(matches!(
        err,
        chatledger_types::error::RepositoryError::Conflict(_)
    ));
}

#[tokio::test]
async fn respond_appends_user_and_reply() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let provider = StubProvider::new();
    let orch = h.orchestrator(&provider);

    let reply = orch.respond(&session.id, "Hello").await.unwrap();
    assert_eq!(reply.sender, Sender::Assistant);
    assert_eq!(reply.content, "reply 1");
    assert_eq!(provider.last_prompt(), "user: Hello");

    let history = orch.log().list_ordered(&session.id, true).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender, Sender::User);
    assert_eq!(history[1].id, reply.id);
}

#[tokio::test]
async fn provider_failure_becomes_sentinel_reply() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let orch = h.orchestrator(BrokenProvider);

    let reply = orch.respond(&session.id, "Hello").await.unwrap();
    assert_eq!(reply.sender, Sender::Assistant);
    assert!(reply.content.starts_with("[AI ERROR:"), "got: {}", reply.content);
    assert!(reply.content.contains("503"));

    // The failed turn is still a complete turn: one user row, one reply row.
    assert_eq!(orch.log().list_ordered(&session.id, true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unchanged_edit_is_a_noop() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let provider = StubProvider::new();
    let orch = h.orchestrator(&provider);

    orch.respond(&session.id, "Hello").await.unwrap();
    let user = orch.log().list_ordered(&session.id, true).await.unwrap()[0].clone();

    // Same content modulo whitespace: no deletion, no new reply
    let outcome = orch
        .regenerate(&session.id, &user.id, "  Hello ")
        .await
        .unwrap();
    assert!(matches!(outcome, RegenerateOutcome::Unchanged { .. }));

    let history = orch.log().list_ordered(&session.id, true).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "reply 1");
}

#[tokio::test]
async fn edit_cascades_to_next_turn_boundary_only() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let log = h.log();

    // Turn 1 with two stale replies, then a second user turn with its own reply
    let u1 = log.append(&session.id, Sender::User, "first", None).await.unwrap();
    log.append(&session.id, Sender::Assistant, "stale a", None).await.unwrap();
    log.append(&session.id, Sender::Assistant, "stale b", None).await.unwrap();
    let u2 = log.append(&session.id, Sender::User, "second", None).await.unwrap();
    let r2 = log.append(&session.id, Sender::Assistant, "keep", None).await.unwrap();

    let outcome = log.edit_user(&session.id, &u1.id, "first, revised").await.unwrap();
    assert!(outcome.is_updated());

    let active = log.list_ordered(&session.id, true).await.unwrap();
    let ids: Vec<_> = active.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![u1.id, u2.id, r2.id]);
    assert_eq!(active[0].content, "first, revised");
}

#[tokio::test]
async fn edit_rejects_non_user_targets() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let log = h.log();

    log.append(&session.id, Sender::User, "q", None).await.unwrap();
    let reply = log.append(&session.id, Sender::Assistant, "a", None).await.unwrap();

    let err = log.edit_user(&session.id, &reply.id, "rewritten").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));
}

#[tokio::test]
async fn delete_message_removes_paired_reply_only() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let log = h.log();

    let u1 = log.append(&session.id, Sender::User, "first", None).await.unwrap();
    log.append(&session.id, Sender::Assistant, "first reply", None).await.unwrap();
    let u2 = log.append(&session.id, Sender::User, "second", None).await.unwrap();
    let r2 = log.append(&session.id, Sender::Assistant, "second reply", None).await.unwrap();

    log.delete_message(&session.id, &u1.id).await.unwrap();

    let active = log.list_ordered(&session.id, true).await.unwrap();
    let ids: Vec<_> = active.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![u2.id, r2.id]);

    // Deleting a tombstoned message again is a quiet no-op
    log.delete_message(&session.id, &u1.id).await.unwrap();
}

#[tokio::test]
async fn delete_message_without_reply_leaves_following_user_turn() {
    let h = Harness::new().await;
    let session = h.store().create_or_get("u1", "Trip").await.unwrap();
    let log = h.log();

    let u1 = log.append(&session.id, Sender::User, "first", None).await.unwrap();
    let u2 = log.append(&session.id, Sender::User, "second", None).await.unwrap();

    log.delete_message(&session.id, &u1.id).await.unwrap();

    let active = log.list_ordered(&session.id, true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, u2.id);
}

#[tokio::test]
async fn blank_titles_and_content_are_invalid() {
    let h = Harness::new().await;
    let store = h.store();
    let log = h.log();

    let err = store.create_or_get("u1", "   ").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));
    let err = store.create_or_get(" \t ", "Trip").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));

    let session = store.create_or_get("u1", "Trip").await.unwrap();
    let err = store.rename(&session.id, "  \n ").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));

    let err = log
        .append(&session.id, Sender::User, " \t\n ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));

    let user = log.append(&session.id, Sender::User, "hi", None).await.unwrap();
    let err = log.edit_user(&session.id, &user.id, "   ").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));
    // The rejected edit left the message untouched
    let stored = log.list_ordered(&session.id, true).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hi");
}

#[tokio::test]
async fn session_soft_delete_is_idempotent_and_cascades() {
    let h = Harness::new().await;
    let store = h.store();
    let log = h.log();
    let session = store.create_or_get("u1", "Trip").await.unwrap();

    log.append(&session.id, Sender::User, "hello", None).await.unwrap();
    log.append(&session.id, Sender::Assistant, "hi", None).await.unwrap();

    store.soft_delete(&session.id).await.unwrap();
    assert!(log.list_ordered(&session.id, true).await.unwrap().is_empty());
    // Full history keeps the tombstones for audit
    assert_eq!(log.list_ordered(&session.id, false).await.unwrap().len(), 2);

    // Second delete: identical observable state, no error
    store.soft_delete(&session.id).await.unwrap();
    let found = store.get(&session.id).await.unwrap();
    assert!(found.deleted);
}

#[tokio::test]
async fn listing_unknown_owner_is_not_found() {
    let h = Harness::new().await;
    let store = h.store();

    let err = store.list_active("nobody").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
    let err = store.list_favorites("nobody").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));

    // Once the owner has history, empty favorite sets are a valid answer
    store.create_or_get("someone", "Trip").await.unwrap();
    assert!(store.list_favorites("someone").await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_conflicts_with_other_active_title() {
    let h = Harness::new().await;
    let store = h.store();

    store.create_or_get("u1", "Trip").await.unwrap();
    let other = store.create_or_get("u1", "Work").await.unwrap();

    let err = store.rename(&other.id, "  Trip ").await.unwrap_err();
    assert!(matches!(err, ChatError::Conflict(_)));

    // Renaming onto a free title bumps the version
    let renamed = store.rename(&other.id, "Work v2").await.unwrap();
    assert_eq!(renamed.title, "Work v2");
    assert_eq!(renamed.version, other.version + 1);
}

#[tokio::test]
async fn full_flow_edit_regenerates_one_fresh_reply() {
    let h = Harness::new().await;
    let store = h.store();
    let provider = StubProvider::new();
    let orch = h.orchestrator(&provider);

    let session = store.create_or_get("u1", "T").await.unwrap();

    let m1 = orch
        .log()
        .append(&session.id, Sender::User, "Hello", None)
        .await
        .unwrap();

    // respond reuses M1 (idempotent) and appends M2
    let m2 = orch.respond(&session.id, "Hello").await.unwrap();
    assert_eq!(orch.log().list_ordered(&session.id, true).await.unwrap().len(), 2);

    // Editing M1 deletes M2 and appends M3
    let outcome = orch
        .regenerate(&session.id, &m1.id, "Hello there")
        .await
        .unwrap();
    let (user, m3) = match outcome {
        RegenerateOutcome::Regenerated { user, reply } => (user, reply),
        RegenerateOutcome::Unchanged { .. } => panic!("expected regeneration"),
    };
    assert_eq!(user.id, m1.id);
    assert_ne!(m3.id, m2.id);

    let active = orch.log().list_ordered(&session.id, true).await.unwrap();
    let ids: Vec<_> = active.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![m1.id, m3.id]);
    assert_eq!(active[0].content, "Hello there");
    assert_eq!(active[1].content, "reply 2");

    // The regeneration prompt carried the edited content
    assert_eq!(provider.last_prompt(), "user: Hello there");
}

#[tokio::test]
async fn respond_on_unknown_session_is_not_found() {
    let h = Harness::new().await;
    let orch = h.orchestrator(BrokenProvider);

    let err = orch
        .respond(&uuid::Uuid::now_v7(), "Hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}
