//! Turn-by-turn conversation orchestration.

pub mod orchestrator;
pub mod prompt;
pub mod provider;

pub use orchestrator::{ConversationOrchestrator, RegenerateOutcome};
pub use prompt::{FullHistory, HistoryWindow, RecentTurns};
pub use provider::CompletionProvider;
