//! CompletionProvider trait definition.
//!
//! The single seam to the external text-completion backend. The
//! provider is expected to enforce its own timeout and return either a
//! result or a typed failure; the orchestrator treats any failure
//! uniformly and performs no retry.

use chatledger_types::error::CompletionError;

/// Trait for text-completion backends (Gemini, OpenAI-compatible, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in chatledger-infra (e.g., `GeminiProvider`).
pub trait CompletionProvider: Send + Sync {
    /// Send the assembled prompt and receive the full reply text.
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, CompletionError>> + Send;
}
