//! GeminiProvider -- concrete [`CompletionProvider`] implementation for
//! the Gemini `generateContent` REST API.
//!
//! Posts the assembled prompt as a single content part with a fixed
//! system instruction and joins the text parts of the first candidate.
//! The provider bounds its own latency with a request timeout; the
//! orchestrator performs no retry and absorbs every failure returned
//! from here.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never
//! logged or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::warn;

use chatledger_core::conversation::provider::CompletionProvider;
use chatledger_types::error::CompletionError;

/// System instruction sent with every request.
const SYSTEM_INSTRUCTION: &str = "You are a helpful chat assistant.";

/// Request timeout. The engine defines no timeout of its own; bounding
/// provider latency is this collaborator's job.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`GeminiProvider`].
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: SecretString,
}

impl GeminiConfig {
    /// Load from `CHATLEDGER_AI_API_URL` and `CHATLEDGER_AI_API_KEY`.
    pub fn from_env() -> Result<Self, CompletionError> {
        let api_url = std::env::var("CHATLEDGER_AI_API_URL")
            .map_err(|_| CompletionError::Config("CHATLEDGER_AI_API_URL is not set".to_string()))?;
        let api_key = std::env::var("CHATLEDGER_AI_API_KEY")
            .map_err(|_| CompletionError::Config("CHATLEDGER_AI_API_KEY is not set".to_string()))?;
        Ok(Self {
            api_url,
            api_key: api_key.into(),
        })
    }
}

/// Gemini completion provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_url: config.api_url,
            api_key: config.api_key,
        }
    }

    /// Pull the reply text out of a `generateContent` response body:
    /// the `text` fields of `candidates[0].content.parts`, joined with
    /// single spaces.
    fn extract_text(body: &Value) -> Result<String, CompletionError> {
        let content = &body["candidates"][0]["content"];
        let parts = content["parts"].as_array().ok_or_else(|| {
            CompletionError::Malformed("response missing content parts".to_string())
        })?;

        let text = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let text = text.trim();
        if text.is_empty() {
            return Err(CompletionError::Empty);
        }
        Ok(text.to_string())
    }
}

impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let payload = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "systemInstruction": {"parts": [{"text": SYSTEM_INSTRUCTION}]},
        });

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion request rejected");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        Self::extract_text(&body)
    }
}
