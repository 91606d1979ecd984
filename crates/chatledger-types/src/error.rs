use thiserror::Error;

/// Errors from repository operations (used by trait definitions in
/// chatledger-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Service-level error taxonomy for session and message operations.
///
/// NotFound, Conflict, and InvalidArgument propagate unchanged to the
/// transport boundary; provider failures never appear here because the
/// orchestrator absorbs them into sentinel replies.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ChatError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ChatError::NotFound("entity not found".to_string()),
            RepositoryError::Conflict(msg) => ChatError::Conflict(msg),
            RepositoryError::Connection => ChatError::Storage("database connection error".to_string()),
            RepositoryError::Query(msg) => ChatError::Storage(msg),
        }
    }
}

/// Errors from the external completion provider.
///
/// Never escapes `respond`/`regenerate`: the orchestrator encodes the
/// failure into the stored reply content so every user turn receives
/// exactly one reply row.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider misconfigured: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned no text")]
    Empty,
}
