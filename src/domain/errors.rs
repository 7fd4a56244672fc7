//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Chat platform unreachable or returned an error. Aborts an import run.
    #[error("Chat platform error: {0}")]
    Chat(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("State error: {0}")]
    State(String),

    /// A record with this source key already exists. The import treats this as a no-op.
    #[error("Duplicate source key: {0}")]
    DuplicateSourceKey(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
