//! Error types returned by the game state and the controller.

use thiserror::Error;

/// Failures of a show command.
///
/// Every failure is local and synchronous. Nothing is retried internally;
/// the caller fixes the request and resubmits it.
#[derive(Debug, Error)]
pub enum ShowError {
    /// The command is not legal in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A referenced turn or phase does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The request itself is malformed or out of range.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl ShowError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn phase_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Phase",
            id: id.to_string(),
        }
    }

    pub(crate) fn turn_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Turn",
            id: id.to_string(),
        }
    }
}

/// Result type for show commands.
pub type Result<T> = std::result::Result<T, ShowError>;
