use thiserror::Error;

use crate::service::{ServiceError, ShutdownReason};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("session name cannot be empty")]
    EmptyInput,
    #[error("session '{name}' already exists")]
    SessionAlreadyExists {
        name: String,
        #[source]
        source: ServiceError,
    },
    #[error("session '{name}' does not exist")]
    SessionNotFound {
        name: String,
        #[source]
        source: ServiceError,
    },
    #[error("transport shut down: {0}")]
    TransportShutdown(ShutdownReason),
    #[error("another create or join attempt is still outstanding")]
    AttemptInProgress,
    #[error("no confirmation is pending")]
    NoPendingConfirmation,
    #[error("no attempt is pending")]
    NoPendingAttempt,
    #[error("not in a session")]
    NotInSession,
    #[error("only the host can start the game")]
    NotHost,
    #[error("no joinable session at index {0}")]
    UnknownSession(usize),
}

impl LobbyError {
    /// Whether the error came with a retry the user can confirm.
    pub fn offers_retry(&self) -> bool {
        matches!(
            self,
            LobbyError::SessionAlreadyExists { .. } | LobbyError::SessionNotFound { .. }
        )
    }
}
