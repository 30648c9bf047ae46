//! State manager error types.

use thiserror::Error;

/// Errors raised by [`crate::StateManager`].
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] k6s_storage::StoreError),

    /// The referenced session doesn't exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The referenced agent doesn't exist.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// The requested lifecycle transition isn't allowed from the
    /// current state.
    #[error("cannot transition session {session_id} from {from} to {to}")]
    InvalidSessionTransition {
        /// Session being transitioned.
        session_id: String,
        /// Its current state.
        from: String,
        /// The state the caller asked for.
        to: String,
    },

    /// The requested agent lifecycle transition isn't allowed.
    #[error("cannot transition agent {agent_id} from {from} to {to}")]
    InvalidAgentTransition {
        /// Agent being transitioned.
        agent_id: String,
        /// Its current state.
        from: String,
        /// The state the caller asked for.
        to: String,
    },

    /// Row data in the store didn't decode into the expected shape.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, StateError>;
