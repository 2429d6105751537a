//! Error types for the verification flow.

use thiserror::Error;

use crate::phase::Phase;

/// Errors reported by the verification engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine rejected an operation in the current phase.
    #[error("{operation} is invalid in phase {phase:?}")]
    InvalidState {
        /// Phase the request was in when the operation was attempted.
        phase: Phase,
        /// Name of the rejected operation.
        operation: String,
    },

    /// The handshake sub-protocol failed.
    ///
    /// The engine follows up with a phase change (typically to
    /// `Cancelled`) on its own notification channel.
    #[error("verification protocol failure: {0}")]
    Protocol(String),
}

/// Errors surfaced by the flow itself.
#[derive(Debug, Error)]
pub enum FlowError {
    /// [`activate`](crate::flow::VerificationFlow::activate) was called
    /// while a change subscription is already held.
    #[error("verification flow is already active")]
    AlreadyActive,

    /// The engine reported an error.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
