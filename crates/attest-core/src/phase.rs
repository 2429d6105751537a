//! Lifecycle phases of a verification request.
//!
//! The phase is owned and advanced by the verification engine; this crate
//! only observes it. Phases are ordered by protocol progression:
//!
//! ```text
//! ┌────────┐   ┌───────────┐   ┌───────┐   ┌─────────┐   ┌──────┐
//! │ Unsent │──>│ Requested │──>│ Ready │──>│ Started │──>│ Done │
//! └────────┘   └───────────┘   └───────┘   └─────────┘   └──────┘
//!      │             │             │            │
//!      │             │             │            │
//!      └─────────────┴──────┬──────┴────────────┘
//!                           ↓
//!                     ┌───────────┐
//!                     │ Cancelled │
//!                     └───────────┘
//! ```
//!
//! `Done` and `Cancelled` are terminal; `Cancelled` is reachable from any
//! non-terminal phase.

use serde::{Deserialize, Serialize};

/// Cancellation code the engine reports when a request times out.
pub const CANCEL_CODE_TIMEOUT: &str = "timeout";

/// Lifecycle phase of a verification request.
///
/// This is a closed set: the phase dispatcher matches exhaustively, so an
/// engine introducing a new phase surfaces as a compile error here rather
/// than a silently ignored state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Phase {
    /// Request created locally but not yet sent to the other party.
    Unsent,
    /// Request sent, waiting for the other party to accept.
    Requested,
    /// Both parties agreed on methods; verification may start.
    Ready,
    /// A handshake sub-protocol (verifier) is running.
    Started,
    /// Verification completed successfully.
    Done,
    /// Verification was cancelled by either party, or timed out.
    Cancelled,
}

impl Phase {
    /// Whether this phase admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}
