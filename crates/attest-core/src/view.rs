//! Presentation-mode descriptors handed to the rendering layer.
//!
//! The flow decides *which* mode to present and *what data* to pass it;
//! layout, styling, wording, and input widgets belong downstream.

use crate::{directory::Member, phase::Phase, qr::QrPayload, sas::SasComparison};

/// Why a cancelled request was cancelled.
///
/// Variants are mutually exclusive and selected by strict precedence:
/// timeout beats the cancelling-party check, which beats the
/// self-cancelled fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The request timed out before completing.
    TimedOut,
    /// The other party cancelled.
    ByOtherParty {
        /// Display name of the cancelling party.
        display_name: String,
    },
    /// The local user cancelled.
    ByUs,
}

/// What the presentation layer should show for the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    /// Offer scanning a QR code and/or starting emoji comparison.
    ScanOrCompare {
        /// Name of the other party, for the scan prompt.
        display_name: String,
        /// Scannable payload; `None` degrades the view to emoji-only.
        qr: Option<QrPayload>,
        /// Handshake already running: show a busy indicator in place
        /// of the emoji-start action.
        busy: bool,
    },

    /// Show comparison material wired to the confirm and mismatch
    /// actions.
    CompareSas {
        /// Name of the other party.
        display_name: String,
        /// Material both sides display for out-of-band comparison.
        sas: SasComparison,
    },

    /// Verification succeeded; summary with an acknowledge action.
    Verified {
        /// Name of the verified party.
        display_name: String,
    },

    /// Verification was cancelled; summary with an acknowledge action.
    Cancelled {
        /// Cause of the cancellation.
        reason: CancelReason,
    },
}

/// Render inputs assembled by the flow for the phase dispatcher.
#[derive(Debug, Clone)]
pub struct ViewContext<'a> {
    /// Current request phase.
    pub phase: Phase,
    /// Identity of the other party.
    pub member: &'a Member,
    /// User id of the other party as the engine reports it.
    pub other_user_id: &'a str,
    /// Engine cancel code, when cancelled.
    pub cancellation_code: Option<&'a str>,
    /// User id of the cancelling party, when cancelled.
    pub cancelling_user_id: Option<&'a str>,
    /// Assembled QR payload, when all key material was available.
    pub qr: Option<QrPayload>,
}
