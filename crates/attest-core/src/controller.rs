//! Pure flow state machine: lifecycle watcher guard and phase dispatcher.
//!
//! # Architecture
//!
//! The controller follows the action pattern: it holds only the state the
//! engine does not (which verifier instance is being watched, and the
//! comparison material of a pending challenge), and its methods return
//! what the caller must do rather than doing it. No I/O, no time, no
//! channels; [`crate::flow::VerificationFlow`] executes what
//! [`FlowController::observe_verifier`] reports, which keeps this logic
//! testable without an engine.
//!
//! Two invariants live here:
//!
//! - `verify()` is started at most once per verifier instance. The guard
//!   is keyed by instance identity, so either participant may create the
//!   verifier and back-to-back notifications cannot re-trigger it, while
//!   a replaced instance re-arms the guard.
//! - Stale comparison material never renders. Challenge validity is
//!   derived from the current phase at render time instead of trusting
//!   the stored value.

use tracing::warn;

use crate::{
    engine::VerifierId,
    phase::{CANCEL_CODE_TIMEOUT, Phase},
    sas::SasComparison,
    view::{CancelReason, PanelView, ViewContext},
};

/// Pure state machine behind [`crate::flow::VerificationFlow`].
#[derive(Debug, Default)]
pub struct FlowController {
    /// Instance the watcher currently considers attached.
    watched: Option<VerifierId>,
    /// Comparison material of the pending challenge, if any.
    sas: Option<SasComparison>,
}

impl FlowController {
    /// Controller with nothing watched and no pending challenge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle watcher step, run at activation and on every change
    /// notification.
    ///
    /// Returns the id of a newly attached verifier exactly once per
    /// instance; the caller must then subscribe its challenge channel
    /// and start `verify()`. Repeat sightings of the same instance
    /// return `None`. A different instance (replacement, or fresh attach
    /// after a detach) re-arms the guard and is reported.
    pub fn observe_verifier(&mut self, current: Option<VerifierId>) -> Option<VerifierId> {
        match current {
            None => {
                self.watched = None;
                None
            }
            Some(id) if self.watched == Some(id) => None,
            Some(id) => {
                // A replacement invalidates material from the old run.
                if self.watched.is_some() {
                    self.sas = None;
                }
                self.watched = Some(id);
                Some(id)
            }
        }
    }

    /// Instance the watcher currently considers attached.
    #[must_use]
    pub fn watched(&self) -> Option<VerifierId> {
        self.watched
    }

    /// Store comparison material delivered by the watched verifier.
    pub fn challenge_received(&mut self, sas: SasComparison) {
        self.sas = Some(sas);
    }

    /// Discard any stored comparison material.
    pub fn clear_challenge(&mut self) {
        self.sas = None;
    }

    /// Comparison material, valid only while the handshake is running.
    #[must_use]
    pub fn challenge(&self, phase: Phase) -> Option<&SasComparison> {
        if phase == Phase::Started { self.sas.as_ref() } else { None }
    }

    /// Phase dispatcher: select exactly one presentation mode for `ctx`,
    /// or none.
    ///
    /// Phases without a defined presentation (`Unsent`, `Requested`)
    /// log one diagnostic and render nothing; they are listed
    /// explicitly so a new phase value becomes a compile error, not a
    /// silently ignored state.
    pub fn view(&self, ctx: &ViewContext<'_>) -> Option<PanelView> {
        match ctx.phase {
            Phase::Ready => Some(self.scan_or_compare(ctx, false)),
            Phase::Started => match self.challenge(ctx.phase) {
                Some(sas) => Some(PanelView::CompareSas {
                    display_name: ctx.member.name().to_owned(),
                    sas: sas.clone(),
                }),
                // Handshake running, no comparison material yet: keep
                // the ready visual with a busy indicator.
                None => Some(self.scan_or_compare(ctx, true)),
            },
            Phase::Done => {
                Some(PanelView::Verified { display_name: ctx.member.name().to_owned() })
            }
            Phase::Cancelled => {
                Some(PanelView::Cancelled { reason: cancel_reason(ctx) })
            }
            Phase::Unsent | Phase::Requested => {
                warn!(phase = ?ctx.phase, "no presentation defined for phase");
                None
            }
        }
    }

    fn scan_or_compare(&self, ctx: &ViewContext<'_>, busy: bool) -> PanelView {
        PanelView::ScanOrCompare {
            display_name: ctx.member.name().to_owned(),
            qr: ctx.qr.clone(),
            busy,
        }
    }
}

/// Select the cancellation message variant.
///
/// Precedence is strict: timeout, then cancelled-by-other-party, then
/// cancelled-by-us.
fn cancel_reason(ctx: &ViewContext<'_>) -> CancelReason {
    if ctx.cancellation_code == Some(CANCEL_CODE_TIMEOUT) {
        CancelReason::TimedOut
    } else if ctx.cancelling_user_id == Some(ctx.other_user_id) {
        CancelReason::ByOtherParty { display_name: ctx.member.name().to_owned() }
    } else {
        CancelReason::ByUs
    }
}
