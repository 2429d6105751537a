//! Engine-bound verification flow runtime.
//!
//! [`VerificationFlow`] binds one engine request and an identity
//! directory to the pure [`FlowController`]: it holds the change
//! subscription for exactly the activation lifetime, pumps engine
//! notifications cooperatively, executes what the controller reports
//! (subscribe a challenge channel, start `verify()`), and relays user
//! actions back to the engine.
//!
//! The split mirrors the rest of the stack: state transitions live in
//! the controller, orchestration lives here, so the same transition
//! logic runs in production and under the deterministic engine doubles.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::{
    controller::FlowController,
    directory::{IdentityDirectory, Member},
    engine::{SasChallenge, SasVerifier, VerificationRequest, VerifierId, VerifyCompletion},
    error::FlowError,
    phase::Phase,
    qr::{QrInputs, QrPayload},
    view::{PanelView, ViewContext},
};

/// Challenge type of the verifier attached to request `R`.
type ChallengeOf<R> =
    <<R as VerificationRequest>::Verifier as SasVerifier>::Challenge;

/// Caller-supplied close operation, invoked on acknowledgement of a
/// terminal summary.
pub type CloseHandler = Box<dyn FnMut() + Send>;

/// Notification produced by [`VerificationFlow::next_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// The request changed; the watcher ran and the caller should
    /// re-render.
    Changed(Phase),
    /// Comparison material arrived; re-render.
    SasReady,
    /// The pending `verify()` resolved. Failures are recorded as a
    /// diagnostic, never surfaced as a blocking error; the engine
    /// follows up with a phase change of its own.
    VerifierSettled,
    /// The flow holds no subscription (never activated, deactivated,
    /// or the engine dropped the channel); nothing further will arrive.
    Closed,
}

/// Outcome of one pump suspension, decoded outside the select so state
/// mutation never races the pending branches.
enum Wake<C> {
    Change(Option<()>),
    Sas(Option<C>),
    Verified(Result<(), crate::error::EngineError>),
}

/// Drives presentation of one verification request.
///
/// Construction is inert; [`activate`](Self::activate) acquires the
/// change subscription and runs the initial watcher evaluation, and
/// [`deactivate`](Self::deactivate) (or dropping the flow) releases it
/// on every exit path.
pub struct VerificationFlow<R, D>
where
    R: VerificationRequest,
    D: IdentityDirectory,
{
    request: Arc<R>,
    directory: D,
    member: Member,
    on_close: CloseHandler,
    controller: FlowController,
    changes: Option<broadcast::Receiver<()>>,
    sas_rx: Option<oneshot::Receiver<ChallengeOf<R>>>,
    challenge: Option<ChallengeOf<R>>,
    verifying: Option<VerifyCompletion>,
}

impl<R, D> VerificationFlow<R, D>
where
    R: VerificationRequest,
    D: IdentityDirectory,
{
    /// Inactive flow presenting `request` for `member`.
    pub fn new(request: Arc<R>, member: Member, directory: D, on_close: CloseHandler) -> Self {
        Self {
            request,
            directory,
            member,
            on_close,
            controller: FlowController::new(),
            changes: None,
            sas_rx: None,
            challenge: None,
            verifying: None,
        }
    }

    /// Subscribe to the request and run the initial watcher evaluation.
    ///
    /// A verifier may already be attached when the flow activates (the
    /// other side started first); the initial evaluation picks it up
    /// without waiting for a notification.
    pub fn activate(&mut self) -> Result<(), FlowError> {
        if self.changes.is_some() {
            return Err(FlowError::AlreadyActive);
        }
        self.changes = Some(self.request.changes());
        self.evaluate_verifier();
        debug!(phase = ?self.request.phase(), "verification flow activated");
        Ok(())
    }

    /// Unsubscribe and drop all ephemeral state.
    ///
    /// After this, engine notifications no longer reach the watcher and
    /// no stale challenge survives. Dropping the flow has the same
    /// effect.
    pub fn deactivate(&mut self) {
        self.changes = None;
        self.sas_rx = None;
        self.challenge = None;
        self.verifying = None;
        self.controller = FlowController::new();
        debug!("verification flow deactivated");
    }

    /// Whether the flow currently holds a change subscription.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.changes.is_some()
    }

    /// Identity of the other party.
    #[must_use]
    pub fn member(&self) -> &Member {
        &self.member
    }

    /// Current presentation mode, or nothing for phases without one.
    ///
    /// Pure with respect to flow state: reads a fresh snapshot of the
    /// request and recomputes the QR payload on every call, so stale
    /// data cannot outlive a phase change.
    pub fn view(&self) -> Option<PanelView> {
        let phase = self.request.phase();
        let qr = matches!(phase, Phase::Ready | Phase::Started)
            .then(|| self.qr_payload())
            .flatten();
        let other_user_id = self.request.other_user_id();
        let cancellation_code = self.request.cancellation_code();
        let cancelling_user_id = self.request.cancelling_user_id();
        let ctx = ViewContext {
            phase,
            member: &self.member,
            other_user_id: &other_user_id,
            cancellation_code: cancellation_code.as_deref(),
            cancelling_user_id: cancelling_user_id.as_deref(),
            qr,
        };
        self.controller.view(&ctx)
    }

    /// Wait for the next observable event and update flow state.
    ///
    /// This is the cooperative pump: it suspends on the change channel,
    /// the pending challenge channel, and the pending `verify()`
    /// completion. Rendering paths never suspend; only this does.
    pub async fn next_event(&mut self) -> FlowEvent {
        loop {
            if self.changes.is_none() && self.sas_rx.is_none() && self.verifying.is_none() {
                return FlowEvent::Closed;
            }

            let wake = {
                let changes = &mut self.changes;
                let sas_rx = &mut self.sas_rx;
                let verifying = &mut self.verifying;
                tokio::select! {
                    note = recv_change(changes) => Wake::Change(note),
                    challenge = recv_challenge(sas_rx) => Wake::Sas(challenge),
                    result = drive_verify(verifying) => Wake::Verified(result),
                }
            };

            match wake {
                Wake::Change(Some(())) => {
                    self.evaluate_verifier();
                    let phase = self.request.phase();
                    if phase.is_terminal() {
                        // The engine hands out no further challenges and
                        // the dispatcher must never see this one again.
                        self.sas_rx = None;
                        self.challenge = None;
                        self.controller.clear_challenge();
                    }
                    return FlowEvent::Changed(phase);
                }
                Wake::Change(None) => {
                    self.changes = None;
                    return FlowEvent::Closed;
                }
                Wake::Sas(Some(challenge)) => {
                    self.sas_rx = None;
                    self.controller.challenge_received(challenge.comparison().clone());
                    self.challenge = Some(challenge);
                    return FlowEvent::SasReady;
                }
                Wake::Sas(None) => {
                    // Instance discarded before material existed.
                    self.sas_rx = None;
                }
                Wake::Verified(result) => {
                    self.verifying = None;
                    if let Err(err) = result {
                        // Diagnostic only: the engine reports the
                        // outcome through its own phase change.
                        warn!(%err, "verifier rejected verify()");
                    }
                    return FlowEvent::VerifierSettled;
                }
            }
        }
    }

    /// Begin emoji (SAS) verification.
    ///
    /// The watcher independently sees the same instance on the
    /// resulting change notification and skips it through the identity
    /// guard, so both call sites together start `verify()` once.
    pub fn start_emoji(&mut self) -> Result<(), FlowError> {
        let verifier = self.request.begin_sas()?;
        let id = verifier.instance_id();
        if self.controller.observe_verifier(Some(id)).is_some() {
            self.attach(&verifier, id);
        }
        Ok(())
    }

    /// Relay the user's confirmation that the material matched.
    ///
    /// Defensive no-op without a live challenge or outside the started
    /// phase; correct phase gating upstream makes both unreachable.
    pub async fn confirm(&mut self) -> Result<(), FlowError> {
        let Some(challenge) = self.take_challenge() else {
            return Ok(());
        };
        challenge.confirm().await?;
        Ok(())
    }

    /// Relay that the material did not match.
    pub async fn mismatch(&mut self) -> Result<(), FlowError> {
        let Some(challenge) = self.take_challenge() else {
            return Ok(());
        };
        challenge.mismatch().await?;
        Ok(())
    }

    /// Acknowledge a terminal summary, invoking the caller's close
    /// handler. Defensive no-op in any non-terminal phase.
    pub fn acknowledge(&mut self) {
        if self.request.phase().is_terminal() {
            (self.on_close)();
        }
    }

    /// Take the pending challenge if the phase still permits acting on
    /// it; the challenge is spent either way once taken.
    fn take_challenge(&mut self) -> Option<ChallengeOf<R>> {
        if self.request.phase() != Phase::Started {
            return None;
        }
        let challenge = self.challenge.take()?;
        self.controller.clear_challenge();
        Some(challenge)
    }

    /// Watcher body: compare the request's verifier against the guard
    /// and attach when a new instance appears.
    fn evaluate_verifier(&mut self) {
        let verifier = self.request.verifier();
        let current = verifier.as_ref().map(|v| v.instance_id());
        let Some(id) = self.controller.observe_verifier(current) else {
            return;
        };
        if let Some(verifier) = verifier {
            self.attach(&verifier, id);
        }
    }

    /// Subscribe the instance's challenge channel and start its
    /// handshake. Reached exactly once per instance, through the guard.
    fn attach(&mut self, verifier: &Arc<R::Verifier>, id: VerifierId) {
        debug!(verifier = id.0, "attaching verifier");
        self.challenge = None;
        self.sas_rx = Some(verifier.sas_ready());
        self.verifying = Some(verifier.verify());
    }

    /// Gather QR inputs from the request and the directory; `None`
    /// degrades the ready view to emoji-only, by design.
    fn qr_payload(&self) -> Option<QrPayload> {
        let request_event_id = self.request.flow_id()?;
        let shared_secret = self.request.shared_secret()?;
        let other_master_key = self.directory.master_key(&self.request.other_user_id())?;
        let device_key = self.directory.device_key()?;
        let cross_signing_id = self.directory.cross_signing_id()?;
        Some(QrPayload::assemble(&QrInputs {
            keyholder_user_id: self.directory.user_id(),
            request_event_id,
            device_id: self.directory.device_id(),
            device_key,
            cross_signing_id,
            other_master_key,
            shared_secret,
        }))
    }
}

/// Receive one change notification. A lagged receiver coalesces missed
/// notifications into one re-evaluation, which is lossless because
/// every evaluation reads a fresh snapshot.
async fn recv_change(rx: &mut Option<broadcast::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Some(()),
            Err(broadcast::error::RecvError::Closed) => None,
        },
        None => std::future::pending().await,
    }
}

/// Resolve the pending challenge channel, if one is subscribed.
async fn recv_challenge<C>(rx: &mut Option<oneshot::Receiver<C>>) -> Option<C> {
    match rx {
        Some(rx) => rx.await.ok(),
        None => std::future::pending().await,
    }
}

/// Poll the stored `verify()` completion, if one is pending.
async fn drive_verify(
    slot: &mut Option<VerifyCompletion>,
) -> Result<(), crate::error::EngineError> {
    match slot {
        Some(fut) => fut.as_mut().await,
        None => std::future::pending().await,
    }
}
