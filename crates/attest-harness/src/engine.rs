//! Scriptable doubles for the verification engine seam.
//!
//! [`FakeRequest`], [`FakeVerifier`], and [`FakeChallenge`] implement the
//! engine traits with fully scripted behavior and observation counters,
//! so flow tests are deterministic and need no real engine.

use std::{
    future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use attest_core::{
    EngineError, Phase, SasChallenge, SasComparison, SasVerifier, VerificationRequest,
    VerifierId, VerifyCompletion,
};
use tokio::sync::{broadcast, oneshot};

static NEXT_VERIFIER_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted outcome of a [`FakeVerifier::verify`] call.
#[derive(Debug, Clone)]
enum VerifyScript {
    Succeed,
    Fail(EngineError),
    Stall,
}

/// Challenge double with confirm and mismatch call counters.
pub struct FakeChallenge {
    comparison: SasComparison,
    confirms: Arc<AtomicUsize>,
    mismatches: Arc<AtomicUsize>,
}

impl FakeChallenge {
    /// Challenge carrying `comparison`.
    pub fn new(comparison: SasComparison) -> Self {
        Self {
            comparison,
            confirms: Arc::new(AtomicUsize::new(0)),
            mismatches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Observation handles for the relay counters; grab these before
    /// handing the challenge to [`FakeVerifier::emit_sas`].
    pub fn counters(&self) -> ChallengeCounters {
        ChallengeCounters {
            confirms: Arc::clone(&self.confirms),
            mismatches: Arc::clone(&self.mismatches),
        }
    }
}

#[async_trait]
impl SasChallenge for FakeChallenge {
    fn comparison(&self) -> &SasComparison {
        &self.comparison
    }

    async fn confirm(&self) -> Result<(), EngineError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mismatch(&self) -> Result<(), EngineError> {
        self.mismatches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared observation handles for a [`FakeChallenge`].
#[derive(Clone)]
pub struct ChallengeCounters {
    confirms: Arc<AtomicUsize>,
    mismatches: Arc<AtomicUsize>,
}

impl ChallengeCounters {
    /// Number of `confirm()` calls relayed to the engine.
    pub fn confirms(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
    }

    /// Number of `mismatch()` calls relayed to the engine.
    pub fn mismatches(&self) -> usize {
        self.mismatches.load(Ordering::SeqCst)
    }
}

/// Verifier double with a scripted `verify()` outcome.
pub struct FakeVerifier {
    id: VerifierId,
    script: VerifyScript,
    verify_calls: AtomicUsize,
    sas_subscriptions: AtomicUsize,
    sas_tx: Mutex<Option<oneshot::Sender<FakeChallenge>>>,
    sas_rx: Mutex<Option<oneshot::Receiver<FakeChallenge>>>,
}

impl FakeVerifier {
    /// Verifier whose `verify()` resolves successfully.
    pub fn new() -> Self {
        Self::scripted(VerifyScript::Succeed)
    }

    /// Verifier whose `verify()` fails with a protocol error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(VerifyScript::Fail(EngineError::Protocol(message.into())))
    }

    /// Verifier whose `verify()` never resolves.
    pub fn stalled() -> Self {
        Self::scripted(VerifyScript::Stall)
    }

    fn scripted(script: VerifyScript) -> Self {
        let (sas_tx, sas_rx) = oneshot::channel();
        Self {
            id: VerifierId(NEXT_VERIFIER_ID.fetch_add(1, Ordering::SeqCst)),
            script,
            verify_calls: AtomicUsize::new(0),
            sas_subscriptions: AtomicUsize::new(0),
            sas_tx: Mutex::new(Some(sas_tx)),
            sas_rx: Mutex::new(Some(sas_rx)),
        }
    }

    /// Number of times `verify()` has been started.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Number of times the challenge channel has been subscribed.
    pub fn sas_subscriptions(&self) -> usize {
        self.sas_subscriptions.load(Ordering::SeqCst)
    }

    /// Deliver the challenge, firing the `sas_ready` channel.
    pub fn emit_sas(&self, challenge: FakeChallenge) {
        if let Some(tx) = lock(&self.sas_tx).take() {
            // A dropped receiver means the flow tore down first; the
            // real engine does not observe that either.
            let _ = tx.send(challenge);
        }
    }
}

impl Default for FakeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SasVerifier for FakeVerifier {
    type Challenge = FakeChallenge;

    fn instance_id(&self) -> VerifierId {
        self.id
    }

    fn verify(&self) -> VerifyCompletion {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.clone();
        Box::pin(async move {
            match script {
                VerifyScript::Succeed => Ok(()),
                VerifyScript::Fail(err) => Err(err),
                VerifyScript::Stall => future::pending().await,
            }
        })
    }

    fn sas_ready(&self) -> oneshot::Receiver<FakeChallenge> {
        self.sas_subscriptions.fetch_add(1, Ordering::SeqCst);
        // A second subscription gets a closed channel; the event fires
        // at most once per instance.
        lock(&self.sas_rx).take().unwrap_or_else(|| oneshot::channel().1)
    }
}

struct RequestState {
    phase: Phase,
    other_user_id: String,
    cancellation_code: Option<String>,
    cancelling_user_id: Option<String>,
    flow_id: Option<String>,
    shared_secret: Option<String>,
    verifier: Option<Arc<FakeVerifier>>,
}

/// Engine request double with scriptable state and a broadcast change
/// channel.
///
/// Every mutator applies its whole change and then emits exactly one
/// notification, matching how the engine batches state before
/// notifying.
pub struct FakeRequest {
    state: Mutex<RequestState>,
    changes: broadcast::Sender<()>,
}

impl FakeRequest {
    /// Request in [`Phase::Unsent`] toward `other_user_id`.
    pub fn new(other_user_id: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(RequestState {
                phase: Phase::Unsent,
                other_user_id: other_user_id.into(),
                cancellation_code: None,
                cancelling_user_id: None,
                flow_id: None,
                shared_secret: None,
                verifier: None,
            }),
            changes,
        }
    }

    /// Move the request to `phase`.
    pub fn set_phase(&self, phase: Phase) {
        lock(&self.state).phase = phase;
        self.notify();
    }

    /// Set the originating event id.
    pub fn set_flow_id(&self, flow_id: impl Into<String>) {
        lock(&self.state).flow_id = Some(flow_id.into());
        self.notify();
    }

    /// Set the engine-derived shared secret.
    pub fn set_shared_secret(&self, secret: impl Into<String>) {
        lock(&self.state).shared_secret = Some(secret.into());
        self.notify();
    }

    /// Attach `verifier` and move to [`Phase::Started`] in one change.
    pub fn start_with(&self, verifier: Arc<FakeVerifier>) {
        {
            let mut state = lock(&self.state);
            state.phase = Phase::Started;
            state.verifier = Some(verifier);
        }
        self.notify();
    }

    /// Attach `verifier` without touching the phase.
    pub fn attach_verifier(&self, verifier: Arc<FakeVerifier>) {
        lock(&self.state).verifier = Some(verifier);
        self.notify();
    }

    /// Drop the attached verifier without touching the phase.
    pub fn detach_verifier(&self) {
        lock(&self.state).verifier = None;
        self.notify();
    }

    /// Cancel the request, recording who cancelled and why.
    pub fn cancel(&self, code: Option<&str>, cancelling_user_id: &str) {
        {
            let mut state = lock(&self.state);
            state.phase = Phase::Cancelled;
            state.cancellation_code = code.map(str::to_owned);
            state.cancelling_user_id = Some(cancelling_user_id.to_owned());
            state.verifier = None;
        }
        self.notify();
    }

    /// Emit a change notification with no state change.
    pub fn emit_change(&self) {
        self.notify();
    }

    /// Number of live change subscriptions.
    pub fn change_subscribers(&self) -> usize {
        self.changes.receiver_count()
    }

    fn notify(&self) {
        // No subscribers is fine; activation may not have happened yet.
        let _ = self.changes.send(());
    }
}

impl VerificationRequest for FakeRequest {
    type Verifier = FakeVerifier;

    fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    fn other_user_id(&self) -> String {
        lock(&self.state).other_user_id.clone()
    }

    fn cancellation_code(&self) -> Option<String> {
        lock(&self.state).cancellation_code.clone()
    }

    fn cancelling_user_id(&self) -> Option<String> {
        lock(&self.state).cancelling_user_id.clone()
    }

    fn flow_id(&self) -> Option<String> {
        lock(&self.state).flow_id.clone()
    }

    fn shared_secret(&self) -> Option<String> {
        lock(&self.state).shared_secret.clone()
    }

    fn verifier(&self) -> Option<Arc<FakeVerifier>> {
        lock(&self.state).verifier.clone()
    }

    fn begin_sas(&self) -> Result<Arc<FakeVerifier>, EngineError> {
        let verifier = {
            let mut state = lock(&self.state);
            if state.phase.is_terminal() {
                return Err(EngineError::InvalidState {
                    phase: state.phase,
                    operation: "begin_sas".to_owned(),
                });
            }
            if let Some(existing) = &state.verifier {
                // Both initiators converge on one instance.
                return Ok(Arc::clone(existing));
            }
            let verifier = Arc::new(FakeVerifier::new());
            state.verifier = Some(Arc::clone(&verifier));
            verifier
        };
        self.notify();
        Ok(verifier)
    }

    fn changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_sas_converges_on_the_existing_instance() {
        let request = FakeRequest::new("bob");
        request.set_phase(Phase::Ready);

        let first = request.begin_sas().unwrap();
        let second = request.begin_sas().unwrap();
        assert_eq!(first.instance_id(), second.instance_id());
    }

    #[test]
    fn begin_sas_is_rejected_in_terminal_phases() {
        let request = FakeRequest::new("bob");
        request.cancel(Some("user"), "bob");

        assert!(matches!(
            request.begin_sas(),
            Err(EngineError::InvalidState { phase: Phase::Cancelled, .. })
        ));
    }

    #[test]
    fn sas_ready_fires_at_most_once() {
        let verifier = FakeVerifier::new();
        let mut first = verifier.sas_ready();
        let mut second = verifier.sas_ready();

        verifier.emit_sas(FakeChallenge::new(SasComparison::from_decimals([1, 2, 3])));
        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_err());
    }

    #[test]
    fn verifier_ids_are_unique() {
        assert_ne!(FakeVerifier::new().instance_id(), FakeVerifier::new().instance_id());
    }
}
