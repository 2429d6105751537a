//! Verification engine seam.
//!
//! The engine owns the handshake protocol, the cryptography, and the
//! phase state machine; this module abstracts the handles it exposes so
//! the same flow logic runs against a production engine and against the
//! deterministic doubles in `attest-harness`.
//!
//! Notifications are modeled as channels rather than callbacks: the
//! request's change feed is a broadcast channel whose receiver is held
//! for exactly the activation lifetime (dropping it is the unsubscribe),
//! and the verifier's fires-at-most-once challenge event is a oneshot.

use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};

use crate::{error::EngineError, phase::Phase, sas::SasComparison};

/// Identity of one verifier instance.
///
/// The engine assigns a fresh id to every handshake run. The lifecycle
/// watcher keys its attach guard on this identity, not on a boolean, so
/// a replaced instance re-arms the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifierId(pub u64);

/// Completion of a [`SasVerifier::verify`] call.
pub type VerifyCompletion = Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send>>;

/// A pending short-authentication-string challenge.
///
/// Owned exclusively by the flow while the request phase is `Started`
/// and the user has not yet acted; discarded on confirm, mismatch,
/// phase change, or teardown.
#[async_trait]
pub trait SasChallenge: Send + Sync + 'static {
    /// Comparison material to display to the user.
    fn comparison(&self) -> &SasComparison;

    /// Tell the engine the user saw matching material.
    async fn confirm(&self) -> Result<(), EngineError>;

    /// Tell the engine the material did not match.
    async fn mismatch(&self) -> Result<(), EngineError>;
}

/// One run of the SAS handshake sub-protocol.
pub trait SasVerifier: Send + Sync + 'static {
    /// Challenge type delivered through [`Self::sas_ready`].
    type Challenge: SasChallenge;

    /// Engine-assigned identity of this instance.
    fn instance_id(&self) -> VerifierId;

    /// Start the handshake and return its completion.
    ///
    /// Idempotent: starting an instance that is already verifying
    /// returns a completion observing the same underlying run, so the
    /// lifecycle watcher and the action relay may both start the same
    /// instance.
    fn verify(&self) -> VerifyCompletion;

    /// Channel delivering the challenge; fires at most once per
    /// instance.
    ///
    /// The receiver is closed without a value if the engine discards
    /// the instance before comparison material exists.
    fn sas_ready(&self) -> oneshot::Receiver<Self::Challenge>;
}

/// Engine handle for one verification request.
///
/// Shared between the caller and the flow. The flow never mutates it
/// other than through [`Self::begin_sas`].
pub trait VerificationRequest: Send + Sync + 'static {
    /// Verifier type the engine attaches when a handshake starts.
    type Verifier: SasVerifier;

    /// Current lifecycle phase.
    fn phase(&self) -> Phase;

    /// User id of the other party.
    fn other_user_id(&self) -> String;

    /// Engine cancel code, once the request is cancelled.
    fn cancellation_code(&self) -> Option<String>;

    /// User id of whoever cancelled, once the request is cancelled.
    fn cancelling_user_id(&self) -> Option<String>;

    /// Id of the event that carried this request, when it has one.
    fn flow_id(&self) -> Option<String>;

    /// Shared secret the engine derived for the QR payload.
    fn shared_secret(&self) -> Option<String>;

    /// Currently attached verifier, if either side started a handshake.
    fn verifier(&self) -> Option<Arc<Self::Verifier>>;

    /// Start a SAS handshake and return its verifier.
    ///
    /// If a handshake is already running the engine returns the
    /// existing instance, so both initiators converge on one verifier.
    fn begin_sas(&self) -> Result<Arc<Self::Verifier>, EngineError>;

    /// Subscribe to change notifications.
    ///
    /// The engine notifies after every observable state change (phase,
    /// cancellation fields, verifier attachment). Notifications are
    /// delivered in emission order; dropping the receiver is the
    /// unsubscribe.
    fn changes(&self) -> broadcast::Receiver<()>;
}
