//! QR verification payload assembly.
//!
//! Assembles the data a QR renderer encodes into a scannable code: the
//! keyholder's identity keys, the originating request event, and the
//! engine-derived shared secret binding a scan to this request. Assembly
//! is a pure function of its inputs and is recomputed on every render;
//! whether the inputs are available at all is decided upstream by the
//! phase dispatcher's emoji-only fallback.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inputs required to assemble a scannable verification payload.
///
/// Every field is required. When any of them is unavailable the ready
/// view degrades to emoji-only and this type is never built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrInputs {
    /// User id of the local session, shown as the code's keyholder.
    pub keyholder_user_id: String,
    /// Id of the event that carried the verification request.
    pub request_event_id: String,
    /// Device id of the local session.
    pub device_id: String,
    /// Public key of the local device.
    pub device_key: String,
    /// Id of the local user's cross-signing key.
    pub cross_signing_id: String,
    /// Id of the other party's master cross-signing key.
    pub other_master_key: String,
    /// Shared secret the engine derived for this request.
    pub shared_secret: String,
}

/// Assembled QR verification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// User id of the keyholder presenting the code.
    pub keyholder_user_id: String,
    /// Id of the event that carried the verification request.
    pub request_event_id: String,
    /// The other party's master cross-signing key id.
    pub other_user_key: String,
    /// Shared secret binding a scan to this request.
    pub shared_secret: String,
    /// Ordered (key id, key value) pairs the scanning side verifies.
    pub keys: Vec<(String, String)>,
}

impl QrPayload {
    /// Assemble the payload from complete inputs.
    ///
    /// Key order is fixed: the device key first, then the cross-signing
    /// key. The cross-signing key id doubles as its own key value.
    pub fn assemble(inputs: &QrInputs) -> Self {
        Self {
            keyholder_user_id: inputs.keyholder_user_id.clone(),
            request_event_id: inputs.request_event_id.clone(),
            other_user_key: inputs.other_master_key.clone(),
            shared_secret: inputs.shared_secret.clone(),
            keys: vec![
                (inputs.device_id.clone(), inputs.device_key.clone()),
                (inputs.cross_signing_id.clone(), inputs.cross_signing_id.clone()),
            ],
        }
    }

    /// Encode the payload as CBOR for the QR renderer.
    pub fn encode(&self) -> Result<Vec<u8>, QrEncodeError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)?;
        Ok(out)
    }
}

/// Failure to serialize a [`QrPayload`].
#[derive(Debug, Error)]
#[error("failed to encode QR payload: {0}")]
pub struct QrEncodeError(#[from] ciborium::ser::Error<std::io::Error>);
