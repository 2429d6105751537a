//! Identity directory double.

use std::collections::HashMap;

use attest_core::IdentityDirectory;

/// Directory double with per-item presence toggles.
///
/// Starts with complete local key material so the happy path assembles
/// a QR payload; the `without_*` methods remove individual pieces to
/// exercise the emoji-only fallback.
#[derive(Debug, Clone)]
pub struct FakeDirectory {
    user_id: String,
    device_id: String,
    device_key: Option<String>,
    cross_signing_id: Option<String>,
    master_keys: HashMap<String, String>,
}

impl FakeDirectory {
    /// Directory for a local session owned by `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: "LOCAL-DEVICE".to_owned(),
            device_key: Some("local-device-key".to_owned()),
            cross_signing_id: Some("local-cross-signing-key".to_owned()),
            master_keys: HashMap::new(),
        }
    }

    /// Record `user_id`'s master cross-signing key.
    pub fn with_master_key(
        mut self,
        user_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.master_keys.insert(user_id.into(), key.into());
        self
    }

    /// Remove the local device key.
    pub fn without_device_key(mut self) -> Self {
        self.device_key = None;
        self
    }

    /// Remove the local cross-signing key id.
    pub fn without_cross_signing_id(mut self) -> Self {
        self.cross_signing_id = None;
        self
    }
}

impl IdentityDirectory for FakeDirectory {
    fn user_id(&self) -> String {
        self.user_id.clone()
    }

    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn device_key(&self) -> Option<String> {
        self.device_key.clone()
    }

    fn cross_signing_id(&self) -> Option<String> {
        self.cross_signing_id.clone()
    }

    fn master_key(&self, user_id: &str) -> Option<String> {
        self.master_keys.get(user_id).cloned()
    }
}
