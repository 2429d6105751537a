//! Scenario builder for full verification flows.
//!
//! Wires a [`FakeRequest`], a [`FakeDirectory`], and a
//! [`VerificationFlow`] together with a close-flag oracle, so tests
//! script engine behavior and assert on what the flow presents.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use attest_core::{FlowEvent, Member, VerificationFlow};

use crate::{directory::FakeDirectory, engine::FakeRequest};

/// Builds a [`Scenario`] with the happy-path defaults: local user
/// `alice`, other party `bob`, complete QR key material.
pub struct ScenarioBuilder {
    other_user_id: String,
    display_name: Option<String>,
    master_key: Option<String>,
    device_key_present: bool,
    cross_signing_id_present: bool,
    flow_id: Option<String>,
    shared_secret: Option<String>,
}

impl ScenarioBuilder {
    /// Builder with happy-path defaults.
    pub fn new() -> Self {
        Self {
            other_user_id: "bob".to_owned(),
            display_name: None,
            master_key: Some("bob-master-key".to_owned()),
            device_key_present: true,
            cross_signing_id_present: true,
            flow_id: Some("$request-1".to_owned()),
            shared_secret: Some("qr-shared-secret".to_owned()),
        }
    }

    /// Give the other party a display name.
    pub fn member_named(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Directory has no master key for the other party.
    pub fn without_master_key(mut self) -> Self {
        self.master_key = None;
        self
    }

    /// Directory has no local device key.
    pub fn without_device_key(mut self) -> Self {
        self.device_key_present = false;
        self
    }

    /// Directory has no local cross-signing key id.
    pub fn without_cross_signing_id(mut self) -> Self {
        self.cross_signing_id_present = false;
        self
    }

    /// Request carries no originating event id.
    pub fn without_flow_id(mut self) -> Self {
        self.flow_id = None;
        self
    }

    /// Request carries no engine-derived shared secret.
    pub fn without_shared_secret(mut self) -> Self {
        self.shared_secret = None;
        self
    }

    /// Assemble the scenario. The flow is built but not activated.
    pub fn build(self) -> Scenario {
        let mut directory = FakeDirectory::new("alice");
        if let Some(key) = &self.master_key {
            directory = directory.with_master_key(&self.other_user_id, key);
        }
        if !self.device_key_present {
            directory = directory.without_device_key();
        }
        if !self.cross_signing_id_present {
            directory = directory.without_cross_signing_id();
        }

        let request = Arc::new(FakeRequest::new(&self.other_user_id));
        if let Some(flow_id) = &self.flow_id {
            request.set_flow_id(flow_id);
        }
        if let Some(secret) = &self.shared_secret {
            request.set_shared_secret(secret);
        }

        let member = match &self.display_name {
            Some(name) => Member::named(&self.other_user_id, name),
            None => Member::new(&self.other_user_id),
        };

        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        let flow = VerificationFlow::new(
            Arc::clone(&request),
            member,
            directory,
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        Scenario { request, flow, closed }
    }
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired-up flow plus its engine double and oracles.
pub struct Scenario {
    /// Engine request double; tests script it directly.
    pub request: Arc<FakeRequest>,
    /// Flow under test.
    pub flow: VerificationFlow<FakeRequest, FakeDirectory>,
    closed: Arc<AtomicBool>,
}

impl Scenario {
    /// Whether the caller's close handler has been invoked.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pump one event through the flow.
    pub async fn pump(&mut self) -> FlowEvent {
        self.flow.next_event().await
    }
}
