//! Cancellation and fault-injection scenarios.

use std::sync::Arc;

use attest_core::{CancelReason, FlowEvent, PanelView, Phase, SasComparison};
use attest_harness::{FakeChallenge, FakeVerifier, Scenario, ScenarioBuilder};

/// Started handshake whose `verify()` stays pending, so change and
/// challenge events are the only things the pump can observe.
fn started_scenario() -> (Scenario, Arc<FakeVerifier>) {
    let mut scenario = ScenarioBuilder::new().member_named("Bob").build();
    scenario.request.set_phase(Phase::Ready);
    scenario.flow.activate().unwrap();
    let verifier = Arc::new(FakeVerifier::stalled());
    scenario.request.start_with(Arc::clone(&verifier));
    (scenario, verifier)
}

#[tokio::test]
async fn verify_failure_is_a_diagnostic_not_a_ui_error() {
    let mut scenario = ScenarioBuilder::new().build();
    scenario.request.set_phase(Phase::Ready);
    scenario.flow.activate().unwrap();

    let verifier = Arc::new(FakeVerifier::failing("key mismatch"));
    scenario.request.start_with(Arc::clone(&verifier));
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));
    assert_eq!(scenario.pump().await, FlowEvent::VerifierSettled);

    // No error surface exists; the view stays on the busy ready visual
    // until the engine reports its own phase change.
    match scenario.flow.view() {
        Some(PanelView::ScanOrCompare { busy, .. }) => assert!(busy),
        other => panic!("unexpected view: {other:?}"),
    }

    scenario.request.cancel(Some("user"), "alice");
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Cancelled));
    assert_eq!(
        scenario.flow.view(),
        Some(PanelView::Cancelled { reason: CancelReason::ByUs })
    );
}

#[tokio::test]
async fn cancelled_by_other_party_names_them() {
    let (mut scenario, _verifier) = started_scenario();
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));

    scenario.request.cancel(Some("user"), "bob");
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Cancelled));
    assert_eq!(
        scenario.flow.view(),
        Some(PanelView::Cancelled {
            reason: CancelReason::ByOtherParty { display_name: "Bob".to_owned() }
        })
    );

    assert!(!scenario.closed());
    scenario.flow.acknowledge();
    assert!(scenario.closed());
}

#[tokio::test]
async fn timeout_wins_over_the_cancelling_party() {
    let (mut scenario, _verifier) = started_scenario();
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));

    // The other party is also the cancelling party, but the timeout
    // code takes precedence.
    scenario.request.cancel(Some("timeout"), "bob");
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Cancelled));
    assert_eq!(
        scenario.flow.view(),
        Some(PanelView::Cancelled { reason: CancelReason::TimedOut })
    );
}

#[tokio::test]
async fn stale_challenge_is_unreachable_after_cancellation() {
    let (mut scenario, verifier) = started_scenario();
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));

    let challenge = FakeChallenge::new(SasComparison::from_decimals([1111, 2222, 3333]));
    let counters = challenge.counters();
    verifier.emit_sas(challenge);
    assert_eq!(scenario.pump().await, FlowEvent::SasReady);
    assert!(matches!(scenario.flow.view(), Some(PanelView::CompareSas { .. })));

    scenario.request.cancel(Some("user"), "bob");
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Cancelled));

    // The comparison view is gone and the challenge can no longer be
    // acted on.
    assert!(matches!(scenario.flow.view(), Some(PanelView::Cancelled { .. })));
    scenario.flow.confirm().await.unwrap();
    scenario.flow.mismatch().await.unwrap();
    assert_eq!(counters.confirms(), 0);
    assert_eq!(counters.mismatches(), 0);
}

#[tokio::test]
async fn confirm_before_any_challenge_is_a_no_op() {
    let (mut scenario, _verifier) = started_scenario();
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));

    scenario.flow.confirm().await.unwrap();
    scenario.flow.mismatch().await.unwrap();

    // Still waiting on comparison material.
    match scenario.flow.view() {
        Some(PanelView::ScanOrCompare { busy, .. }) => assert!(busy),
        other => panic!("unexpected view: {other:?}"),
    }
}

#[tokio::test]
async fn mismatch_is_relayed_exactly_once() {
    let (mut scenario, verifier) = started_scenario();
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));

    let challenge = FakeChallenge::new(SasComparison::from_decimals([4444, 5555, 6666]));
    let counters = challenge.counters();
    verifier.emit_sas(challenge);
    assert_eq!(scenario.pump().await, FlowEvent::SasReady);

    scenario.flow.mismatch().await.unwrap();
    scenario.flow.mismatch().await.unwrap();
    assert_eq!(counters.mismatches(), 1);
    assert_eq!(counters.confirms(), 0);
}

#[tokio::test]
async fn acknowledge_outside_terminal_phases_is_a_no_op() {
    let (mut scenario, _verifier) = started_scenario();
    assert_eq!(scenario.pump().await, FlowEvent::Changed(Phase::Started));

    scenario.flow.acknowledge();
    assert!(!scenario.closed());
}
