//! Model-based property tests for the watcher guard.
//!
//! Random attach/detach/replace sequences are fed to the real guard and
//! to a trivial reference model; the two must report the same verify
//! starts. This pins the at-most-once-per-instance invariant under any
//! notification interleaving, including back-to-back sightings arriving
//! before a verify has resolved (the guard, not completion, gates
//! re-entry).

use attest_core::{FlowController, VerifierId};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Sighting {
    Detached,
    Attached(u8),
}

fn sighting() -> impl Strategy<Value = Sighting> {
    prop_oneof![
        1 => Just(Sighting::Detached),
        4 => (0u8..4).prop_map(Sighting::Attached),
    ]
}

proptest! {
    #[test]
    fn verify_starts_match_the_reference_model(
        ops in proptest::collection::vec(sighting(), 0..64),
    ) {
        let mut controller = FlowController::new();
        let mut model_watched: Option<u8> = None;

        for op in &ops {
            let current = match op {
                Sighting::Detached => None,
                Sighting::Attached(id) => Some(VerifierId(u64::from(*id))),
            };
            let reported = controller.observe_verifier(current);

            // Reference model: report exactly when the sighted instance
            // differs from the one currently watched.
            let expected = match op {
                Sighting::Detached => {
                    model_watched = None;
                    None
                }
                Sighting::Attached(id) if model_watched == Some(*id) => None,
                Sighting::Attached(id) => {
                    model_watched = Some(*id);
                    Some(VerifierId(u64::from(*id)))
                }
            };

            prop_assert_eq!(reported, expected);
        }

        prop_assert_eq!(
            controller.watched(),
            model_watched.map(|id| VerifierId(u64::from(id)))
        );
    }

    #[test]
    fn constant_sightings_start_verify_once(
        id in 0u8..4,
        repeats in 1usize..32,
    ) {
        let mut controller = FlowController::new();
        let verifier = VerifierId(u64::from(id));

        let starts = (0..repeats)
            .filter(|_| controller.observe_verifier(Some(verifier)).is_some())
            .count();

        prop_assert_eq!(starts, 1);
    }
}
