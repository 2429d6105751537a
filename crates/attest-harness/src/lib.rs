//! Deterministic test doubles for the verification flow.
//!
//! Scriptable implementations of the engine and directory seams plus
//! scenario tooling, for reproducible flow tests without a real
//! verification engine.

pub mod directory;
pub mod engine;
pub mod scenario;

pub use directory::FakeDirectory;
pub use engine::{ChallengeCounters, FakeChallenge, FakeRequest, FakeVerifier};
pub use scenario::{Scenario, ScenarioBuilder};
