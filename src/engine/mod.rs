//! Engine collaborator contract
//!
//! The recorder never simulates anything itself. It drives an [`Engine`]
//! through this trait: stepping, resetting, and taking or restoring opaque
//! full-state snapshots.

mod action;
mod error;
mod types;

pub use action::{ALE_ACTION_MEANINGS, NativeAction};
pub use error::EngineError;
pub use types::{EngineInfo, EngineSnapshot, Observation, Transition};

/// A deterministic, steppable simulation.
///
/// `step` takes an index into [`Engine::action_set`]; `act_low_level` takes
/// the native id found at that index. Replaying recorded indices through
/// `act_low_level` must reproduce exactly the state transitions `step`
/// produced, without building observations or reporting rewards.
pub trait Engine {
    /// Start a new episode and return the first observation.
    fn reset(&mut self, seed: Option<u64>) -> Result<Observation, EngineError>;

    /// Execute the action at `action` in the action set.
    fn step(&mut self, action: usize) -> Result<Transition, EngineError>;

    /// Capture the complete engine state.
    fn clone_state(&self) -> Result<EngineSnapshot, EngineError>;

    /// Overwrite the engine state with a previously captured snapshot.
    ///
    /// A blob this engine instance cannot apply is reported as
    /// [`EngineError::IncompatibleState`].
    fn restore_state(&mut self, snapshot: &EngineSnapshot) -> Result<(), EngineError>;

    /// Execute one native action, bypassing observation and reward reporting.
    fn act_low_level(&mut self, action: NativeAction) -> Result<(), EngineError>;

    /// Ordered native actions; position in this list is the action index.
    fn action_set(&self) -> &[NativeAction];

    /// Lives remaining in the current episode.
    fn lives(&self) -> i32;

    /// Probability that the previous action is repeated instead of the new one.
    fn repeat_action_probability(&self) -> f64 {
        0.0
    }

    /// Whether replaying recorded actions from a snapshot reproduces the
    /// recorded transitions.
    ///
    /// Engines with sticky actions whose randomness is not part of their
    /// snapshot must leave this `false`.
    fn replay_is_deterministic(&self) -> bool {
        self.repeat_action_probability() == 0.0
    }

    /// Human-readable names of the action set, in order.
    fn action_meanings(&self) -> Vec<&'static str> {
        self.action_set().iter().map(|a| a.meaning()).collect()
    }

    /// Index of the neutral action used for frame refreshes.
    fn noop_action(&self) -> usize {
        self.action_set()
            .iter()
            .position(|a| a.is_noop())
            .unwrap_or(0)
    }
}
