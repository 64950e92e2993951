//! Augmented action space exposed above the engine.

use super::error::RecorderError;

/// One decoded action from the augmented space.
///
/// Indices `0..n` are engine actions, `n` is SAVE and `n + 1` is
/// TIME_TRAVEL, where `n` is the size of the engine action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmentedAction {
    Engine(usize),
    Save,
    TimeTravel,
}

impl AugmentedAction {
    /// Decode an augmented index against an engine action set of `engine_actions` entries
    pub fn decode(index: usize, engine_actions: usize) -> Result<Self, RecorderError> {
        match index {
            i if i < engine_actions => Ok(AugmentedAction::Engine(i)),
            i if i == engine_actions => Ok(AugmentedAction::Save),
            i if i == engine_actions + 1 => Ok(AugmentedAction::TimeTravel),
            _ => Err(RecorderError::InvalidAction {
                action: index,
                space: augmented_space_size(engine_actions),
            }),
        }
    }

    /// Encode back into an augmented index
    pub fn encode(self, engine_actions: usize) -> usize {
        match self {
            AugmentedAction::Engine(i) => i,
            AugmentedAction::Save => engine_actions,
            AugmentedAction::TimeTravel => engine_actions + 1,
        }
    }
}

/// Size of the augmented action space for an engine with `engine_actions` actions
pub fn augmented_space_size(engine_actions: usize) -> usize {
    engine_actions + 2
}
