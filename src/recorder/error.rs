use std::path::PathBuf;

use thiserror::Error;

use crate::demo::DemoFormatError;
use crate::engine::EngineError;

/// Errors surfaced by the trajectory recorder
#[derive(Error, Debug)]
pub enum RecorderError {
    /// An engine call failed; the current episode cannot continue.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Action index outside the augmented action space.
    #[error("Invalid action {action}: augmented action space has {space} actions")]
    InvalidAction { action: usize, space: usize },

    /// Demo file could not be read as a trajectory.
    #[error("Failed to load demo {}: {source}", .path.display())]
    Deserialization {
        path: PathBuf,
        #[source]
        source: DemoFormatError,
    },

    /// A stored checkpoint cannot be applied to this engine instance.
    #[error("Checkpoint at step {step_count} does not match the engine: {reason}")]
    EngineStateMismatch { step_count: usize, reason: String },

    /// Replaying a recorded action failed during walk-forward.
    #[error("Replay failed at recorded action {step}: {source}")]
    Replay {
        step: usize,
        #[source]
        source: EngineError,
    },

    /// Time travel or saving requested on an engine whose replay is not deterministic.
    #[error(
        "Engine repeats actions with probability {probability}; replay would diverge from the recording"
    )]
    NonDeterministicEngine { probability: f64 },

    /// Demo could not be written; the trajectory itself is unaffected.
    #[error("Failed to save demo {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: DemoFormatError,
    },
}
