//! Trajectory recorder: step log, checkpoint store and time-travel cursor.
//!
//! Engine actions are forwarded and logged, SAVE persists the trajectory,
//! TIME_TRAVEL moves a cursor back through the log. The first engine action
//! issued while displaced commits to the past and rebuilds engine state from
//! the nearest checkpoint.

mod action;
mod checkpoints;
mod config;
mod error;
mod log;
mod trajectory;

pub use action::{AugmentedAction, augmented_space_size};
pub use checkpoints::{Checkpoint, CheckpointStore};
pub use config::RecorderConfig;
pub use error::RecorderError;
pub use log::{Frame, Step, StepLog};
pub use trajectory::Recorder;
