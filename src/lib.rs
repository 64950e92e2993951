//! Demo Recorder - record human demonstrations on an arcade engine with
//! unlimited undo, checkpoints and replayable demo files.
//!
//! The recorder wraps any [`Engine`] and adds two meta actions (SAVE and
//! TIME_TRAVEL) on top of the engine's own action set.

// Core modules
pub mod constants;
pub mod demo;
pub mod engine;
pub mod logging;
pub mod recorder;

// Engine, tooling and drivers
pub mod arcade;
pub mod session;
pub mod testing;
pub mod verify;

// Re-export commonly used types for convenience
pub use arcade::{ArcadeConfig, Cavern, Layout, ObsType};
pub use constants::*;
pub use demo::{DemoFile, DemoFormatError, list_demos, timestamped_demo_path};
pub use engine::{
    Engine, EngineError, EngineInfo, EngineSnapshot, NativeAction, Observation, Transition,
};
pub use logging::LogConfig;
pub use recorder::{
    AugmentedAction, CheckpointStore, Recorder, RecorderConfig, RecorderError, StepLog,
};
pub use session::{ActionScript, SessionConfig, SessionSummary, run_session};
pub use verify::{VerifyReport, verify_demo, verify_demo_file, verify_demos_parallel};
