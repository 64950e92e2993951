//! Recorder configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{DEFAULT_CHECKPOINT_INTERVAL, DEMOS_DIR};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Recorded actions between periodic checkpoints (0 = never checkpoint)
    pub checkpoint_interval: usize,
    /// Treat TIME_TRAVEL as a no-op that leaves the cursor alone
    pub disable_time_travel: bool,
    /// Where SAVE writes demo files
    pub demo_dir: PathBuf,
    /// Seed passed to the engine on reset
    pub seed: Option<u64>,
    /// Record on engines whose replay may diverge (sticky actions).
    /// Rewinding and loading still work but can produce a different state.
    pub allow_nondeterministic_replay: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            disable_time_travel: false,
            demo_dir: PathBuf::from(DEMOS_DIR),
            seed: None,
            allow_nondeterministic_replay: false,
        }
    }
}

impl RecorderConfig {
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_demo_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.demo_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}
