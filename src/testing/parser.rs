//! TOML scenario file parsing

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::arcade::{ArcadeConfig, ObsType};
use crate::constants::{ARCADE_MAX_FRAMES, DEFAULT_CHECKPOINT_INTERVAL};
use crate::recorder::RecorderConfig;

/// Directory under the system temp dir where scenario SAVE actions write
const SCENARIO_DEMO_DIR: &str = "demo-recorder-scenarios";

/// Complete scenario definition from TOML file
#[derive(Debug, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub setup: TestSetup,
    #[serde(default)]
    pub input: Vec<ActionInput>,
    #[serde(default)]
    pub expect: TestExpectations,
}

/// Engine and recorder configuration for a scenario
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestSetup {
    pub seed: Option<u64>,
    pub checkpoint_interval: usize,
    pub frameskip: u32,
    pub obs_type: ObsType,
    pub repeat_action_probability: f64,
    pub max_frames: u64,
    pub allow_nondeterministic_replay: bool,
    pub disable_time_travel: bool,
    /// Inline room layout (None = built-in room)
    pub layout: Option<String>,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self {
            seed: None,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            frameskip: 1,
            obs_type: ObsType::Ram,
            repeat_action_probability: 0.0,
            max_frames: ARCADE_MAX_FRAMES,
            allow_nondeterministic_replay: false,
            disable_time_travel: false,
            layout: None,
        }
    }
}

impl TestSetup {
    pub fn arcade_config(&self) -> ArcadeConfig {
        ArcadeConfig {
            obs_type: self.obs_type,
            frameskip: self.frameskip,
            repeat_action_probability: self.repeat_action_probability,
            max_frames: self.max_frames,
            seed: self.seed.unwrap_or_default(),
            layout_file: None,
        }
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            checkpoint_interval: self.checkpoint_interval,
            disable_time_travel: self.disable_time_travel,
            seed: self.seed,
            allow_nondeterministic_replay: self.allow_nondeterministic_replay,
            demo_dir: std::env::temp_dir().join(SCENARIO_DEMO_DIR),
        }
    }
}

/// One block of scripted actions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionInput {
    /// Action script (see `session::ActionScript`)
    #[serde(default)]
    pub actions: String,
    /// After the actions, save the trajectory and load it into a fresh recorder
    #[serde(default)]
    pub reload: bool,
}

/// Expected scenario outcomes
#[derive(Debug, Default, Deserialize)]
pub struct TestExpectations {
    #[serde(default)]
    pub sequence: Vec<ExpectedEvent>,
    /// Multiple state assertions at different points (uses [[expect.state]] TOML syntax)
    #[serde(default)]
    pub state: Vec<StateAssertion>,
}

/// Expected event in sequence
#[derive(Debug, Deserialize)]
pub struct ExpectedEvent {
    pub event: String,
    /// Value carried by the event (reward, checkpoint step count, ...)
    pub value: Option<f64>,
    pub action_min: Option<u64>,
    pub action_max: Option<u64>,
}

/// State assertion after a given number of script actions
#[derive(Debug, Clone, Deserialize)]
pub struct StateAssertion {
    pub after_action: u64,
    /// Check the fresh recorder once the block ending at `after_action` has reloaded
    #[serde(default)]
    pub after_reload: bool,
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Parse a scenario file from path
pub fn parse_test_file(path: &Path) -> Result<TestDefinition, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}
