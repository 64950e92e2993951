//! Arcade engine - a small deterministic cavern game
//!
//! Implements the [`Engine`](crate::engine::Engine) contract with ALE-style
//! action ids, RAM or screen observations, frameskip and sticky actions.

mod cavern;
mod layout;

pub use cavern::Cavern;
pub use layout::{DEFAULT_LAYOUT, Layout, Tile};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::ARCADE_MAX_FRAMES;

/// What the engine reports as an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObsType {
    /// 128-byte memory image
    #[default]
    Ram,
    /// One byte per tile, row-major, player drawn as `P`
    #[serde(alias = "rgb")]
    Screen,
}

impl std::str::FromStr for ObsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ram" => Ok(ObsType::Ram),
            "screen" | "rgb" => Ok(ObsType::Screen),
            other => Err(format!("Unknown obs type '{}' (expected ram or screen)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    pub obs_type: ObsType,
    /// Frames simulated per action
    pub frameskip: u32,
    /// Probability that the previous native action repeats
    pub repeat_action_probability: f64,
    /// Episode frame budget (0 = unlimited)
    pub max_frames: u64,
    /// Seed used when reset is called without one
    pub seed: u64,
    /// Layout file; the built-in room when unset
    pub layout_file: Option<PathBuf>,
}

impl Default for ArcadeConfig {
    fn default() -> Self {
        Self {
            obs_type: ObsType::Ram,
            frameskip: 1,
            repeat_action_probability: 0.0,
            max_frames: ARCADE_MAX_FRAMES,
            seed: 0,
            layout_file: None,
        }
    }
}

impl ArcadeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.frameskip == 0 {
            return Err("frameskip must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.repeat_action_probability) {
            return Err(format!(
                "repeat_action_probability {} is outside [0, 1]",
                self.repeat_action_probability
            ));
        }
        Ok(())
    }
}
