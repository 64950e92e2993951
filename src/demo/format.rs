//! On-disk demo format.
//!
//! A demo is one JSON document holding the whole trajectory as parallel
//! lists. Observations, terminal flags and info carry one more entry than
//! actions, rewards and lives (entry 0 is the reset observation).

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::DEMO_FORMAT_VERSION;
use crate::engine::{EngineInfo, EngineSnapshot, Observation};
use crate::recorder::{Checkpoint, CheckpointStore, Frame, Step, StepLog};

/// Why a demo file could not be turned into a trajectory
#[derive(Error, Debug)]
pub enum DemoFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed demo: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported demo format version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("Inconsistent demo: {0}")]
    Inconsistent(String),
}

/// Persisted checkpoint: step count plus the engine blob, verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub step_count: usize,
    pub engine_state: EngineSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoFile {
    pub format_version: u32,
    pub session_id: String,
    pub saved_at: String,
    pub reset_seed: Option<u64>,
    pub checkpoint_interval: usize,
    #[serde(default)]
    pub repeat_action_probability: f64,
    pub actions: Vec<usize>,
    pub checkpoints: Vec<CheckpointRecord>,
    pub observations: Vec<Observation>,
    pub rewards: Vec<f64>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
    pub info: Vec<EngineInfo>,
    pub lives: Vec<i32>,
}

/// Trajectory contents rebuilt from a demo, ready to install
#[derive(Debug, Clone)]
pub struct StagedTrajectory {
    pub session_id: String,
    pub reset_seed: Option<u64>,
    pub log: StepLog,
    pub checkpoints: CheckpointStore,
}

/// Recorder-side metadata stored alongside the trajectory
#[derive(Debug, Clone)]
pub struct DemoHeader<'a> {
    pub session_id: &'a str,
    pub reset_seed: Option<u64>,
    pub checkpoint_interval: usize,
    pub repeat_action_probability: f64,
}

impl DemoFile {
    /// Snapshot the visible path of `log` and the checkpoints that lie on it.
    pub fn from_trajectory(
        header: DemoHeader<'_>,
        log: &StepLog,
        checkpoints: &CheckpointStore,
    ) -> Self {
        let steps = log.visible();
        let frames = std::iter::once(log.initial()).chain(steps.iter().map(|s| &s.frame));

        let mut observations = Vec::with_capacity(steps.len() + 1);
        let mut terminated = Vec::with_capacity(steps.len() + 1);
        let mut truncated = Vec::with_capacity(steps.len() + 1);
        let mut info = Vec::with_capacity(steps.len() + 1);
        for frame in frames {
            observations.push(frame.observation.clone());
            terminated.push(frame.terminated);
            truncated.push(frame.truncated);
            info.push(frame.info.clone());
        }

        Self {
            format_version: DEMO_FORMAT_VERSION,
            session_id: header.session_id.to_string(),
            saved_at: chrono::Local::now().to_rfc3339(),
            reset_seed: header.reset_seed,
            checkpoint_interval: header.checkpoint_interval,
            repeat_action_probability: header.repeat_action_probability,
            actions: steps.iter().map(|s| s.action).collect(),
            checkpoints: checkpoints
                .up_to(log.action_count())
                .iter()
                .map(|c| CheckpointRecord {
                    step_count: c.step_count,
                    engine_state: c.state.clone(),
                })
                .collect(),
            observations,
            rewards: steps.iter().map(|s| s.reward).collect(),
            terminated,
            truncated,
            info,
            lives: steps.iter().map(|s| s.lives_before).collect(),
        }
    }

    /// Check every length and ordering invariant of the format.
    pub fn validate(&self) -> Result<(), DemoFormatError> {
        if self.format_version != DEMO_FORMAT_VERSION {
            return Err(DemoFormatError::Version {
                found: self.format_version,
                expected: DEMO_FORMAT_VERSION,
            });
        }

        let actions = self.actions.len();
        let per_action = [("rewards", self.rewards.len()), ("lives", self.lives.len())];
        for (name, len) in per_action {
            if len != actions {
                return Err(DemoFormatError::Inconsistent(format!(
                    "{} has {} entries for {} actions",
                    name, len, actions
                )));
            }
        }
        let per_entry = [
            ("observations", self.observations.len()),
            ("terminated", self.terminated.len()),
            ("truncated", self.truncated.len()),
            ("info", self.info.len()),
        ];
        for (name, len) in per_entry {
            if len != actions + 1 {
                return Err(DemoFormatError::Inconsistent(format!(
                    "{} has {} entries, expected {}",
                    name,
                    len,
                    actions + 1
                )));
            }
        }

        let mut previous: Option<usize> = None;
        for record in &self.checkpoints {
            if previous.is_some_and(|p| record.step_count <= p) {
                return Err(DemoFormatError::Inconsistent(format!(
                    "checkpoint step counts not increasing at {}",
                    record.step_count
                )));
            }
            if record.step_count > actions {
                return Err(DemoFormatError::Inconsistent(format!(
                    "checkpoint at step {} beyond {} actions",
                    record.step_count, actions
                )));
            }
            previous = Some(record.step_count);
        }
        Ok(())
    }

    /// Validate and rebuild the step log and checkpoint store.
    pub fn into_staged(self, checkpoint_interval: usize) -> Result<StagedTrajectory, DemoFormatError> {
        self.validate()?;
        let action_count = self.actions.len();

        let mut frames = self
            .observations
            .into_iter()
            .zip(self.terminated)
            .zip(self.truncated)
            .zip(self.info)
            .map(|(((observation, terminated), truncated), info)| Frame {
                observation,
                terminated,
                truncated,
                info,
            });
        let initial = frames
            .next()
            .ok_or_else(|| DemoFormatError::Inconsistent("no reset observation".to_string()))?;

        let steps: Vec<Step> = self
            .actions
            .into_iter()
            .zip(self.rewards)
            .zip(self.lives)
            .zip(frames)
            .map(|(((action, reward), lives_before), frame)| Step {
                action,
                lives_before,
                reward,
                frame,
            })
            .collect();

        let entries = self
            .checkpoints
            .into_iter()
            .map(|r| Checkpoint {
                step_count: r.step_count,
                state: r.engine_state,
            })
            .collect();
        let checkpoints = CheckpointStore::from_entries(checkpoint_interval, entries, action_count)
            .map_err(DemoFormatError::Inconsistent)?;

        Ok(StagedTrajectory {
            session_id: self.session_id,
            reset_seed: self.reset_seed,
            log: StepLog::from_parts(initial, steps),
            checkpoints,
        })
    }

    /// Write the demo to `path` through a sibling temporary file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), DemoFormatError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temporary_path(path);
        let result = (|| -> Result<(), DemoFormatError> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                fs::rename(&tmp_path, path)?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    /// Read and validate a demo from `path`.
    pub fn read_from_file(path: &Path) -> Result<Self, DemoFormatError> {
        let reader = BufReader::new(File::open(path)?);
        let demo: DemoFile = serde_json::from_reader(reader)?;
        demo.validate()?;
        Ok(demo)
    }

    /// Sum of recorded rewards
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
