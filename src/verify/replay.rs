//! Replay a demo through a fresh engine and compare every recorded outcome

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::demo::{DemoFile, DemoFormatError};
use crate::engine::{Engine, EngineError};

/// Which recorded field disagreed with the replay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    Observation,
    Reward { expected: f64, actual: f64 },
    Terminated { expected: bool, actual: bool },
    Truncated { expected: bool, actual: bool },
    Lives { expected: i32, actual: i32 },
    Engine { error: String },
    /// The demo breaks its own format invariants; nothing was replayed
    Malformed { error: String },
}

/// First point where the replay left the recording.
///
/// `step` is the log entry index: 0 is the reset observation, `i + 1` is the
/// outcome of action `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divergence {
    pub step: usize,
    pub mismatch: Mismatch,
}

/// A recorded checkpoint the engine refused to restore
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointFailure {
    pub step_count: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub path: Option<PathBuf>,
    pub session_id: String,
    pub actions: usize,
    /// Actions replayed before stopping
    pub replayed: usize,
    pub checkpoints: usize,
    pub total_reward: f64,
    pub divergence: Option<Divergence>,
    pub checkpoint_failures: Vec<CheckpointFailure>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.divergence.is_none() && self.checkpoint_failures.is_empty()
    }
}

/// Read a demo from `path` and verify it.
pub fn verify_demo_file<E: Engine>(
    path: &Path,
    engine: &mut E,
) -> Result<VerifyReport, DemoFormatError> {
    let demo = DemoFile::read_from_file(path)?;
    let mut report = verify_demo(&demo, engine);
    report.path = Some(path.to_path_buf());
    Ok(report)
}

/// Replay `demo` action by action through `step`.
///
/// When the replay reaches a recorded checkpoint the engine is moved onto
/// that snapshot, so every later comparison also checks the checkpoint
/// against the recording. Stops at the first divergence.
pub fn verify_demo<E: Engine>(demo: &DemoFile, engine: &mut E) -> VerifyReport {
    let mut report = VerifyReport {
        path: None,
        session_id: demo.session_id.clone(),
        actions: demo.actions.len(),
        replayed: 0,
        checkpoints: demo.checkpoints.len(),
        total_reward: demo.total_reward(),
        divergence: None,
        checkpoint_failures: Vec::new(),
    };

    if let Err(e) = demo.validate() {
        report.divergence = Some(Divergence {
            step: 0,
            mismatch: Mismatch::Malformed {
                error: e.to_string(),
            },
        });
        return report;
    }

    if !engine.replay_is_deterministic() {
        warn!(
            probability = engine.repeat_action_probability(),
            "Verifying on an engine with sticky actions; divergence is expected"
        );
    }

    match engine.reset(demo.reset_seed) {
        Ok(obs) if demo.observations.first() != Some(&obs) => {
            report.divergence = Some(Divergence {
                step: 0,
                mismatch: Mismatch::Observation,
            });
            return report;
        }
        Ok(_) => {}
        Err(e) => {
            report.divergence = Some(engine_divergence(0, e));
            return report;
        }
    }

    let mut checkpoints = demo.checkpoints.iter().peekable();
    for (i, &action) in demo.actions.iter().enumerate() {
        let lives = engine.lives();
        if lives != demo.lives[i] {
            report.divergence = Some(Divergence {
                step: i + 1,
                mismatch: Mismatch::Lives {
                    expected: demo.lives[i],
                    actual: lives,
                },
            });
            return report;
        }

        let transition = match engine.step(action) {
            Ok(t) => t,
            Err(e) => {
                report.divergence = Some(engine_divergence(i + 1, e));
                return report;
            }
        };
        report.replayed = i + 1;

        if let Some(mismatch) = compare(demo, i, &transition) {
            debug!(step = i + 1, ?mismatch, "Replay diverged");
            report.divergence = Some(Divergence {
                step: i + 1,
                mismatch,
            });
            return report;
        }

        while let Some(record) = checkpoints.next_if(|c| c.step_count <= i + 1) {
            if let Err(e) = engine.restore_state(&record.engine_state) {
                report.checkpoint_failures.push(CheckpointFailure {
                    step_count: record.step_count,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

fn compare(demo: &DemoFile, i: usize, t: &crate::engine::Transition) -> Option<Mismatch> {
    if t.observation != demo.observations[i + 1] {
        return Some(Mismatch::Observation);
    }
    if t.reward != demo.rewards[i] {
        return Some(Mismatch::Reward {
            expected: demo.rewards[i],
            actual: t.reward,
        });
    }
    if t.terminated != demo.terminated[i + 1] {
        return Some(Mismatch::Terminated {
            expected: demo.terminated[i + 1],
            actual: t.terminated,
        });
    }
    if t.truncated != demo.truncated[i + 1] {
        return Some(Mismatch::Truncated {
            expected: demo.truncated[i + 1],
            actual: t.truncated,
        });
    }
    None
}

fn engine_divergence(step: usize, error: EngineError) -> Divergence {
    Divergence {
        step,
        mismatch: Mismatch::Engine {
            error: error.to_string(),
        },
    }
}
