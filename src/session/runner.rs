//! Headless session runner

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::arcade::Cavern;
use crate::demo::timestamped_demo_path;
use crate::engine::Engine;
use crate::recorder::{AugmentedAction, Recorder};

use super::config::SessionConfig;
use super::script::ActionScript;

/// Session summary for JSON output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    /// Script actions issued, meta actions included
    pub actions_issued: usize,
    pub engine_actions: usize,
    pub saves: usize,
    pub time_travels: usize,
    /// Actions on the visible path at the end of the session
    pub recorded_actions: usize,
    pub cursor: usize,
    pub checkpoints: Vec<usize>,
    /// Sum of rewards along the visible path
    pub total_reward: f64,
    /// Sum of rewards returned to the caller, reversals included
    pub returned_reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub lives: i32,
    pub last_replay_len: usize,
    pub saved: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<PathBuf>,
    pub fps: u32,
    pub zoom: u32,
}

impl SessionSummary {
    /// Write summary to JSON file
    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to encode summary: {}", e))
    }
}

/// Build the engine and recorder described by `config`, run its script and
/// report where the trajectory ended up.
pub fn run_session(config: &SessionConfig) -> Result<SessionSummary, String> {
    let engine = Cavern::new(config.arcade_config())
        .map_err(|e| format!("Failed to build engine: {}", e))?;
    let mut recorder = Recorder::new(engine, config.recorder_config())
        .map_err(|e| format!("Failed to start recorder: {}", e))?;

    let loaded = match &config.load_demo {
        Some(path) => {
            let path = PathBuf::from(path);
            recorder.load_from_file(&path).map_err(|e| e.to_string())?;
            Some(path)
        }
        None => None,
    };

    let script = load_script(config, &recorder.action_meanings())?;
    run_script(config, recorder, &script, loaded)
}

/// Inline script followed by the script file, if any
pub fn load_script(config: &SessionConfig, meanings: &[&str]) -> Result<ActionScript, String> {
    let mut script = ActionScript::parse(&config.script, meanings)?;
    if let Some(path) = &config.script_file {
        script.extend(&ActionScript::from_file(Path::new(path), meanings)?);
    }
    Ok(script)
}

/// Drive `recorder` through `script`.
pub fn run_script<E: Engine>(
    config: &SessionConfig,
    mut recorder: Recorder<E>,
    script: &ActionScript,
    loaded: Option<PathBuf>,
) -> Result<SessionSummary, String> {
    let started_at = Local::now().to_rfc3339();
    let engine_count = recorder.engine_action_count();
    let mut summary = SessionSummary {
        session_id: String::new(),
        started_at,
        actions_issued: 0,
        engine_actions: 0,
        saves: 0,
        time_travels: 0,
        recorded_actions: 0,
        cursor: 0,
        checkpoints: Vec::new(),
        total_reward: 0.0,
        returned_reward: 0.0,
        terminated: false,
        truncated: false,
        lives: 0,
        last_replay_len: 0,
        saved: Vec::new(),
        loaded,
        fps: config.fps,
        zoom: config.zoom,
    };

    for (n, &action) in script.actions().iter().enumerate() {
        let outcome = recorder
            .step(action)
            .map_err(|e| format!("Action {} ({}) failed: {}", n, action, e))?;
        summary.actions_issued += 1;
        summary.returned_reward += outcome.reward;

        match AugmentedAction::decode(action, engine_count) {
            Ok(AugmentedAction::Save) => {
                summary.saves += 1;
                if let Some(path) = recorder.last_saved() {
                    summary.saved.push(path.to_path_buf());
                }
            }
            Ok(AugmentedAction::TimeTravel) => summary.time_travels += 1,
            Ok(AugmentedAction::Engine(_)) => summary.engine_actions += 1,
            Err(_) => {}
        }

        if !config.quiet && outcome.reward != 0.0 {
            info!(
                action = n,
                reward = outcome.reward,
                terminated = outcome.terminated,
                "Reward"
            );
        }
    }

    if config.save_on_exit {
        let path = timestamped_demo_path(&config.demo_dir());
        recorder.save_to_file(&path).map_err(|e| e.to_string())?;
        summary.saved.push(path);
    }

    let head = recorder.log().head();
    summary.session_id = recorder.session_id().to_string();
    summary.recorded_actions = recorder.log().action_count();
    summary.cursor = recorder.cursor();
    summary.checkpoints = recorder.checkpoints().step_counts();
    summary.total_reward = recorder.total_reward();
    summary.terminated = head.terminated;
    summary.truncated = head.truncated;
    summary.lives = recorder.engine().lives();
    summary.last_replay_len = recorder.last_replay_len();

    info!(
        session = %summary.session_id,
        recorded = summary.recorded_actions,
        cursor = summary.cursor,
        total_reward = summary.total_reward,
        "Session finished"
    );
    Ok(summary)
}
