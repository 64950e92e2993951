//! Scenario execution engine

use std::env;
use std::fs;
use uuid::Uuid;

use crate::arcade::{Cavern, Layout};
use crate::engine::{Engine, Transition};
use crate::recorder::{AugmentedAction, Recorder};
use crate::session::ActionScript;

use super::assertions::{
    AssertionError, CapturedEvent, RecorderState, check_sequence, check_state,
};
use super::parser::{StateAssertion, TestDefinition, TestSetup};

/// What a passing scenario did to its recorder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Script actions issued, meta actions included
    pub actions: u64,
    pub time_travels: usize,
    pub saves: usize,
    pub reloads: usize,
    /// Actions on the visible path at the end
    pub recorded: usize,
    pub checkpoints: usize,
}

impl RunStats {
    fn collect(issued: u64, events: &[CapturedEvent], recorder: &Recorder<Cavern>) -> Self {
        let count = |names: &[&str]| {
            events
                .iter()
                .filter(|e| names.contains(&e.event_type.as_str()))
                .count()
        };
        Self {
            actions: issued,
            time_travels: count(&["TimeTravel", "TimeTravelFloor"]),
            saves: count(&["Save"]),
            reloads: count(&["Reload"]),
            recorded: recorder.log().action_count(),
            checkpoints: recorder.checkpoints().len(),
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub enum TestResult {
    Pass { stats: RunStats },
    Fail { error: AssertionError },
    Error { message: String },
}

/// Recorder facts captured just before an action is issued
struct Before {
    cursor: usize,
    lives: i32,
    head_done: bool,
}

impl Before {
    fn of(recorder: &Recorder<Cavern>) -> Self {
        Self {
            cursor: recorder.cursor(),
            lives: recorder.engine().lives(),
            head_done: recorder.log().head_is_done(),
        }
    }
}

/// Run a single scenario and return the result
pub fn run_test(test: &TestDefinition) -> TestResult {
    match run_scenario(test) {
        Ok(result) => result,
        Err(message) => TestResult::Error { message },
    }
}

fn build_recorder(setup: &TestSetup) -> Result<Recorder<Cavern>, String> {
    let layout = match &setup.layout {
        Some(text) => Layout::parse(text)?,
        None => Layout::default_layout(),
    };
    let engine = Cavern::with_layout(setup.arcade_config(), layout)
        .map_err(|e| format!("Failed to build engine: {}", e))?;
    Recorder::new(engine, setup.recorder_config())
        .map_err(|e| format!("Failed to start recorder: {}", e))
}

fn run_scenario(test: &TestDefinition) -> Result<TestResult, String> {
    let mut recorder = build_recorder(&test.setup)?;
    let meanings = recorder.action_meanings();
    let engine_count = recorder.engine_action_count();

    // Checks on the live recorder run before checks on its reloaded successor
    let mut assertions = test.expect.state.clone();
    assertions.sort_by_key(|a| (a.after_action, a.after_reload));
    let mut next_assertion = 0;

    let mut events: Vec<CapturedEvent> = Vec::new();
    let mut issued: u64 = 0;

    // Assertions about the freshly reset recorder
    let state = observe(&recorder, 0.0, false);
    if let Err(error) = check_due(&assertions, &mut next_assertion, 0, false, &state) {
        return Ok(TestResult::Fail { error });
    }

    for block in &test.input {
        let script = ActionScript::parse(&block.actions, &meanings)?;
        for &action in script.actions() {
            let before = Before::of(&recorder);
            issued += 1;
            let state = match recorder.step(action) {
                Ok(outcome) => {
                    let kind = AugmentedAction::decode(action, engine_count)
                        .map_err(|e| e.to_string())?;
                    capture(&mut events, issued, kind, &before, &outcome, &recorder);
                    let saved = kind == AugmentedAction::Save;
                    observe(&recorder, outcome.reward, saved)
                }
                Err(e) => {
                    events.push(CapturedEvent::new(issued, "Error", None));
                    tracing::debug!(action, "Scenario action failed: {}", e);
                    observe(&recorder, 0.0, false)
                }
            };

            if let Err(error) = check_due(&assertions, &mut next_assertion, issued, false, &state) {
                return Ok(TestResult::Fail { error });
            }
        }

        if block.reload {
            recorder = reload(recorder, &test.setup)?;
            events.push(CapturedEvent::new(issued, "Reload", None));
            let state = observe(&recorder, 0.0, false);
            if let Err(error) = check_due(&assertions, &mut next_assertion, issued, true, &state) {
                return Ok(TestResult::Fail { error });
            }
        }
    }

    if let Some(assertion) = assertions.get(next_assertion) {
        let point = if assertion.after_reload { " (after reload)" } else { "" };
        return Ok(TestResult::Error {
            message: format!(
                "State assertion after action {}{} never ran ({} actions issued)",
                assertion.after_action, point, issued
            ),
        });
    }

    if let Err(error) = check_sequence(&test.expect.sequence, &events) {
        return Ok(TestResult::Fail { error });
    }

    Ok(TestResult::Pass {
        stats: RunStats::collect(issued, &events, &recorder),
    })
}

/// Run every pending assertion due at `issued`. Post-reload assertions only
/// run when `reloaded` is set, and hold back everything sorted after them.
fn check_due(
    assertions: &[StateAssertion],
    next: &mut usize,
    issued: u64,
    reloaded: bool,
    state: &RecorderState,
) -> Result<(), AssertionError> {
    while let Some(assertion) = assertions.get(*next)
        && assertion.after_action <= issued
        && (reloaded || !assertion.after_reload)
    {
        check_state(assertion, state)?;
        *next += 1;
    }
    Ok(())
}

/// Save through a temporary file and continue in a fresh recorder.
fn reload(mut recorder: Recorder<Cavern>, setup: &TestSetup) -> Result<Recorder<Cavern>, String> {
    let path = env::temp_dir().join(format!("scenario_{}.demo", Uuid::new_v4()));
    let saved = recorder.save_to_file(&path).map_err(|e| e.to_string());
    let loaded = saved.and_then(|_| {
        let mut fresh = build_recorder(setup)?;
        fresh.load_from_file(&path).map_err(|e| e.to_string())?;
        Ok(fresh)
    });
    let _ = fs::remove_file(&path);
    loaded
}

fn capture(
    events: &mut Vec<CapturedEvent>,
    issued: u64,
    kind: AugmentedAction,
    before: &Before,
    outcome: &Transition,
    recorder: &Recorder<Cavern>,
) {
    let mut push = |name: &str, value: Option<f64>| {
        events.push(CapturedEvent::new(issued, name, value));
    };

    match kind {
        AugmentedAction::TimeTravel => {
            if recorder.cursor() > before.cursor {
                push("TimeTravel", Some(outcome.reward));
            } else {
                push("TimeTravelFloor", None);
            }
            return;
        }
        AugmentedAction::Save => {
            if before.cursor > 0 {
                push("Restore", Some(recorder.last_replay_len() as f64));
            }
            push("Save", None);
            return;
        }
        AugmentedAction::Engine(_) => {}
    }

    if before.cursor > 0 {
        push("Restore", Some(recorder.last_replay_len() as f64));
    }
    if before.head_done && before.cursor == 0 {
        push("Frozen", None);
        return;
    }
    if outcome.reward != 0.0 {
        push("Reward", Some(outcome.reward));
    }
    if before.cursor == 0 && recorder.engine().lives() < before.lives {
        push("LifeLost", Some(recorder.engine().lives() as f64));
    }
    // A checkpoint at the new head can only have been taken by this step
    if let Some(latest) = recorder.checkpoints().latest()
        && latest.step_count == recorder.log().action_count()
    {
        push("Checkpoint", Some(latest.step_count as f64));
    }
    if outcome.terminated {
        push("Terminated", None);
    }
    if outcome.truncated {
        push("Truncated", None);
    }
}

fn observe(recorder: &Recorder<Cavern>, reward: f64, saved: bool) -> RecorderState {
    let log = recorder.log();
    let head = log.head();
    let engine = recorder.engine();
    let (x, y) = engine.position();
    RecorderState {
        log_len: log.len(),
        actions: log.action_count(),
        cursor: recorder.cursor(),
        checkpoints: recorder.checkpoints().step_counts(),
        lives: engine.lives(),
        total_reward: recorder.total_reward(),
        reward,
        terminated: head.terminated,
        truncated: head.truncated,
        x,
        y,
        keys: engine.keys_held(),
        replayed: recorder.last_replay_len(),
        saved,
    }
}
