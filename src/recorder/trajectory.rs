//! Trajectory recorder
//!
//! Wraps an [`Engine`] and records every action so the trajectory can be
//! rewound, resumed, saved and reloaded. Periodic checkpoints bound the cost
//! of bringing the engine back in line with a rewound or loaded log.

use std::mem;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::demo::{DemoFile, DemoHeader, StagedTrajectory, timestamped_demo_path};
use crate::engine::{Engine, EngineError, NativeAction, Observation, Transition};

use super::action::{AugmentedAction, augmented_space_size};
use super::checkpoints::{Checkpoint, CheckpointStore};
use super::config::RecorderConfig;
use super::error::RecorderError;
use super::log::{Frame, Step, StepLog};

/// Records a trajectory over an exclusively owned engine.
pub struct Recorder<E: Engine> {
    engine: E,
    config: RecorderConfig,
    session_id: String,
    reset_seed: Option<u64>,
    log: StepLog,
    checkpoints: CheckpointStore,
    /// Engine state has drifted from the log head and must be rebuilt
    needs_resync: bool,
    last_saved: Option<PathBuf>,
    last_replay_len: usize,
}

impl<E: Engine> Recorder<E> {
    /// Take ownership of `engine` and start a fresh trajectory.
    pub fn new(mut engine: E, config: RecorderConfig) -> Result<Self, RecorderError> {
        check_replay_determinism(&engine, &config)?;

        let observation = engine.reset(config.seed)?;
        let session_id = Uuid::new_v4().to_string();
        info!(
            session = %&session_id[..8],
            actions = engine.action_set().len(),
            checkpoint_interval = config.checkpoint_interval,
            "Recorder started"
        );

        Ok(Self {
            reset_seed: config.seed,
            checkpoints: CheckpointStore::new(config.checkpoint_interval),
            log: StepLog::new(Frame::initial(observation)),
            engine,
            config,
            session_id,
            needs_resync: false,
            last_saved: None,
            last_replay_len: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn log(&self) -> &StepLog {
        &self.log
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Steps currently displaced into the past
    pub fn cursor(&self) -> usize {
        self.log.cursor()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn reset_seed(&self) -> Option<u64> {
        self.reset_seed
    }

    /// Path written by the most recent save
    pub fn last_saved(&self) -> Option<&Path> {
        self.last_saved.as_deref()
    }

    /// Actions replayed by the most recent walk-forward
    pub fn last_replay_len(&self) -> usize {
        self.last_replay_len
    }

    pub fn engine_action_count(&self) -> usize {
        self.engine.action_set().len()
    }

    /// Size of the augmented action space (engine actions + SAVE + TIME_TRAVEL)
    pub fn action_space_size(&self) -> usize {
        augmented_space_size(self.engine_action_count())
    }

    pub fn save_action(&self) -> usize {
        AugmentedAction::Save.encode(self.engine_action_count())
    }

    pub fn time_travel_action(&self) -> usize {
        AugmentedAction::TimeTravel.encode(self.engine_action_count())
    }

    /// Names of the augmented action space, in index order
    pub fn action_meanings(&self) -> Vec<&'static str> {
        let mut meanings = self.engine.action_meanings();
        meanings.push("SAVE");
        meanings.push("TIME_TRAVEL");
        meanings
    }

    /// Sum of rewards along the visible path
    pub fn total_reward(&self) -> f64 {
        self.log.visible().iter().map(|s| s.reward).sum()
    }

    // -------------------------------------------------------------------------
    // Episode control
    // -------------------------------------------------------------------------

    /// Reset the engine and replace the trajectory with an empty one.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<Observation, RecorderError> {
        let observation = self.engine.reset(seed)?;
        self.reset_seed = seed;
        self.session_id = Uuid::new_v4().to_string();
        self.log = StepLog::new(Frame::initial(observation.clone()));
        self.checkpoints = CheckpointStore::new(self.config.checkpoint_interval);
        self.needs_resync = false;
        info!(session = %&self.session_id[..8], seed = ?seed, "Trajectory reset");
        Ok(observation)
    }

    /// Apply one action from the augmented action space.
    pub fn step(&mut self, action: usize) -> Result<Transition, RecorderError> {
        match AugmentedAction::decode(action, self.engine_action_count())? {
            AugmentedAction::TimeTravel => {
                if self.config.disable_time_travel {
                    return Ok(self.head_outcome(0.0));
                }
                Ok(self.time_travel())
            }
            AugmentedAction::Save => {
                self.settle()?;
                self.save_in_place()
            }
            AugmentedAction::Engine(index) => {
                self.settle()?;
                if self.log.head_is_done() {
                    return Ok(self.head_outcome(0.0));
                }
                self.forward(index)
            }
        }
    }

    /// Move one step into the past without touching the engine.
    ///
    /// Returns the now-current entry with the undone reward negated, or the
    /// reset entry with zero reward once the start of history is reached.
    pub fn time_travel(&mut self) -> Transition {
        match self.log.rewind() {
            Some(reward) => {
                debug!(cursor = self.log.cursor(), "Time travel");
                self.head_outcome(-reward)
            }
            None => {
                debug!("Time travel floor reached");
                self.head_outcome(0.0)
            }
        }
    }

    /// Commit to the displaced past: drop the hidden future and every
    /// checkpoint taken in it, then rebuild the engine state.
    ///
    /// If the engine cannot be rebuilt the hidden future and its
    /// checkpoints are put back, leaving the log displaced as before.
    pub fn restore_past_state(&mut self) -> Result<(), RecorderError> {
        let hidden = self.log.take_provisional();
        let later = self.checkpoints.split_after(self.log.action_count());
        info!(
            discarded = hidden.len(),
            dropped_checkpoints = later.len(),
            actions = self.log.action_count(),
            "Restoring past state"
        );
        if let Err(e) = self.load_state_and_walk_forward() {
            warn!("Restore failed, keeping hidden future: {}", e);
            self.log.reinstate_provisional(hidden);
            self.checkpoints.reinstate(later);
            return Err(e);
        }
        Ok(())
    }

    /// Rebuild the engine state for the visible log head.
    ///
    /// Starts from the newest checkpoint (or a reset when there is none)
    /// and replays the remaining recorded actions through the engine's
    /// low-level primitive. Returns the number of actions replayed.
    pub fn load_state_and_walk_forward(&mut self) -> Result<usize, RecorderError> {
        self.needs_resync = true;

        let start = match self.checkpoints.latest() {
            Some(checkpoint) => {
                let step_count = checkpoint.step_count;
                self.engine
                    .restore_state(&checkpoint.state)
                    .map_err(|e| checkpoint_error(step_count, e))?;
                step_count
            }
            None => {
                self.engine.reset(self.reset_seed)?;
                0
            }
        };

        let action_set: Vec<NativeAction> = self.engine.action_set().to_vec();
        let mut replayed = 0;
        for (offset, index) in self.log.actions_from(start).enumerate() {
            let step = start + offset;
            let native = action_set
                .get(index)
                .copied()
                .ok_or_else(|| RecorderError::Replay {
                    step,
                    source: EngineError::UnknownAction {
                        index,
                        size: action_set.len(),
                    },
                })?;
            self.engine
                .act_low_level(native)
                .map_err(|source| RecorderError::Replay { step, source })?;
            replayed += 1;
        }

        if !self.engine.replay_is_deterministic() {
            warn!(
                probability = self.engine.repeat_action_probability(),
                "Replayed with sticky actions; engine state may differ from the recording"
            );
        }

        self.needs_resync = false;
        self.last_replay_len = replayed;
        info!(from = start, replayed, "Engine state rebuilt");
        Ok(replayed)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// The visible trajectory as a demo document
    pub fn to_demo(&self) -> DemoFile {
        let header = DemoHeader {
            session_id: &self.session_id,
            reset_seed: self.reset_seed,
            checkpoint_interval: self.checkpoints.interval(),
            repeat_action_probability: self.engine.repeat_action_probability(),
        };
        DemoFile::from_trajectory(header, &self.log, &self.checkpoints)
    }

    /// Persist the visible trajectory to `path`.
    pub fn save_to_file(&mut self, path: &Path) -> Result<(), RecorderError> {
        self.to_demo()
            .write_to_file(path)
            .map_err(|source| RecorderError::Save {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            actions = self.log.action_count(),
            checkpoints = self.checkpoints.up_to(self.log.action_count()).len(),
            "Demo saved: {}",
            path.display()
        );
        self.last_saved = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace the trajectory with the one stored at `path` and bring the
    /// engine to its head. Returns the head observation.
    ///
    /// The current trajectory is kept if the file cannot be read or the
    /// engine cannot be brought in line with it.
    pub fn load_from_file(&mut self, path: &Path) -> Result<Observation, RecorderError> {
        let staged = DemoFile::read_from_file(path)
            .and_then(|demo| demo.into_staged(self.config.checkpoint_interval))
            .map_err(|source| RecorderError::Deserialization {
                path: path.to_path_buf(),
                source,
            })?;
        let observation = self.install(staged)?;
        info!(
            session = %&self.session_id[..8.min(self.session_id.len())],
            actions = self.log.action_count(),
            checkpoints = self.checkpoints.len(),
            "Demo loaded: {}",
            path.display()
        );
        Ok(observation)
    }

    /// Swap in a staged trajectory, rolling back if the engine cannot follow it.
    pub fn install(&mut self, staged: StagedTrajectory) -> Result<Observation, RecorderError> {
        let previous = StagedTrajectory {
            session_id: mem::replace(&mut self.session_id, staged.session_id),
            reset_seed: mem::replace(&mut self.reset_seed, staged.reset_seed),
            log: mem::replace(&mut self.log, staged.log),
            checkpoints: mem::replace(&mut self.checkpoints, staged.checkpoints),
        };

        match self.resync_from_reset() {
            Ok(_) => Ok(self.log.head().observation.clone()),
            Err(e) => {
                warn!("Discarding staged trajectory: {}", e);
                self.session_id = previous.session_id;
                self.reset_seed = previous.reset_seed;
                self.log = previous.log;
                self.checkpoints = previous.checkpoints;
                self.needs_resync = true;
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn resync_from_reset(&mut self) -> Result<usize, RecorderError> {
        self.needs_resync = true;
        self.engine.reset(self.reset_seed)?;
        self.load_state_and_walk_forward()
    }

    /// Make the engine authoritative for the visible head before it is used.
    fn settle(&mut self) -> Result<(), RecorderError> {
        if self.log.is_displaced() {
            self.restore_past_state()
        } else if self.needs_resync {
            self.load_state_and_walk_forward().map(|_| ())
        } else {
            Ok(())
        }
    }

    fn forward(&mut self, index: usize) -> Result<Transition, RecorderError> {
        let lives_before = self.engine.lives();
        let transition = match self.engine.step(index) {
            Ok(t) => t,
            Err(e) => {
                self.needs_resync = true;
                return Err(e.into());
            }
        };
        self.log
            .push(Step::from_transition(index, lives_before, transition.clone()));

        let action_count = self.log.action_count();
        if !transition.is_done() && self.checkpoints.is_due(action_count) {
            let state = self.engine.clone_state()?;
            debug!(step_count = action_count, bytes = state.len(), "Checkpoint captured");
            self.checkpoints.push(Checkpoint {
                step_count: action_count,
                state,
            });
        }
        Ok(transition)
    }

    /// SAVE: refresh the frame with a neutral step the log never sees, then write the demo.
    fn save_in_place(&mut self) -> Result<Transition, RecorderError> {
        let mut outcome = self.head_outcome(0.0);

        if !self.log.head_is_done() {
            let snapshot = self.engine.clone_state()?;
            let refresh = self.engine.step(self.engine.noop_action());
            if let Err(e) = self.engine.restore_state(&snapshot) {
                self.needs_resync = true;
                return Err(checkpoint_error(self.log.action_count(), e));
            }
            let refresh = refresh?;
            outcome.observation = refresh.observation;
            outcome.info = refresh.info;
        }

        let path = timestamped_demo_path(&self.config.demo_dir);
        self.save_to_file(&path)?;
        Ok(outcome)
    }

    fn head_outcome(&self, reward: f64) -> Transition {
        let head = self.log.head();
        Transition {
            observation: head.observation.clone(),
            reward,
            terminated: head.terminated,
            truncated: head.truncated,
            info: head.info.clone(),
        }
    }
}

fn check_replay_determinism<E: Engine>(
    engine: &E,
    config: &RecorderConfig,
) -> Result<(), RecorderError> {
    if engine.replay_is_deterministic() {
        return Ok(());
    }
    let probability = engine.repeat_action_probability();
    if config.allow_nondeterministic_replay {
        warn!(
            probability,
            "Engine replay is not deterministic; rewound or loaded states may diverge"
        );
        Ok(())
    } else {
        Err(RecorderError::NonDeterministicEngine { probability })
    }
}

fn checkpoint_error(step_count: usize, error: EngineError) -> RecorderError {
    match error {
        EngineError::IncompatibleState(reason) => {
            RecorderError::EngineStateMismatch { step_count, reason }
        }
        other => RecorderError::Engine(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineInfo, EngineSnapshot};
    use std::fs;

    const MAGIC: u8 = 0xA7;

    /// Counting engine: walks a position left/right and hashes every native action.
    #[derive(Debug, Clone, Default)]
    struct MockEngine {
        x: i64,
        frame: u64,
        trace: u64,
        lives: i32,
        done_at_frame: Option<u64>,
        sticky: f64,
        steps: usize,
        low_level_acts: usize,
        resets: usize,
        restores: usize,
        /// Apply the action, then report failure
        fail_step: bool,
        fail_low_level: bool,
    }

    const MOCK_ACTIONS: [NativeAction; 3] = [NativeAction::NOOP, NativeAction::RIGHT, NativeAction::LEFT];

    impl MockEngine {
        fn new() -> Self {
            Self {
                lives: 3,
                ..Self::default()
            }
        }

        fn ending_at(frame: u64) -> Self {
            Self {
                done_at_frame: Some(frame),
                ..Self::new()
            }
        }

        fn apply(&mut self, native: NativeAction) -> f64 {
            self.frame += 1;
            self.trace = self.trace.wrapping_mul(31).wrapping_add(native.0 as u64 + 1);
            match native {
                NativeAction::RIGHT => {
                    self.x += 1;
                    if self.x % 4 == 0 {
                        self.lives -= 1;
                    }
                    1.0
                }
                NativeAction::LEFT => {
                    self.x -= 1;
                    -2.0
                }
                _ => 0.0,
            }
        }

        fn observe(&self) -> Observation {
            let mut bytes = self.x.to_le_bytes().to_vec();
            bytes.extend_from_slice(&self.frame.to_le_bytes());
            bytes.extend_from_slice(&self.trace.to_le_bytes());
            Observation(bytes)
        }

        fn is_done(&self) -> bool {
            self.done_at_frame.is_some_and(|f| self.frame >= f)
        }
    }

    impl Engine for MockEngine {
        fn reset(&mut self, _seed: Option<u64>) -> Result<Observation, EngineError> {
            self.resets += 1;
            self.x = 0;
            self.frame = 0;
            self.trace = 0;
            self.lives = 3;
            Ok(self.observe())
        }

        fn step(&mut self, action: usize) -> Result<Transition, EngineError> {
            let native = *MOCK_ACTIONS.get(action).ok_or(EngineError::UnknownAction {
                index: action,
                size: MOCK_ACTIONS.len(),
            })?;
            self.steps += 1;
            let reward = self.apply(native);
            if self.fail_step {
                return Err(EngineError::Call("step failed".to_string()));
            }
            Ok(Transition {
                observation: self.observe(),
                reward,
                terminated: self.is_done(),
                truncated: false,
                info: EngineInfo::from(serde_json::json!({ "frame": self.frame })),
            })
        }

        fn clone_state(&self) -> Result<EngineSnapshot, EngineError> {
            let mut bytes = vec![MAGIC];
            bytes.extend_from_slice(&self.x.to_le_bytes());
            bytes.extend_from_slice(&self.frame.to_le_bytes());
            bytes.extend_from_slice(&self.trace.to_le_bytes());
            bytes.extend_from_slice(&self.lives.to_le_bytes());
            Ok(EngineSnapshot::new(bytes))
        }

        fn restore_state(&mut self, snapshot: &EngineSnapshot) -> Result<(), EngineError> {
            let bytes = snapshot.as_bytes();
            if bytes.len() != 29 || bytes[0] != MAGIC {
                return Err(EngineError::IncompatibleState("bad mock snapshot".to_string()));
            }
            let word = |at: usize| <[u8; 8]>::try_from(&bytes[at..at + 8]).unwrap();
            self.x = i64::from_le_bytes(word(1));
            self.frame = u64::from_le_bytes(word(9));
            self.trace = u64::from_le_bytes(word(17));
            self.lives = i32::from_le_bytes(<[u8; 4]>::try_from(&bytes[25..29]).unwrap());
            self.restores += 1;
            Ok(())
        }

        fn act_low_level(&mut self, action: NativeAction) -> Result<(), EngineError> {
            if self.fail_low_level {
                return Err(EngineError::Call("low-level act failed".to_string()));
            }
            self.low_level_acts += 1;
            self.apply(action);
            Ok(())
        }

        fn action_set(&self) -> &[NativeAction] {
            &MOCK_ACTIONS
        }

        fn lives(&self) -> i32 {
            self.lives
        }

        fn repeat_action_probability(&self) -> f64 {
            self.sticky
        }
    }

    const NOOP: usize = 0;
    const RIGHT: usize = 1;
    const LEFT: usize = 2;
    const SAVE: usize = 3;
    const TIME_TRAVEL: usize = 4;

    fn recorder_with(engine: MockEngine, interval: usize) -> Recorder<MockEngine> {
        let dir = std::env::temp_dir().join("demo-recorder-unused");
        let config = RecorderConfig::default()
            .with_checkpoint_interval(interval)
            .with_demo_dir(dir);
        Recorder::new(engine, config).unwrap()
    }

    fn recorder(interval: usize) -> Recorder<MockEngine> {
        recorder_with(MockEngine::new(), interval)
    }

    /// Observation a fresh engine reaches after `actions`
    fn expected_after(actions: &[usize]) -> Observation {
        let mut engine = MockEngine::new();
        engine.reset(None).unwrap();
        let mut obs = engine.observe();
        for &a in actions {
            obs = engine.step(a).unwrap().observation;
        }
        obs
    }

    fn actions(pattern: &[usize], n: usize) -> Vec<usize> {
        pattern.iter().copied().cycle().take(n).collect()
    }

    #[test]
    fn test_engine_action_appends_step() {
        let mut rec = recorder(100);
        let out = rec.step(RIGHT).unwrap();
        assert_eq!(out.reward, 1.0);
        assert_eq!(rec.log().len(), 2);
        assert_eq!(rec.log().head().observation, out.observation);
        assert_eq!(rec.log().visible()[0].action, RIGHT);
        assert_eq!(rec.engine().steps, 1);
    }

    #[test]
    fn test_lives_recorded_before_stepping() {
        let mut rec = recorder(100);
        for _ in 0..5 {
            rec.step(RIGHT).unwrap();
        }
        // The fourth RIGHT costs a life; its entry still holds the lives before it.
        let lives: Vec<i32> = rec.log().visible().iter().map(|s| s.lives_before).collect();
        assert_eq!(lives, vec![3, 3, 3, 3, 2]);
    }

    #[test]
    fn test_rewind_then_diverge_scenario() {
        let mut rec = recorder(100);
        for a in [RIGHT, RIGHT, LEFT, RIGHT, NOOP] {
            rec.step(a).unwrap();
        }
        assert_eq!(rec.log().len(), 6);
        assert!(rec.checkpoints().is_empty());

        for _ in 0..3 {
            rec.step(TIME_TRAVEL).unwrap();
        }
        assert_eq!(rec.cursor(), 3);
        assert_eq!(rec.log().len(), 3);
        let resets_before = rec.engine().resets;

        let out = rec.step(LEFT).unwrap();
        assert_eq!(rec.cursor(), 0);
        assert_eq!(rec.log().len(), 4);
        assert!(rec.log().provisional().is_empty());
        assert!(rec.checkpoints().is_empty());
        assert_eq!(rec.engine().resets, resets_before + 1);
        assert_eq!(rec.last_replay_len(), 2);
        assert_eq!(out.observation, expected_after(&[RIGHT, RIGHT, LEFT]));
        let recorded: Vec<usize> = rec.log().actions_from(0).collect();
        assert_eq!(recorded, vec![RIGHT, RIGHT, LEFT]);
    }

    #[test]
    fn test_time_travel_does_not_touch_engine() {
        let mut rec = recorder(100);
        rec.step(RIGHT).unwrap();
        rec.step(RIGHT).unwrap();
        let before = rec.engine().clone();
        rec.step(TIME_TRAVEL).unwrap();
        rec.step(TIME_TRAVEL).unwrap();
        let after = rec.engine();
        assert_eq!(after.steps, before.steps);
        assert_eq!(after.resets, before.resets);
        assert_eq!(after.low_level_acts, before.low_level_acts);
        assert_eq!(after.frame, before.frame);
    }

    #[test]
    fn test_time_travel_reverses_reward() {
        let mut rec = recorder(100);
        let rewards: Vec<f64> = [RIGHT, LEFT, NOOP, RIGHT]
            .iter()
            .map(|&a| rec.step(a).unwrap().reward)
            .collect();
        for expected in rewards.iter().rev() {
            let out = rec.step(TIME_TRAVEL).unwrap();
            assert_eq!(out.reward, -expected);
        }
    }

    #[test]
    fn test_time_travel_returns_previous_entry() {
        let mut rec = recorder(100);
        let first = rec.step(RIGHT).unwrap();
        rec.step(LEFT).unwrap();
        let out = rec.step(TIME_TRAVEL).unwrap();
        assert_eq!(out.observation, first.observation);
        assert_eq!(out.info, first.info);
    }

    #[test]
    fn test_time_travel_floor() {
        let mut rec = recorder(100);
        let initial = rec.log().initial().observation.clone();
        rec.step(RIGHT).unwrap();
        rec.step(TIME_TRAVEL).unwrap();
        for _ in 0..4 {
            let out = rec.step(TIME_TRAVEL).unwrap();
            assert_eq!(out.reward, 0.0);
            assert_eq!(out.observation, initial);
        }
        assert_eq!(rec.cursor(), 1);
    }

    #[test]
    fn test_rewind_to_start_then_act_matches_fresh_successor() {
        let mut rec = recorder(100);
        for a in actions(&[RIGHT, LEFT, RIGHT], 7) {
            rec.step(a).unwrap();
        }
        let m = rec.log().len();
        for _ in 0..m - 1 {
            rec.step(TIME_TRAVEL).unwrap();
        }
        assert_eq!(rec.cursor(), m - 1);
        let out = rec.step(LEFT).unwrap();
        assert_eq!(out.observation, expected_after(&[LEFT]));
        assert_eq!(rec.log().len(), 2);
        assert_eq!(rec.last_replay_len(), 0);
    }

    #[test]
    fn test_checkpoints_follow_interval() {
        let mut rec = recorder(10);
        for a in actions(&[RIGHT, NOOP, LEFT], 35) {
            rec.step(a).unwrap();
        }
        assert_eq!(rec.checkpoints().step_counts(), vec![10, 20, 30]);
    }

    #[test]
    fn test_restore_replays_from_nearest_checkpoint() {
        let mut rec = recorder(10);
        let script = actions(&[RIGHT, NOOP, LEFT, RIGHT], 35);
        for &a in &script {
            rec.step(a).unwrap();
        }
        for _ in 0..7 {
            rec.step(TIME_TRAVEL).unwrap();
        }
        let resets_before = rec.engine().resets;
        let out = rec.step(RIGHT).unwrap();

        assert_eq!(rec.checkpoints().step_counts(), vec![10, 20]);
        assert_eq!(rec.last_replay_len(), 8);
        assert!(rec.last_replay_len() <= rec.checkpoints().interval());
        assert_eq!(rec.engine().resets, resets_before);
        assert_eq!(rec.engine().restores, 1);

        let mut expected = script[..28].to_vec();
        expected.push(RIGHT);
        assert_eq!(out.observation, expected_after(&expected));
    }

    #[test]
    fn test_checkpoints_stay_monotonic_across_rewinds() {
        let mut rec = recorder(5);
        let mut script = actions(&[RIGHT, LEFT, NOOP], 60).into_iter();
        for round in 0..6 {
            for a in script.by_ref().take(8 + round) {
                rec.step(a).unwrap();
            }
            for _ in 0..(3 + round * 2) {
                rec.step(TIME_TRAVEL).unwrap();
            }
            rec.step(NOOP).unwrap();

            let counts = rec.checkpoints().step_counts();
            assert!(counts.windows(2).all(|w| w[0] < w[1]), "{:?}", counts);
            assert!(counts.iter().all(|&c| c <= rec.log().action_count()));
        }
    }

    #[test]
    fn test_terminal_freezes_engine_actions() {
        let mut rec = recorder_with(MockEngine::ending_at(3), 100);
        rec.step(RIGHT).unwrap();
        rec.step(RIGHT).unwrap();
        let last = rec.step(RIGHT).unwrap();
        assert!(last.terminated);

        let frozen = rec.step(LEFT).unwrap();
        assert_eq!(frozen.reward, 0.0);
        assert!(frozen.terminated);
        assert_eq!(frozen.observation, last.observation);
        assert_eq!(rec.engine().steps, 3);
        assert_eq!(rec.log().len(), 4);
    }

    #[test]
    fn test_time_travel_escapes_terminal_state() {
        let mut rec = recorder_with(MockEngine::ending_at(3), 100);
        for _ in 0..3 {
            rec.step(RIGHT).unwrap();
        }
        let out = rec.step(TIME_TRAVEL).unwrap();
        assert!(!out.terminated);
        let resumed = rec.step(LEFT).unwrap();
        assert_eq!(resumed.reward, -2.0);
        assert_eq!(rec.log().len(), 4);
        assert_eq!(resumed.observation, expected_after(&[RIGHT, RIGHT, LEFT]));
    }

    #[test]
    fn test_no_checkpoint_on_terminal_step() {
        let mut rec = recorder_with(MockEngine::ending_at(4), 4);
        for _ in 0..4 {
            rec.step(RIGHT).unwrap();
        }
        assert!(rec.checkpoints().is_empty());
    }

    #[test]
    fn test_invalid_action_rejected_before_engine() {
        let mut rec = recorder(100);
        match rec.step(5) {
            Err(RecorderError::InvalidAction { action: 5, space: 5 }) => {}
            other => panic!("expected InvalidAction, got {:?}", other.map(|t| t.reward)),
        }
        assert_eq!(rec.engine().steps, 0);
        assert_eq!(rec.log().len(), 1);
    }

    #[test]
    fn test_save_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::default()
            .with_checkpoint_interval(2)
            .with_demo_dir(dir.path());
        let mut rec = Recorder::new(MockEngine::new(), config).unwrap();
        rec.step(RIGHT).unwrap();
        let log_before = rec.log().clone();

        let out = rec.step(SAVE).unwrap();
        assert_eq!(out.reward, 0.0);
        assert_eq!(rec.log(), &log_before);
        assert!(rec.checkpoints().is_empty());
        assert!(rec.last_saved().unwrap().exists());

        // The neutral refresh step is undone: the next action lands where it would have.
        let next = rec.step(RIGHT).unwrap();
        assert_eq!(next.observation, expected_after(&[RIGHT, RIGHT]));
        assert_eq!(rec.checkpoints().step_counts(), vec![2]);
    }

    #[test]
    fn test_save_while_displaced_commits_past() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::default().with_demo_dir(dir.path());
        let mut rec = Recorder::new(MockEngine::new(), config).unwrap();
        for a in [RIGHT, RIGHT, LEFT] {
            rec.step(a).unwrap();
        }
        rec.step(TIME_TRAVEL).unwrap();
        rec.step(SAVE).unwrap();
        assert_eq!(rec.cursor(), 0);
        assert_eq!(rec.log().len(), 3);

        let demo = DemoFile::read_from_file(rec.last_saved().unwrap()).unwrap();
        assert_eq!(demo.actions, vec![RIGHT, RIGHT]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.demo");
        let mut rec = recorder(10);
        for a in actions(&[RIGHT, LEFT, RIGHT, NOOP], 25) {
            rec.step(a).unwrap();
        }
        rec.save_to_file(&path).unwrap();

        let mut loaded = recorder(10);
        let head = loaded.load_from_file(&path).unwrap();
        assert_eq!(head, rec.log().head().observation);
        assert_eq!(loaded.log(), rec.log());
        assert_eq!(loaded.checkpoints(), rec.checkpoints());
        assert_eq!(loaded.session_id(), rec.session_id());
        assert_eq!(loaded.last_replay_len(), 5);

        let a = rec.step(RIGHT).unwrap();
        let b = loaded.step(RIGHT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_loaded_trajectory_can_time_travel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.demo");
        let mut rec = recorder(10);
        let script = actions(&[RIGHT, LEFT, RIGHT], 24);
        for &a in &script {
            rec.step(a).unwrap();
        }
        rec.save_to_file(&path).unwrap();

        let mut loaded = recorder(10);
        loaded.load_from_file(&path).unwrap();
        for _ in 0..6 {
            loaded.step(TIME_TRAVEL).unwrap();
        }
        let out = loaded.step(NOOP).unwrap();
        assert_eq!(loaded.checkpoints().step_counts(), vec![10]);
        let mut expected = script[..18].to_vec();
        expected.push(NOOP);
        assert_eq!(out.observation, expected_after(&expected));
    }

    #[test]
    fn test_load_malformed_leaves_trajectory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.demo");
        fs::write(&path, b"{\"format_version\": 1, \"actions\": [").unwrap();

        let mut rec = recorder(100);
        rec.step(RIGHT).unwrap();
        let log_before = rec.log().clone();
        let session_before = rec.session_id().to_string();

        let err = rec.load_from_file(&path).unwrap_err();
        assert!(matches!(err, RecorderError::Deserialization { .. }));
        assert_eq!(rec.log(), &log_before);
        assert_eq!(rec.session_id(), session_before);
        assert_eq!(rec.engine().resets, 1);
    }

    #[test]
    fn test_load_incompatible_checkpoint_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.demo");
        let mut source = recorder(5);
        for a in actions(&[RIGHT, NOOP], 7) {
            source.step(a).unwrap();
        }
        let mut demo = source.to_demo();
        demo.checkpoints[0].engine_state = EngineSnapshot::new(vec![1, 2, 3]);
        demo.write_to_file(&path).unwrap();

        let mut rec = recorder(5);
        rec.step(LEFT).unwrap();
        let log_before = rec.log().clone();

        match rec.load_from_file(&path) {
            Err(RecorderError::EngineStateMismatch { step_count: 5, .. }) => {}
            other => panic!("expected EngineStateMismatch, got {:?}", other),
        }
        assert_eq!(rec.log(), &log_before);

        // The engine is re-synced with the kept trajectory before its next use.
        let out = rec.step(LEFT).unwrap();
        assert_eq!(out.observation, expected_after(&[LEFT, LEFT]));
    }

    #[test]
    fn test_failed_restore_keeps_hidden_future() {
        let mut rec = recorder(2);
        for a in [RIGHT, LEFT, RIGHT, NOOP, RIGHT] {
            rec.step(a).unwrap();
        }
        rec.step(TIME_TRAVEL).unwrap();
        rec.step(TIME_TRAVEL).unwrap();
        let log_before = rec.log().clone();
        let checkpoints_before = rec.checkpoints().clone();
        assert_eq!(checkpoints_before.step_counts(), vec![2, 4]);

        rec.engine.fail_low_level = true;
        match rec.step(NOOP) {
            Err(RecorderError::Replay { step: 2, .. }) => {}
            other => panic!("expected Replay at 2, got {:?}", other.map(|t| t.reward)),
        }
        assert_eq!(rec.log(), &log_before);
        assert_eq!(rec.cursor(), 2);
        assert_eq!(rec.log().provisional().len(), 2);
        assert_eq!(rec.checkpoints(), &checkpoints_before);

        // Time travel still works on the kept history.
        let out = rec.step(TIME_TRAVEL).unwrap();
        assert_eq!(out.reward, -1.0);
        assert_eq!(rec.cursor(), 3);

        rec.engine.fail_low_level = false;
        let out = rec.step(NOOP).unwrap();
        assert_eq!(out.observation, expected_after(&[RIGHT, LEFT, NOOP]));
        assert_eq!(rec.cursor(), 0);
        assert_eq!(rec.log().len(), 4);
        assert_eq!(rec.checkpoints().step_counts(), vec![2]);
    }

    #[test]
    fn test_engine_step_failure_resyncs_next_action() {
        let mut rec = recorder(100);
        for _ in 0..3 {
            rec.step(RIGHT).unwrap();
        }
        let log_before = rec.log().clone();

        rec.engine.fail_step = true;
        assert!(matches!(rec.step(LEFT), Err(RecorderError::Engine(EngineError::Call(_)))));
        assert_eq!(rec.log(), &log_before);

        rec.engine.fail_step = false;
        let resets_before = rec.engine().resets;
        let acts_before = rec.engine().low_level_acts;
        let out = rec.step(LEFT).unwrap();
        // The half-applied LEFT is gone: the engine was rebuilt from the log first.
        assert_eq!(out.observation, expected_after(&[RIGHT, RIGHT, RIGHT, LEFT]));
        assert_eq!(rec.engine().resets, resets_before + 1);
        assert_eq!(rec.engine().low_level_acts, acts_before + 3);
        assert_eq!(rec.last_replay_len(), 3);
    }

    #[test]
    fn test_load_rolls_back_on_replay_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.demo");
        let mut source = recorder(5);
        for a in actions(&[RIGHT, NOOP], 7) {
            source.step(a).unwrap();
        }
        source.save_to_file(&path).unwrap();

        let mut rec = recorder(5);
        rec.step(LEFT).unwrap();
        let log_before = rec.log().clone();
        let session_before = rec.session_id().to_string();

        rec.engine.fail_low_level = true;
        match rec.load_from_file(&path) {
            Err(RecorderError::Replay { step: 5, .. }) => {}
            other => panic!("expected Replay at 5, got {:?}", other),
        }
        assert_eq!(rec.log(), &log_before);
        assert_eq!(rec.session_id(), session_before);
        assert!(rec.checkpoints().is_empty());

        rec.engine.fail_low_level = false;
        let out = rec.step(LEFT).unwrap();
        assert_eq!(out.observation, expected_after(&[LEFT, LEFT]));
    }

    #[test]
    fn test_sticky_engine_refused_by_default() {
        let engine = MockEngine {
            sticky: 0.25,
            ..MockEngine::new()
        };
        match Recorder::new(engine.clone(), RecorderConfig::default()) {
            Err(RecorderError::NonDeterministicEngine { probability }) => {
                assert_eq!(probability, 0.25)
            }
            other => panic!("expected NonDeterministicEngine, got {:?}", other.is_ok()),
        }

        let config = RecorderConfig {
            allow_nondeterministic_replay: true,
            ..RecorderConfig::default()
        };
        assert!(Recorder::new(engine, config).is_ok());
    }

    #[test]
    fn test_disabled_time_travel_is_noop() {
        let config = RecorderConfig {
            disable_time_travel: true,
            ..RecorderConfig::default()
        };
        let mut rec = Recorder::new(MockEngine::new(), config).unwrap();
        let first = rec.step(RIGHT).unwrap();
        let out = rec.step(TIME_TRAVEL).unwrap();
        assert_eq!(out.reward, 0.0);
        assert_eq!(out.observation, first.observation);
        assert_eq!(rec.cursor(), 0);
        assert_eq!(rec.engine().steps, 1);
    }

    #[test]
    fn test_reset_discards_trajectory() {
        let mut rec = recorder(2);
        for _ in 0..5 {
            rec.step(RIGHT).unwrap();
        }
        rec.step(TIME_TRAVEL).unwrap();
        let old_session = rec.session_id().to_string();
        rec.reset(Some(9)).unwrap();
        assert_eq!(rec.log().len(), 1);
        assert_eq!(rec.cursor(), 0);
        assert!(rec.checkpoints().is_empty());
        assert_eq!(rec.reset_seed(), Some(9));
        assert_ne!(rec.session_id(), old_session);
    }

    #[test]
    fn test_action_meanings_include_meta_actions() {
        let rec = recorder(100);
        assert_eq!(
            rec.action_meanings(),
            vec!["NOOP", "RIGHT", "LEFT", "SAVE", "TIME_TRAVEL"]
        );
        assert_eq!(rec.action_space_size(), 5);
        assert_eq!(rec.save_action(), SAVE);
        assert_eq!(rec.time_travel_action(), TIME_TRAVEL);
    }
}
