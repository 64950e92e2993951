//! Cavern game state and rules

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ARCADE_DOOR_REWARD, ARCADE_EXIT_REWARD, ARCADE_KEY_REWARD, ARCADE_RAM_SIZE,
    ARCADE_START_LIVES,
};
use crate::engine::{
    Engine, EngineError, EngineInfo, EngineSnapshot, NativeAction, Observation, Transition,
};

use super::layout::{Layout, Tile};
use super::{ArcadeConfig, ObsType};

/// Minimal action set, in index order
const ACTION_SET: [NativeAction; 6] = [
    NativeAction::NOOP,
    NativeAction::FIRE,
    NativeAction::UP,
    NativeAction::RIGHT,
    NativeAction::LEFT,
    NativeAction::DOWN,
];

const STICKY_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Facing {
    Up,
    Right,
    Left,
    Down,
}

impl Facing {
    fn delta(self) -> (i32, i32) {
        match self {
            Facing::Up => (0, -1),
            Facing::Right => (1, 0),
            Facing::Left => (-1, 0),
            Facing::Down => (0, 1),
        }
    }

    fn from_action(action: NativeAction) -> Option<Self> {
        match action {
            NativeAction::UP => Some(Facing::Up),
            NativeAction::RIGHT => Some(Facing::Right),
            NativeAction::LEFT => Some(Facing::Left),
            NativeAction::DOWN => Some(Facing::Down),
            _ => None,
        }
    }

    fn index(self) -> u8 {
        match self {
            Facing::Up => 0,
            Facing::Right => 1,
            Facing::Left => 2,
            Facing::Down => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CavernState {
    x: i32,
    y: i32,
    facing: Facing,
    lives: i32,
    score: f64,
    keys_held: u32,
    collected_keys: Vec<(i32, i32)>,
    opened_doors: Vec<(i32, i32)>,
    episode_frame: u64,
    /// Frames since the engine was created; survives resets
    frame_number: u64,
    last_action: NativeAction,
    seed: u64,
    terminated: bool,
}

/// Everything a snapshot must agree on to be applied to this engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Signature {
    layout: String,
    width: usize,
    height: usize,
    frameskip: u32,
    repeat_action_probability: f64,
}

#[derive(Serialize, Deserialize)]
struct SnapshotPayload {
    signature: Signature,
    state: CavernState,
}

/// Single-room game: collect the key, open the door, reach the exit.
#[derive(Debug, Clone)]
pub struct Cavern {
    config: ArcadeConfig,
    layout: Layout,
    state: CavernState,
}

impl Cavern {
    /// Build an engine from config, loading the configured layout.
    pub fn new(config: ArcadeConfig) -> Result<Self, EngineError> {
        let layout = match &config.layout_file {
            Some(path) => Layout::load_from_file(path).map_err(EngineError::InvalidConfig)?,
            None => Layout::default_layout(),
        };
        Self::with_layout(config, layout)
    }

    pub fn with_layout(config: ArcadeConfig, layout: Layout) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let state = fresh_state(&layout, config.seed, 0);
        Ok(Self {
            config,
            layout,
            state,
        })
    }

    pub fn config(&self) -> &ArcadeConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn position(&self) -> (i32, i32) {
        (self.state.x, self.state.y)
    }

    pub fn score(&self) -> f64 {
        self.state.score
    }

    pub fn keys_held(&self) -> u32 {
        self.state.keys_held
    }

    pub fn is_terminated(&self) -> bool {
        self.state.terminated
    }

    pub fn is_truncated(&self) -> bool {
        !self.state.terminated
            && self.config.max_frames > 0
            && self.state.episode_frame >= self.config.max_frames
    }

    fn signature(&self) -> Signature {
        Signature {
            layout: self.layout.name.clone(),
            width: self.layout.width,
            height: self.layout.height,
            frameskip: self.config.frameskip,
            repeat_action_probability: self.config.repeat_action_probability,
        }
    }

    /// Run one action for `frameskip` frames, stopping early at episode end.
    fn advance(&mut self, action: NativeAction) -> f64 {
        let mut reward = 0.0;
        for _ in 0..self.config.frameskip {
            if self.state.terminated || self.is_truncated() {
                break;
            }
            reward += self.frame(action);
        }
        self.state.score += reward;
        reward
    }

    fn frame(&mut self, action: NativeAction) -> f64 {
        let effective = if self.sticky_repeat() {
            self.state.last_action
        } else {
            action
        };
        self.state.last_action = effective;
        self.state.episode_frame += 1;
        self.state.frame_number += 1;

        if let Some(facing) = Facing::from_action(effective) {
            self.state.facing = facing;
            let (dx, dy) = facing.delta();
            self.enter(self.state.x + dx, self.state.y + dy)
                .unwrap_or(0.0)
        } else if effective == NativeAction::FIRE {
            self.leap()
        } else {
            0.0
        }
    }

    /// Sticky-action draw, keyed on the episode seed and frame so replay reproduces it.
    fn sticky_repeat(&self) -> bool {
        let p = self.config.repeat_action_probability;
        if p <= 0.0 {
            return false;
        }
        let mut rng = StdRng::seed_from_u64(
            self.state.seed ^ self.state.episode_frame.wrapping_mul(STICKY_SEED_MIX),
        );
        rng.gen_bool(p)
    }

    /// Jump two tiles in the facing direction, clearing whatever is in between.
    fn leap(&mut self) -> f64 {
        let (dx, dy) = self.state.facing.delta();
        let (mx, my) = (self.state.x + dx, self.state.y + dy);
        if self.blocks(mx, my) {
            return 0.0;
        }
        if let Some(reward) = self.enter(mx + dx, my + dy) {
            return reward;
        }
        self.enter(mx, my).unwrap_or(0.0)
    }

    fn blocks(&self, x: i32, y: i32) -> bool {
        match self.layout.tile(x, y) {
            Tile::Wall => true,
            Tile::Door => !self.state.opened_doors.contains(&(x, y)),
            _ => false,
        }
    }

    /// Move onto `(x, y)` if possible and apply its effect. `None` when blocked.
    fn enter(&mut self, x: i32, y: i32) -> Option<f64> {
        let mut reward = 0.0;
        match self.layout.tile(x, y) {
            Tile::Wall => return None,
            Tile::Door if !self.state.opened_doors.contains(&(x, y)) => {
                if self.state.keys_held == 0 {
                    return None;
                }
                self.state.keys_held -= 1;
                self.state.opened_doors.push((x, y));
                reward += ARCADE_DOOR_REWARD;
            }
            _ => {}
        }

        self.state.x = x;
        self.state.y = y;

        match self.layout.tile(x, y) {
            Tile::Key if !self.state.collected_keys.contains(&(x, y)) => {
                self.state.collected_keys.push((x, y));
                self.state.keys_held += 1;
                reward += ARCADE_KEY_REWARD;
            }
            Tile::Spikes => self.lose_life(),
            Tile::Exit => {
                self.state.terminated = true;
                reward += ARCADE_EXIT_REWARD;
            }
            _ => {}
        }
        Some(reward)
    }

    fn lose_life(&mut self) {
        self.state.lives -= 1;
        if self.state.lives <= 0 {
            self.state.lives = 0;
            self.state.terminated = true;
        } else {
            let (sx, sy) = self.layout.start;
            self.state.x = sx;
            self.state.y = sy;
            self.state.facing = Facing::Right;
        }
    }

    fn observe(&self) -> Observation {
        match self.config.obs_type {
            ObsType::Ram => self.ram(),
            ObsType::Screen => self.screen(),
        }
    }

    fn ram(&self) -> Observation {
        let s = &self.state;
        let mut ram = vec![0u8; ARCADE_RAM_SIZE];
        ram[0] = s.x.clamp(0, 255) as u8;
        ram[1] = s.y.clamp(0, 255) as u8;
        ram[2] = s.lives.clamp(0, 255) as u8;
        ram[3] = s.keys_held.min(255) as u8;
        ram[4] = s.facing.index();
        ram[5] = s.last_action.0;
        ram[6] = s.terminated as u8;
        ram[8..12].copy_from_slice(&(s.score.max(0.0) as u32).to_le_bytes());
        ram[12..16].copy_from_slice(&(s.episode_frame as u32).to_le_bytes());

        for (i, pos) in self.layout.positions_of(Tile::Key).take(32).enumerate() {
            ram[32 + i] = s.collected_keys.contains(&pos) as u8;
        }
        for (i, pos) in self.layout.positions_of(Tile::Door).take(32).enumerate() {
            ram[64 + i] = s.opened_doors.contains(&pos) as u8;
        }
        Observation(ram)
    }

    fn screen(&self) -> Observation {
        let width = self.layout.width;
        let mut screen: Vec<u8> = self.layout.tiles().iter().map(|t| t.glyph()).collect();
        for &(x, y) in &self.state.collected_keys {
            screen[y as usize * width + x as usize] = Tile::Empty.glyph();
        }
        for &(x, y) in &self.state.opened_doors {
            screen[y as usize * width + x as usize] = b'/';
        }
        let (px, py) = (self.state.x as usize, self.state.y as usize);
        if let Some(cell) = screen.get_mut(py * width + px) {
            *cell = b'P';
        }
        Observation(screen)
    }

    fn info(&self) -> EngineInfo {
        EngineInfo::from(serde_json::json!({
            "lives": self.state.lives,
            "episode_frame_number": self.state.episode_frame,
            "frame_number": self.state.frame_number,
        }))
    }
}

fn fresh_state(layout: &Layout, seed: u64, frame_number: u64) -> CavernState {
    let (x, y) = layout.start;
    CavernState {
        x,
        y,
        facing: Facing::Right,
        lives: ARCADE_START_LIVES,
        score: 0.0,
        keys_held: 0,
        collected_keys: Vec::new(),
        opened_doors: Vec::new(),
        episode_frame: 0,
        frame_number,
        last_action: NativeAction::NOOP,
        seed,
        terminated: false,
    }
}

impl Engine for Cavern {
    fn reset(&mut self, seed: Option<u64>) -> Result<Observation, EngineError> {
        let seed = seed.unwrap_or(self.config.seed);
        self.state = fresh_state(&self.layout, seed, self.state.frame_number);
        Ok(self.observe())
    }

    fn step(&mut self, action: usize) -> Result<Transition, EngineError> {
        let native = *ACTION_SET.get(action).ok_or(EngineError::UnknownAction {
            index: action,
            size: ACTION_SET.len(),
        })?;
        let reward = self.advance(native);
        Ok(Transition {
            observation: self.observe(),
            reward,
            terminated: self.state.terminated,
            truncated: self.is_truncated(),
            info: self.info(),
        })
    }

    fn clone_state(&self) -> Result<EngineSnapshot, EngineError> {
        let payload = SnapshotPayload {
            signature: self.signature(),
            state: self.state.clone(),
        };
        serde_json::to_vec(&payload)
            .map(EngineSnapshot::new)
            .map_err(|e| EngineError::Call(format!("Failed to serialize state: {}", e)))
    }

    fn restore_state(&mut self, snapshot: &EngineSnapshot) -> Result<(), EngineError> {
        let payload: SnapshotPayload = serde_json::from_slice(snapshot.as_bytes())
            .map_err(|e| EngineError::IncompatibleState(e.to_string()))?;
        let expected = self.signature();
        if payload.signature != expected {
            return Err(EngineError::IncompatibleState(format!(
                "snapshot taken on layout '{}' ({}x{}, frameskip {}, repeat {}), engine runs '{}' ({}x{}, frameskip {}, repeat {})",
                payload.signature.layout,
                payload.signature.width,
                payload.signature.height,
                payload.signature.frameskip,
                payload.signature.repeat_action_probability,
                expected.layout,
                expected.width,
                expected.height,
                expected.frameskip,
                expected.repeat_action_probability,
            )));
        }
        self.state = payload.state;
        Ok(())
    }

    fn act_low_level(&mut self, action: NativeAction) -> Result<(), EngineError> {
        self.advance(action);
        Ok(())
    }

    fn action_set(&self) -> &[NativeAction] {
        &ACTION_SET
    }

    fn lives(&self) -> i32 {
        self.state.lives
    }

    fn repeat_action_probability(&self) -> f64 {
        self.config.repeat_action_probability
    }

    fn replay_is_deterministic(&self) -> bool {
        // Sticky draws are keyed on state that snapshots carry.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOOP: usize = 0;
    const FIRE: usize = 1;
    const UP: usize = 2;
    const RIGHT: usize = 3;
    const LEFT: usize = 4;
    const DOWN: usize = 5;

    /// Start to exit through the key and the door
    const WALKTHROUGH: [usize; 15] = [
        DOWN, DOWN, RIGHT, RIGHT, RIGHT, RIGHT, RIGHT, RIGHT, UP, UP, RIGHT, RIGHT, RIGHT, RIGHT,
        RIGHT,
    ];

    fn cavern() -> Cavern {
        Cavern::new(ArcadeConfig::default()).unwrap()
    }

    fn cavern_with(config: ArcadeConfig) -> Cavern {
        let mut c = Cavern::new(config).unwrap();
        c.reset(None).unwrap();
        c
    }

    fn run(c: &mut Cavern, actions: &[usize]) -> Vec<Transition> {
        actions.iter().map(|&a| c.step(a).unwrap()).collect()
    }

    #[test]
    fn test_walkthrough_reaches_exit() {
        let mut c = cavern();
        c.reset(None).unwrap();
        let out = run(&mut c, &WALKTHROUGH);

        assert_eq!(out[3].reward, ARCADE_KEY_REWARD);
        assert_eq!(out[6].reward, ARCADE_DOOR_REWARD);
        assert_eq!(out[14].reward, ARCADE_EXIT_REWARD);
        assert!(out[..14].iter().all(|t| !t.terminated));
        assert!(out[14].terminated);
        assert_eq!(c.score(), 1400.0);
        assert_eq!(c.position(), (12, 1));
    }

    #[test]
    fn test_door_blocks_without_key() {
        let mut c = cavern();
        run(&mut c, &[RIGHT, RIGHT, RIGHT, RIGHT, DOWN, DOWN]);
        assert_eq!(c.position(), (5, 3));
        let out = c.step(RIGHT).unwrap();
        assert_eq!(out.reward, 0.0);
        assert_eq!(c.position(), (5, 3));
    }

    #[test]
    fn test_spikes_cost_a_life() {
        let mut c = cavern();
        let out = run(&mut c, &[DOWN, DOWN, DOWN, RIGHT]);
        assert_eq!(c.lives(), ARCADE_START_LIVES - 1);
        assert_eq!(c.position(), c.layout().start);
        assert!(!out[3].terminated);
        assert_eq!(out[3].info.get("lives"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn test_last_life_terminates() {
        let mut c = cavern();
        for _ in 0..ARCADE_START_LIVES {
            run(&mut c, &[DOWN, DOWN, DOWN, RIGHT]);
        }
        assert_eq!(c.lives(), 0);
        assert!(c.is_terminated());

        // Nothing moves once the episode is over.
        let out = c.step(LEFT).unwrap();
        assert_eq!(out.reward, 0.0);
        assert!(out.terminated);
    }

    #[test]
    fn test_leap_clears_spikes() {
        let mut c = cavern();
        run(&mut c, &WALKTHROUGH[..8]);
        assert_eq!(c.position(), (7, 3));
        c.step(RIGHT).unwrap();
        let out = c.step(FIRE).unwrap();
        assert_eq!(c.position(), (10, 3));
        assert_eq!(c.lives(), ARCADE_START_LIVES);
        assert_eq!(out.reward, 0.0);
    }

    #[test]
    fn test_leap_into_wall_does_nothing() {
        let mut c = cavern();
        c.step(UP).unwrap();
        c.step(FIRE).unwrap();
        assert_eq!(c.position(), (1, 1));
    }

    #[test]
    fn test_frameskip_repeats_action() {
        let mut c = cavern_with(ArcadeConfig {
            frameskip: 2,
            ..ArcadeConfig::default()
        });
        let out = c.step(RIGHT).unwrap();
        assert_eq!(c.position(), (3, 1));
        assert_eq!(out.info.get("episode_frame_number"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_max_frames_truncates() {
        let mut c = cavern_with(ArcadeConfig {
            max_frames: 3,
            ..ArcadeConfig::default()
        });
        let out = run(&mut c, &[NOOP, NOOP, NOOP]);
        assert!(!out[1].truncated);
        assert!(out[2].truncated);
        assert!(!out[2].terminated);
    }

    #[test]
    fn test_ram_observation() {
        let mut c = cavern();
        let obs = c.reset(None).unwrap();
        assert_eq!(obs.len(), ARCADE_RAM_SIZE);
        assert_eq!(&obs.as_bytes()[..3], &[1, 1, ARCADE_START_LIVES as u8]);
        run(&mut c, &WALKTHROUGH[..4]);
        let obs = c.step(NOOP).unwrap().observation;
        assert_eq!(obs.as_bytes()[3], 1);
        assert_eq!(obs.as_bytes()[32], 1);
    }

    #[test]
    fn test_screen_observation() {
        let mut c = cavern_with(ArcadeConfig {
            obs_type: ObsType::Screen,
            ..ArcadeConfig::default()
        });
        let obs = c.reset(None).unwrap();
        assert_eq!(obs.len(), 14 * 6);
        assert_eq!(obs.as_bytes()[14 + 1], b'P');
        assert_eq!(obs.as_bytes()[3 * 14 + 3], b'k');
        let out = run(&mut c, &WALKTHROUGH[..6]);
        let screen = out[5].observation.as_bytes();
        assert_eq!(screen[3 * 14 + 3], b'.');
        assert_eq!(screen[3 * 14 + 5], b'P');
    }

    #[test]
    fn test_snapshot_restores_exact_state() {
        let mut c = cavern();
        run(&mut c, &WALKTHROUGH[..5]);
        let snapshot = c.clone_state().unwrap();
        let ahead = run(&mut c, &WALKTHROUGH[5..]);

        c.restore_state(&snapshot).unwrap();
        let again = run(&mut c, &WALKTHROUGH[5..]);
        assert_eq!(ahead, again);
    }

    #[test]
    fn test_restore_rejects_foreign_snapshots() {
        let c = cavern();
        let snapshot = c.clone_state().unwrap();

        let mut other = cavern_with(ArcadeConfig {
            frameskip: 4,
            ..ArcadeConfig::default()
        });
        assert!(matches!(
            other.restore_state(&snapshot),
            Err(EngineError::IncompatibleState(_))
        ));
        assert!(matches!(
            other.restore_state(&EngineSnapshot::new(b"not a snapshot".to_vec())),
            Err(EngineError::IncompatibleState(_))
        ));
    }

    #[test]
    fn test_act_low_level_matches_step() {
        let config = ArcadeConfig {
            frameskip: 3,
            repeat_action_probability: 0.3,
            ..ArcadeConfig::default()
        };
        let mut stepped = cavern_with(config.clone());
        let mut replayed = cavern_with(config);
        let script = [RIGHT, DOWN, DOWN, RIGHT, LEFT, FIRE, UP, RIGHT, DOWN, RIGHT];
        run(&mut stepped, &script);
        for &a in &script {
            replayed.act_low_level(ACTION_SET[a]).unwrap();
        }
        assert_eq!(stepped.clone_state(), replayed.clone_state());
    }

    #[test]
    fn test_sticky_actions_repeat_previous() {
        let mut c = cavern_with(ArcadeConfig {
            repeat_action_probability: 1.0,
            ..ArcadeConfig::default()
        });
        c.step(RIGHT).unwrap();
        assert_eq!(c.position(), (1, 1));
        assert!(c.replay_is_deterministic());
    }

    #[test]
    fn test_sticky_replay_from_snapshot() {
        let mut c = cavern_with(ArcadeConfig {
            repeat_action_probability: 0.5,
            seed: 42,
            ..ArcadeConfig::default()
        });
        run(&mut c, &[RIGHT, DOWN, RIGHT]);
        let snapshot = c.clone_state().unwrap();
        let script = [RIGHT, RIGHT, DOWN, LEFT, RIGHT, UP, RIGHT, DOWN];
        let first = run(&mut c, &script);
        c.restore_state(&snapshot).unwrap();
        let second = run(&mut c, &script);
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_keeps_frame_number() {
        let mut c = cavern();
        run(&mut c, &[NOOP, NOOP]);
        c.reset(None).unwrap();
        let out = c.step(NOOP).unwrap();
        assert_eq!(out.info.get("frame_number"), Some(&serde_json::json!(3)));
        assert_eq!(out.info.get("episode_frame_number"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_unknown_action_index() {
        let mut c = cavern();
        assert_eq!(
            c.step(6).unwrap_err(),
            EngineError::UnknownAction { index: 6, size: 6 }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Cavern::new(ArcadeConfig {
            frameskip: 0,
            ..ArcadeConfig::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }
}
