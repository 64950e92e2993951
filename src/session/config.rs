//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::arcade::{ArcadeConfig, ObsType};
use crate::constants::{ARCADE_MAX_FRAMES, DEFAULT_CHECKPOINT_INTERVAL, DEMOS_DIR};
use crate::recorder::RecorderConfig;

/// Configuration for a headless recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Display frame rate (kept for compatibility, nothing is rendered)
    pub fps: u32,
    /// Display zoom factor (kept for compatibility, nothing is rendered)
    pub zoom: u32,
    /// Observation type reported by the engine
    pub obs_type: ObsType,
    /// Frames simulated per action
    pub frameskip: u32,
    /// Sticky action probability
    pub repeat_action_probability: f64,
    /// Episode frame budget (0 = unlimited)
    pub max_frames: u64,
    /// Layout file for the arcade room (None = built-in room)
    pub layout_file: Option<String>,
    /// Reset seed (None = engine default)
    pub seed: Option<u64>,
    /// Recorded actions between checkpoints (0 = never)
    pub checkpoint_interval: usize,
    pub disable_time_travel: bool,
    pub allow_nondeterministic_replay: bool,
    /// Root directory of demo collections
    pub demo_root: String,
    /// Collection name; demos go to `<demo_root>/<demo_name>`
    pub demo_name: String,
    /// Demo to load before the script runs
    pub load_demo: Option<String>,
    /// Inline action script
    pub script: String,
    /// Script file, appended after the inline script
    pub script_file: Option<String>,
    /// Save the trajectory once the script has run
    pub save_on_exit: bool,
    /// Summary JSON path (None = stdout)
    pub output_file: Option<String>,
    /// Suppress progress output
    pub quiet: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            zoom: 3,
            obs_type: ObsType::Ram,
            frameskip: 1,
            repeat_action_probability: 0.0,
            max_frames: ARCADE_MAX_FRAMES,
            layout_file: None,
            seed: None,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            disable_time_travel: false,
            allow_nondeterministic_replay: false,
            demo_root: DEMOS_DIR.to_string(),
            demo_name: "cavern".to_string(),
            load_demo: None,
            script: String::new(),
            script_file: None,
            save_on_exit: false,
            output_file: None,
            quiet: false,
        }
    }
}

/// Template session settings (checked into git)
pub const SESSION_SETTINGS_TEMPLATE: &str = "config/session_settings.template.json";
/// Local session settings (gitignored, user's custom settings)
pub const SESSION_SETTINGS_FILE: &str = "config/session_settings.json";

impl SessionConfig {
    /// Load configuration from a JSON settings file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path, e))
    }

    /// Load configuration from default config files
    /// Priority: local settings > template settings > built-in defaults
    pub fn from_config_files() -> Self {
        if let Ok(config) = Self::from_file(SESSION_SETTINGS_FILE) {
            return config;
        }
        if let Ok(config) = Self::from_file(SESSION_SETTINGS_TEMPLATE) {
            return config;
        }
        Self::default()
    }

    /// Parse configuration from command line arguments
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_arg_list(Self::from_config_files(), &args)
    }

    /// Apply `--settings` and then every flag in `args` on top of `base`.
    /// `args[0]` is the program name.
    pub fn from_arg_list(base: Self, args: &[String]) -> Self {
        let mut config = base;

        // Explicit settings file replaces the base before flags apply
        if let Some(i) = args.iter().position(|a| a == "--settings")
            && let Some(path) = args.get(i + 1)
        {
            match Self::from_file(path) {
                Ok(loaded) => config = loaded,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            match (args[i].as_str(), value) {
                ("--settings", Some(_)) => i += 1,
                ("--fps", Some(v)) => {
                    config.fps = v.parse().unwrap_or(config.fps);
                    i += 1;
                }
                ("--zoom", Some(v)) => {
                    config.zoom = v.parse().unwrap_or(config.zoom);
                    i += 1;
                }
                ("--obs-type", Some(v)) => {
                    match v.parse() {
                        Ok(obs_type) => config.obs_type = obs_type,
                        Err(e) => tracing::warn!("{}", e),
                    }
                    i += 1;
                }
                ("--frameskip", Some(v)) => {
                    config.frameskip = v.parse().unwrap_or(config.frameskip);
                    i += 1;
                }
                ("--sticky", Some(v)) => {
                    config.repeat_action_probability =
                        v.parse().unwrap_or(config.repeat_action_probability);
                    i += 1;
                }
                ("--max-frames", Some(v)) => {
                    config.max_frames = v.parse().unwrap_or(config.max_frames);
                    i += 1;
                }
                ("--layout", Some(v)) => {
                    config.layout_file = Some(v.clone());
                    i += 1;
                }
                ("--seed", Some(v)) => {
                    config.seed = v.parse().ok();
                    i += 1;
                }
                ("--checkpoint-interval", Some(v)) => {
                    config.checkpoint_interval = v.parse().unwrap_or(config.checkpoint_interval);
                    i += 1;
                }
                ("--name", Some(v)) => {
                    config.demo_name = v.clone();
                    i += 1;
                }
                ("--demo-root", Some(v)) => {
                    config.demo_root = v.clone();
                    i += 1;
                }
                ("--load", Some(v)) => {
                    config.load_demo = Some(v.clone());
                    i += 1;
                }
                ("--actions", Some(v)) => {
                    config.script = v.clone();
                    i += 1;
                }
                ("--script", Some(v)) => {
                    config.script_file = Some(v.clone());
                    i += 1;
                }
                ("--output", Some(v)) => {
                    config.output_file = Some(v.clone());
                    i += 1;
                }
                ("--no-time-travel", _) => config.disable_time_travel = true,
                ("--allow-sticky-replay", _) => config.allow_nondeterministic_replay = true,
                ("--save", _) => config.save_on_exit = true,
                ("--quiet" | "-q", _) => config.quiet = true,
                ("--debug-log", _) => {}
                ("--help" | "-h", _) => {
                    print_help();
                    std::process::exit(0);
                }
                (other, _) => tracing::warn!("Ignoring unknown argument '{}'", other),
            }
            i += 1;
        }

        config
    }

    /// Directory SAVE writes into
    pub fn demo_dir(&self) -> PathBuf {
        Path::new(&self.demo_root).join(&self.demo_name)
    }

    pub fn arcade_config(&self) -> ArcadeConfig {
        ArcadeConfig {
            obs_type: self.obs_type,
            frameskip: self.frameskip,
            repeat_action_probability: self.repeat_action_probability,
            max_frames: self.max_frames,
            seed: self.seed.unwrap_or_default(),
            layout_file: self.layout_file.as_ref().map(PathBuf::from),
        }
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            checkpoint_interval: self.checkpoint_interval,
            disable_time_travel: self.disable_time_travel,
            demo_dir: self.demo_dir(),
            seed: self.seed,
            allow_nondeterministic_replay: self.allow_nondeterministic_replay,
        }
    }
}

fn print_help() {
    println!(
        r#"Demo Recorder - Record, rewind and save arcade demonstrations headlessly

USAGE:
    cargo run --bin demo-recorder -- [OPTIONS]

OPTIONS:
    --settings <FILE>             Load settings from JSON file (CLI args override file settings)
    --actions <SCRIPT>            Inline action script (e.g. "DOWN x2, RIGHT x3, t, save")
    --script <FILE>               Read the action script from a file
    --load <DEMO>                 Load a saved demo before running the script
    --save                        Save the trajectory when the script finishes
    --name <NAME>                 Demo collection name (default: cavern)
    --demo-root <DIR>             Root of demo collections (default: output/demos)
    --seed <N>                    Reset seed
    --checkpoint-interval <N>     Actions between checkpoints (default: 100, 0 = never)
    --no-time-travel              Treat TIME_TRAVEL as a no-op
    --obs-type <ram|screen>       Observation type (default: ram)
    --frameskip <N>               Frames per action (default: 1)
    --sticky <P>                  Repeat-action probability (default: 0.0)
    --allow-sticky-replay         Record even if replay may diverge
    --max-frames <N>              Episode frame budget (default: 18000)
    --layout <FILE>               Room layout file (default: built-in room)
    --fps <N>                     Display frame rate (accepted, unused)
    --zoom <N>                    Display zoom (accepted, unused)
    --output <FILE>               Write the session summary JSON to file (default: stdout)
    --quiet, -q                   Suppress progress output
    --debug-log                   Log at debug level (RUST_LOG overrides)
    --help, -h                    Show this help

ACTIONS:
    NOOP, FIRE, UP, RIGHT, LEFT, DOWN, or an index 0-5
    save, s                       Save the trajectory (index 6)
    time_travel, t                Step one action into the past (index 7)
    Append xN to repeat a token: RIGHT x5

EXAMPLES:
    # Walk to the key, undo the last step, save
    cargo run --bin demo-recorder -- --actions "DOWN x2, RIGHT x2, t, save"

    # Continue a saved demo
    cargo run --bin demo-recorder -- --load output/demos/cavern/20240101_120000_000.demo --script more.txt --save
"#
    );
}
