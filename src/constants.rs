//! Tunable constants for the demo recorder
//!
//! Recording defaults and file locations are defined here for easy tweaking.

// =============================================================================
// RECORDING
// =============================================================================

/// Recorded actions between periodic engine checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 100;

/// Native id of the engine's "do nothing" action (ALE numbering)
pub const NOOP_NATIVE_ID: u8 = 0;

// =============================================================================
// DEMO FILES
// =============================================================================

/// Root directory for all generated output
pub const OUTPUT_DIR: &str = "output";

/// Directory where SAVE writes demo files
pub const DEMOS_DIR: &str = "output/demos";

/// Extension of saved demo files
pub const DEMO_EXTENSION: &str = "demo";

/// Timestamp format used for demo file names (matches snapshot naming)
pub const DEMO_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Current on-disk demo format version
pub const DEMO_FORMAT_VERSION: u32 = 1;

// =============================================================================
// ARCADE ENGINE
// =============================================================================

/// Lives at the start of an arcade episode
pub const ARCADE_START_LIVES: i32 = 5;

/// Frame budget before an arcade episode is truncated
pub const ARCADE_MAX_FRAMES: u64 = 18_000;

/// Size of the arcade RAM observation (Atari 2600 RAM size)
pub const ARCADE_RAM_SIZE: usize = 128;

pub const ARCADE_KEY_REWARD: f64 = 100.0;
pub const ARCADE_DOOR_REWARD: f64 = 300.0;
pub const ARCADE_EXIT_REWARD: f64 = 1000.0;
