//! Native engine action ids

use serde::{Deserialize, Serialize};

use crate::constants::NOOP_NATIVE_ID;

/// Names of the 18 ALE actions, indexed by native id.
pub const ALE_ACTION_MEANINGS: [&str; 18] = [
    "NOOP",
    "FIRE",
    "UP",
    "RIGHT",
    "LEFT",
    "DOWN",
    "UPRIGHT",
    "UPLEFT",
    "DOWNRIGHT",
    "DOWNLEFT",
    "UPFIRE",
    "RIGHTFIRE",
    "LEFTFIRE",
    "DOWNFIRE",
    "UPRIGHTFIRE",
    "UPLEFTFIRE",
    "DOWNRIGHTFIRE",
    "DOWNLEFTFIRE",
];

/// Engine-native action id (ALE numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeAction(pub u8);

impl NativeAction {
    pub const NOOP: NativeAction = NativeAction(NOOP_NATIVE_ID);
    pub const FIRE: NativeAction = NativeAction(1);
    pub const UP: NativeAction = NativeAction(2);
    pub const RIGHT: NativeAction = NativeAction(3);
    pub const LEFT: NativeAction = NativeAction(4);
    pub const DOWN: NativeAction = NativeAction(5);

    pub fn is_noop(self) -> bool {
        self == Self::NOOP
    }

    /// ALE name for this id, or `"UNKNOWN"` outside the standard table
    pub fn meaning(self) -> &'static str {
        ALE_ACTION_MEANINGS
            .get(self.0 as usize)
            .copied()
            .unwrap_or("UNKNOWN")
    }

    /// Parse an ALE action name (case-insensitive)
    pub fn from_meaning(name: &str) -> Option<Self> {
        let normalized = name.trim().to_uppercase().replace(['_', '-', ' '], "");
        ALE_ACTION_MEANINGS
            .iter()
            .position(|m| *m == normalized)
            .map(|id| NativeAction(id as u8))
    }
}

impl std::fmt::Display for NativeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.meaning())
    }
}
