//! Opaque values exchanged with the engine.

use serde::{Deserialize, Serialize};

/// Post-action engine output (RAM or pixel buffer). Never inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(pub Vec<u8>);

impl Observation {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Observation {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Full engine state blob from `clone_state`. Stored and handed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineSnapshot(Vec<u8>);

impl EngineSnapshot {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Side-channel metadata returned by the engine alongside each step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineInfo(pub serde_json::Value);

impl EngineInfo {
    /// Info for entries that have no engine output (the reset entry)
    pub fn none() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl From<serde_json::Value> for EngineInfo {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Everything one `step` returns
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: EngineInfo,
}

impl Transition {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}
