use thiserror::Error;

/// Failure reported by an engine call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine call failed: {0}")]
    Call(String),
    #[error("Engine cannot apply snapshot: {0}")]
    IncompatibleState(String),
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("Action {index} is outside the engine action set of size {size}")]
    UnknownAction { index: usize, size: usize },
}
