//! Scenario testing system for deterministic recorder testing
//!
//! Provides infrastructure for running scripted action tests against
//! the arcade engine to verify recording, time travel and persistence.

pub mod assertions;
pub mod parser;
pub mod runner;

pub use assertions::{AssertionError, CapturedEvent, RecorderState, check_sequence, check_state};
pub use parser::{
    ActionInput, ExpectedEvent, StateAssertion, TestDefinition, TestExpectations, TestSetup,
    parse_test_file,
};
pub use runner::{RunStats, TestResult, run_test};

/// Default path for test scenarios
pub const SCENARIOS_DIR: &str = "tests/scenarios";
