//! Demo verification - replay saved demos and report divergence

mod parallel;
mod replay;

pub use parallel::{DemoCheck, init_parallel, verify_demos_parallel};
pub use replay::{
    CheckpointFailure, Divergence, Mismatch, VerifyReport, verify_demo, verify_demo_file,
};
