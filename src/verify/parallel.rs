//! Parallel demo verification
//!
//! Uses Rayon to verify many demos concurrently. Each demo gets its own
//! engine from the supplied factory.

use rayon::prelude::*;
use std::path::PathBuf;

use crate::engine::{Engine, EngineError};

use super::replay::{VerifyReport, verify_demo_file};

/// Initialize the global Rayon pool with the given thread count.
/// Call this once at startup; 0 keeps Rayon's default (one per core).
pub fn init_parallel(threads: usize) -> Result<(), String> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| format!("Failed to initialize Rayon thread pool: {}", e))?;
    }
    Ok(())
}

/// Outcome of verifying one demo file
#[derive(Debug)]
pub struct DemoCheck {
    pub path: PathBuf,
    pub result: Result<VerifyReport, String>,
}

impl DemoCheck {
    pub fn passed(&self) -> bool {
        self.result.as_ref().is_ok_and(|r| r.is_ok())
    }
}

/// Verify every demo in `paths`, returning results in the same order.
pub fn verify_demos_parallel<E, F>(paths: &[PathBuf], make_engine: F) -> Vec<DemoCheck>
where
    E: Engine,
    F: Fn() -> Result<E, EngineError> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let result = make_engine()
                .map_err(|e| format!("Failed to build engine: {}", e))
                .and_then(|mut engine| {
                    verify_demo_file(path, &mut engine)
                        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
                });
            DemoCheck {
                path: path.clone(),
                result,
            }
        })
        .collect()
}
