//! Demo files: persisted trajectories and where they live on disk.

mod format;

pub use format::{CheckpointRecord, DemoFile, DemoFormatError, DemoHeader, StagedTrajectory};

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEMO_EXTENSION, DEMO_TIMESTAMP_FORMAT};

/// Timestamped path for a new demo inside `dir`
pub fn timestamped_demo_path(dir: &Path) -> PathBuf {
    let timestamp = Local::now().format(DEMO_TIMESTAMP_FORMAT).to_string();
    dir.join(format!("{}.{}", timestamp, DEMO_EXTENSION))
}

/// Demo directory for a named collection, created on first use
pub fn demo_dir(root: &Path, name: &str) -> std::io::Result<PathBuf> {
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// All demo files directly inside `dir`, sorted by file name
pub fn list_demos(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut demos: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_demo_file(path))
        .collect();
    demos.sort();
    Ok(demos)
}

pub fn is_demo_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == DEMO_EXTENSION)
}
