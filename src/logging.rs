//! Logging configuration shared across binaries.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub const LOG_SETTINGS_FILE: &str = "config/logging.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn load() -> Self {
        let path = Path::new(LOG_SETTINGS_FILE);
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// `--debug-log` raises the level to debug, `--quiet`/`-q` lowers it to warn
    pub fn apply_args(&mut self, args: &[String]) {
        if args.iter().any(|arg| arg == "--debug-log") {
            self.level = "debug".to_string();
        } else if args.iter().any(|arg| arg == "--quiet" || arg == "-q") {
            self.level = "warn".to_string();
        }
    }

    pub fn load_with_args(args: &[String]) -> Self {
        let mut config = Self::load();
        config.apply_args(args);
        config
    }

    /// Filter from `RUST_LOG`, falling back to the configured level
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Install the global stderr subscriber. Later calls are ignored.
    pub fn init(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_ansi(self.ansi)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
