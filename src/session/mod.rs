//! Headless session driver: settings, action scripts and the run loop

mod config;
mod runner;
mod script;

pub use config::{SESSION_SETTINGS_FILE, SESSION_SETTINGS_TEMPLATE, SessionConfig};
pub use runner::{SessionSummary, load_script, run_script, run_session};
pub use script::ActionScript;
