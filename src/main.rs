//! Demo Recorder - headless recording session driver
//!
//! Builds the arcade engine and recorder from settings and flags, runs the
//! action script and prints the session summary as JSON.

use demo_recorder::logging::LogConfig;
use demo_recorder::session::{SessionConfig, run_session};
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    LogConfig::load_with_args(&args).init();

    let config = SessionConfig::from_arg_list(SessionConfig::from_config_files(), &args);

    let summary = match run_session(&config) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    match &config.output_file {
        Some(path) => {
            if let Err(e) = summary.write_to_file(Path::new(path)) {
                tracing::error!("Failed to write summary to {}: {}", path, e);
                std::process::exit(1);
            }
            if !config.quiet {
                println!("Summary written to {}", path);
            }
        }
        None => match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        },
    }
}
