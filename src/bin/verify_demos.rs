//! Demo Verifier
//!
//! Replays saved demos through a fresh arcade engine and reports the first
//! step where a replay leaves its recording.
//!
//! Usage:
//!   cargo run --bin verify-demos -- output/demos/cavern/
//!   cargo run --bin verify-demos -- output/demos/cavern/20240101_120000_000.demo
//!   cargo run --bin verify-demos -- output/demos/cavern/ --parallel 4 --json
//!
//! Engine flags (--frameskip, --sticky, --obs-type, --layout, --max-frames,
//! --settings) must match the ones the demos were recorded with.

use std::path::{Path, PathBuf};

use demo_recorder::arcade::Cavern;
use demo_recorder::demo::{is_demo_file, list_demos};
use demo_recorder::logging::LogConfig;
use demo_recorder::session::SessionConfig;
use demo_recorder::verify::{DemoCheck, init_parallel, verify_demos_parallel};

struct VerifyArgs {
    targets: Vec<PathBuf>,
    parallel: usize,
    json: bool,
    /// Everything else, forwarded to the session flag parser
    engine_args: Vec<String>,
}

fn parse_args(args: &[String]) -> VerifyArgs {
    let mut parsed = VerifyArgs {
        targets: Vec::new(),
        parallel: 0,
        json: false,
        engine_args: vec![args.first().cloned().unwrap_or_default()],
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--parallel" | "-j" => {
                if let Some(v) = args.get(i + 1) {
                    parsed.parallel = v.parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--json" => parsed.json = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                parsed.engine_args.push(arg.to_string());
                if !is_switch(arg)
                    && let Some(v) = args.get(i + 1)
                {
                    parsed.engine_args.push(v.clone());
                    i += 1;
                }
            }
            path => parsed.targets.push(PathBuf::from(path)),
        }
        i += 1;
    }
    parsed
}

/// Session flags that take no value
fn is_switch(arg: &str) -> bool {
    matches!(
        arg,
        "--quiet" | "-q" | "--debug-log" | "--save" | "--no-time-travel" | "--allow-sticky-replay"
    )
}

fn collect_demos(targets: &[PathBuf]) -> Vec<PathBuf> {
    let mut demos = Vec::new();
    for target in targets {
        if target.is_dir() {
            match list_demos(target) {
                Ok(found) => demos.extend(found),
                Err(e) => tracing::warn!("Failed to list {}: {}", target.display(), e),
            }
        } else if is_demo_file(target) {
            demos.push(target.clone());
        } else {
            tracing::warn!("Skipping {} (not a demo file)", target.display());
        }
    }
    demos
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    LogConfig::load_with_args(&args).init();

    let parsed = parse_args(&args);
    let session = SessionConfig::from_arg_list(SessionConfig::from_config_files(), &parsed.engine_args);

    if let Err(e) = init_parallel(parsed.parallel) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    let targets = if parsed.targets.is_empty() {
        vec![session.demo_dir()]
    } else {
        parsed.targets.clone()
    };
    let demos = collect_demos(&targets);
    if demos.is_empty() {
        println!("No demo files found.");
        std::process::exit(1);
    }

    let arcade = session.arcade_config();
    let checks = verify_demos_parallel(&demos, || Cavern::new(arcade.clone()));

    if parsed.json {
        let reports: Vec<_> = checks
            .iter()
            .map(|check| match &check.result {
                Ok(report) => serde_json::to_value(report).unwrap_or_default(),
                Err(e) => serde_json::json!({ "path": check.path, "error": e }),
            })
            .collect();
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to encode reports: {}", e),
        }
    } else {
        println!("Demo Verification");
        println!("=================\n");
        for check in &checks {
            print_check(check);
        }
    }

    let failed = checks.iter().filter(|c| !c.passed()).count();
    if !parsed.json {
        println!("\n=================");
        println!("Results: {} passed, {} failed", checks.len() - failed, failed);
    }
    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_check(check: &DemoCheck) {
    let name = display_name(&check.path);
    let dots = ".".repeat(40 - name.len().min(39));

    match &check.result {
        Ok(report) if report.is_ok() => {
            println!(
                "  {} {} PASS ({} actions, reward {})",
                name, dots, report.actions, report.total_reward
            );
        }
        Ok(report) => {
            println!("  {} {} FAIL", name, dots);
            if let Some(divergence) = &report.divergence {
                println!(
                    "    Diverged at step {}: {:?}",
                    divergence.step, divergence.mismatch
                );
            }
            for failure in &report.checkpoint_failures {
                println!(
                    "    Checkpoint at {} refused: {}",
                    failure.step_count, failure.error
                );
            }
        }
        Err(message) => {
            println!("  {} {} ERROR", name, dots);
            println!("    {}", message);
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_help() {
    println!(
        r#"Demo Verifier - Replay saved demos and report divergence

USAGE:
    cargo run --bin verify-demos -- [PATHS...] [OPTIONS]

PATHS:
    Demo files or directories of demos (default: the configured demo directory)

OPTIONS:
    --parallel, -j <N>    Worker threads (default: one per core)
    --json                Print reports as JSON
    --settings <FILE>     Session settings the demos were recorded with
    --frameskip <N>       Frames per action
    --sticky <P>          Repeat-action probability
    --obs-type <TYPE>     ram or screen
    --layout <FILE>       Room layout file
    --max-frames <N>      Episode frame budget
    --quiet, -q           Only log warnings
    --help, -h            Show this help
"#
    );
}
