//! Recorder scenario runner
//!
//! Runs the TOML scenarios under tests/scenarios against the arcade engine
//! and reports what each one did to its recorder: actions issued, time
//! travels, saves and reloads, and the trajectory left behind.
//!
//! Usage:
//!   cargo run --bin test-scenarios                         # Every scenario
//!   cargo run --bin test-scenarios -- time_travel/         # One category
//!   cargo run --bin test-scenarios -- persistence checkpoints
//!   cargo run --bin test-scenarios -- --list               # Names only
//!   cargo run --bin test-scenarios -- --verbose --fail-fast

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use demo_recorder::logging::LogConfig;
use demo_recorder::testing::{
    RunStats, SCENARIOS_DIR, TestResult, parse_test_file, run_test,
};

#[derive(Debug, Default, PartialEq)]
struct ScenarioArgs {
    /// Substrings of `category/name`; any match selects a scenario
    filters: Vec<String>,
    verbose: bool,
    list: bool,
    fail_fast: bool,
}

fn parse_args(args: &[String]) -> ScenarioArgs {
    let mut parsed = ScenarioArgs::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--verbose" | "-v" => parsed.verbose = true,
            "--list" => parsed.list = true,
            "--fail-fast" => parsed.fail_fast = true,
            "--quiet" | "-q" | "--debug-log" => {}
            other if other.starts_with('-') => {
                tracing::warn!("Ignoring unknown argument '{}'", other)
            }
            filter => parsed.filters.push(filter.trim_end_matches(".toml").to_string()),
        }
    }
    parsed
}

/// A scenario file and the category directory it lives in
struct Scenario {
    category: String,
    name: String,
    path: PathBuf,
}

impl Scenario {
    fn id(&self) -> String {
        if self.category.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.category, self.name)
        }
    }
}

fn discover(base: &Path, filters: &[String]) -> Vec<Scenario> {
    let mut found = Vec::new();
    let mut pending = vec![base.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "toml") {
                let rel = path.strip_prefix(base).unwrap_or(&path);
                let scenario = Scenario {
                    category: rel
                        .parent()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    name: rel
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    path: path.clone(),
                };
                let id = scenario.id();
                if filters.is_empty() || filters.iter().any(|f| id.contains(f.as_str())) {
                    found.push(scenario);
                }
            }
        }
    }
    found.sort_by_key(|s| s.id());
    found
}

/// Pass/fail counts plus what the passing scenarios exercised
#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
    errors: usize,
    actions: u64,
    time_travels: usize,
    reloads: usize,
}

impl Tally {
    fn record(&mut self, result: &TestResult) {
        match result {
            TestResult::Pass { stats } => {
                self.passed += 1;
                self.actions += stats.actions;
                self.time_travels += stats.time_travels;
                self.reloads += stats.reloads;
            }
            TestResult::Fail { .. } => self.failed += 1,
            TestResult::Error { .. } => self.errors += 1,
        }
    }

    fn is_clean(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    LogConfig::load_with_args(&args).init();
    let parsed = parse_args(&args);

    let base = Path::new(SCENARIOS_DIR);
    if !base.is_dir() {
        println!("No scenarios directory found at {}", SCENARIOS_DIR);
        std::process::exit(1);
    }

    let scenarios = discover(base, &parsed.filters);
    if scenarios.is_empty() {
        println!("No scenarios matched {:?}", parsed.filters);
        std::process::exit(1);
    }

    if parsed.list {
        for scenario in &scenarios {
            println!("{}", scenario.id());
        }
        return;
    }

    let mut by_category: BTreeMap<&str, Vec<&Scenario>> = BTreeMap::new();
    for scenario in &scenarios {
        by_category.entry(scenario.category.as_str()).or_default().push(scenario);
    }

    println!("Recorder Scenarios");
    println!("==================");

    let mut tally = Tally::default();
    'categories: for (category, members) in &by_category {
        println!("\n{}/", category);
        for scenario in members {
            let result = match parse_test_file(&scenario.path) {
                Ok(def) => run_test(&def),
                Err(message) => TestResult::Error { message },
            };
            tally.record(&result);
            print_result(&scenario.name, &result, parsed.verbose);
            if parsed.fail_fast && !tally.is_clean() {
                break 'categories;
            }
        }
    }

    println!("\n==================");
    println!(
        "Results: {} passed, {} failed, {} errors",
        tally.passed, tally.failed, tally.errors
    );
    println!(
        "Exercised: {} actions, {} time travels, {} reloads",
        tally.actions, tally.time_travels, tally.reloads
    );

    if !tally.is_clean() {
        std::process::exit(1);
    }
}

fn describe(stats: &RunStats) -> String {
    let mut meta = Vec::new();
    if stats.time_travels > 0 {
        meta.push(format!("{} time travel", stats.time_travels));
    }
    if stats.saves > 0 {
        meta.push(format!("{} save", stats.saves));
    }
    if stats.reloads > 0 {
        meta.push(format!("{} reload", stats.reloads));
    }
    let meta = if meta.is_empty() {
        String::new()
    } else {
        format!(": {}", meta.join(", "))
    };
    format!(
        "{} actions{}; {} recorded, {} checkpoints",
        stats.actions, meta, stats.recorded, stats.checkpoints
    )
}

fn print_result(name: &str, result: &TestResult, verbose: bool) {
    let dots = ".".repeat(40 - name.len().min(39));

    match result {
        TestResult::Pass { stats } => {
            println!("  {} {} PASS ({})", name, dots, describe(stats));
        }
        TestResult::Fail { error } => {
            println!("  {} {} FAIL", name, dots);
            if verbose {
                println!("    {}", error);
            } else {
                println!("    {}", error.message);
            }
        }
        TestResult::Error { message } => {
            println!("  {} {} ERROR", name, dots);
            println!("    {}", message);
        }
    }
}
