use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use sweep_runner::driver::{pending_descriptors, tag_counts};
use sweep_runner::{
    Mode, Pattern, ResultStore, RunDriver, SweepConfig, SweepReport, SystemRunner,
};

#[derive(Parser)]
#[command(name = "ccsweep", version = "0.2.0", about = "Concurrency-control benchmark sweep orchestrator")]
struct Cli {
    /// Sweep configuration file; built-in defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile stale results, then run every pending point.
    Run {
        /// key=value restrictions; every pattern must match.
        patterns: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Stage configuration and host environment without executing.
    Prepare {
        patterns: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Report enumeration and pending counts without running anything.
    Describe {
        patterns: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Archive persisted results the current enumeration no longer produces.
    Reconcile {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let config = load_config(cli.config.as_deref())?;
    match run_command(cli.command, config) {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", err.to_string()));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<SweepConfig> {
    match path {
        Some(path) => SweepConfig::load(path),
        None => Ok(SweepConfig::default()),
    }
}

fn run_command(command: Commands, config: SweepConfig) -> Result<Option<Value>> {
    match command {
        Commands::Run { patterns, json } => {
            let patterns = parse_patterns(&patterns)?;
            let mut driver = RunDriver::new(config, SystemRunner);
            let report = driver.run_sweep(&patterns, Mode::Run)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "report": report_to_json(&report),
                })));
            }
            print_report(&report);
        }
        Commands::Prepare { patterns, json } => {
            let patterns = parse_patterns(&patterns)?;
            let mut driver = RunDriver::new(config, SystemRunner);
            let report = driver.run_sweep(&patterns, Mode::Prepare)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "prepare",
                    "report": report_to_json(&report),
                })));
            }
            print_report(&report);
        }
        Commands::Describe { patterns, json } => {
            let patterns = parse_patterns(&patterns)?;
            config.validate()?;
            let store = ResultStore::new(config.result_dir.clone());
            let counts = tag_counts(config.total_seqs);
            let total: usize = counts.values().sum();
            let pending = pending_descriptors(&config, &store, &patterns, Mode::Run)?;
            if json {
                let counts_json: Value = counts
                    .iter()
                    .map(|(tag, n)| (tag.to_string(), json!(n)))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "total_points": total,
                    "tag_counts": counts_json,
                    "pending": pending.len(),
                })));
            }
            println!("total_points: {}", total);
            for (tag, n) in &counts {
                println!("tag {}: {} points", tag, n);
            }
            println!("pending: {}", pending.len());
        }
        Commands::Reconcile { json } => {
            config.validate()?;
            let store = ResultStore::new(config.result_dir.clone());
            let valid = sweep_runner::valid_name_set(config.total_seqs)?;
            let archived = store.archive_stale(&valid)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "reconcile",
                    "archived": archived,
                })));
            }
            for name in &archived {
                println!("stale result archived: {}", name);
            }
            println!("archived: {}", archived.len());
        }
    }
    Ok(None)
}

fn parse_patterns(raw: &[String]) -> Result<Vec<Pattern>> {
    raw.iter().map(|p| Pattern::parse(p)).collect()
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. }
        | Commands::Prepare { json, .. }
        | Commands::Describe { json, .. }
        | Commands::Reconcile { json } => *json,
    }
}

fn report_to_json(report: &SweepReport) -> Value {
    json!({
        "total": report.total,
        "skipped": report.skipped,
        "attempted": report.attempted,
        "succeeded": report.succeeded,
        "failed": report.failed,
        "archived": report.archived,
    })
}

fn print_report(report: &SweepReport) {
    println!("total: {}", report.total);
    println!("skipped: {}", report.skipped);
    println!("attempted: {}", report.attempted);
    println!("succeeded: {}", report.succeeded);
    println!("failed: {}", report.failed);
    println!("archived: {}", report.archived.len());
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\"}}}}"
        ),
    }
}

fn json_error(code: &str, message: String) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
        }
    })
}
