//! CLI entrypoint for the stdouterr verification harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stdouterr_core::{Destination, FdTable, StdStream, parse_redirections, simulate};
use stdouterr_harness::structured_log::{LogEmitter, LogEntry, LogLevel, now_utc};
use stdouterr_harness::{
    ScenarioReport, ScenarioRunner, ScenarioSet, VerificationResult, VerificationSummary,
    check_streams, harness_config,
};

/// Verification tooling for the stdouterr redirection demo.
#[derive(Debug, Parser)]
#[command(name = "stdouterr-harness")]
#[command(about = "Predict and verify what `stdouterr <redirections> | ts` prints")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the modelled delivery order for a redirection list.
    Predict {
        /// Redirection words, e.g. `2>&1 '>/dev/null'` (quote them from the shell).
        #[arg(num_args = 0..)]
        redirections: Vec<String>,
        /// Model a terminal on stdout instead of a pipe.
        #[arg(long)]
        terminal: bool,
        /// Print the timeline as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Verify redirection scenarios.
    Run {
        /// Fixture JSON file or directory of fixture files (default: builtin set).
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Demo binary under test (overrides STDOUTERR_BIN).
        #[arg(long)]
        binary: Option<PathBuf>,
        /// `model`, `process` or `both` (overrides STDOUTERR_CHECK).
        #[arg(long)]
        check: Option<String>,
        /// Scratch directory (overrides STDOUTERR_WORKDIR).
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Output report path (markdown; JSON is written alongside).
        #[arg(long)]
        report: Option<PathBuf>,
        /// JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Verify the binary's per-stream output contract.
    Streams {
        /// Demo binary under test (overrides STDOUTERR_BIN).
        #[arg(long)]
        binary: Option<PathBuf>,
        /// Number of plain invocations to compare.
        #[arg(long, default_value_t = 3)]
        runs: usize,
        /// Output report path (markdown; JSON is written alongside).
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the builtin scenario set as JSON.
    Scenarios,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Predict {
            redirections,
            terminal,
            json,
        } => {
            let words = redirections.join(" ");
            let base = if terminal {
                FdTable::terminal()
            } else {
                FdTable::piped()
            };
            let table = FdTable::resolve(base, &parse_redirections(&words)?)?;
            let timeline = simulate(&table);
            if json {
                println!("{}", serde_json::to_string_pretty(&timeline)?);
            } else {
                eprintln!(
                    "stdout goes to {}, stderr goes to {}",
                    describe(table.route(StdStream::Output)),
                    describe(table.route(StdStream::Error))
                );
                eprintln!(
                    "stdout is {}-buffered, stderr is {}-buffered",
                    timeline.stdout_mode.as_str(),
                    timeline.stderr_mode.as_str()
                );
                let transcript = timeline.transcript();
                if transcript.is_empty() {
                    eprintln!("Nothing reaches the pipe or the terminal");
                }
                for line in transcript {
                    println!("{line}");
                }
            }
        }
        Command::Run {
            fixture,
            binary,
            check,
            workdir,
            report,
            log,
        } => {
            let config = harness_config()
                .clone()
                .with_overrides(binary, check.as_deref(), workdir);
            let sets = match &fixture {
                Some(path) if path.is_dir() => ScenarioSet::from_dir(path)?,
                Some(path) => vec![ScenarioSet::from_file(path)?],
                None => vec![ScenarioSet::builtin()],
            };
            if sets.is_empty() {
                return Err(match fixture {
                    Some(path) => format!("No fixture JSON files found in {}", path.display()),
                    None => String::from("No scenarios to run"),
                }
                .into());
            }

            let run_id = format!("run-{}", std::process::id());
            let mut emitter = match &log {
                Some(path) => LogEmitter::to_file(path, "scenarios", &run_id)?,
                None => LogEmitter::to_sink("scenarios", &run_id),
            };
            emitter.emit(LogLevel::Info, "run_start")?;

            let runner = ScenarioRunner::from_config(&config);
            eprintln!(
                "Verifying {} scenario set(s) with check={}",
                sets.len(),
                config.check.as_str()
            );
            let mut results = Vec::new();
            for set in &sets {
                eprintln!("  {} ({} scenarios)", set.title, set.scenarios.len());
                for scenario in &set.scenarios {
                    eprintln!("    {}: {}", scenario.name, scenario.command_line());
                }
                results.extend(runner.run_logged(set, &mut emitter)?);
            }

            let summary = VerificationSummary::from_results(results);
            let (level, event) = if summary.all_passed() {
                (LogLevel::Info, "run_passed")
            } else {
                (LogLevel::Error, "run_failed")
            };
            let artifacts = report
                .iter()
                .flat_map(|path| [path.clone(), path.with_extension("json")])
                .map(|path| path.display().to_string())
                .collect();
            emitter.emit_entry(LogEntry::new("", level, event).with_artifacts(artifacts))?;
            emitter.flush()?;

            finish(
                ScenarioReport {
                    title: String::from("stdouterr Redirection Scenarios"),
                    check: config.check.as_str().to_string(),
                    timestamp: now_utc(),
                    summary,
                },
                report.as_deref(),
            )?;
            if let Some(path) = log {
                eprintln!("Log written to {}", path.display());
            }
        }
        Command::Streams {
            binary,
            runs,
            report,
        } => {
            let config = harness_config().clone().with_overrides(binary, None, None);
            let binary = config.require_binary()?;
            eprintln!("Checking {} over {runs} run(s)", binary.display());
            let results = check_streams(binary, runs, &config.workdir)?;
            finish(
                ScenarioReport {
                    title: String::from("stdouterr Stream Contract"),
                    check: String::from("streams"),
                    timestamp: now_utc(),
                    summary: VerificationSummary::from_results(results),
                },
                report.as_deref(),
            )?;
        }
        Command::Scenarios => {
            println!("{}", ScenarioSet::builtin().to_json()?);
        }
    }

    Ok(())
}

fn describe(destination: Option<&Destination>) -> String {
    destination.map_or_else(|| String::from("a closed descriptor"), ToString::to_string)
}

/// Print the outcome, write reports, and fail if anything failed.
fn finish(report: ScenarioReport, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    for failure in report.summary.failures() {
        print_failure(failure);
    }
    eprintln!(
        "Verification complete: total={}, passed={}, failed={}",
        report.summary.total, report.summary.passed, report.summary.failed
    );

    if let Some(path) = path {
        eprintln!("Writing report to {}", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, report.to_markdown())?;
        std::fs::write(path.with_extension("json"), report.to_json())?;
    }

    if !report.summary.all_passed() {
        return Err("Verification failed".into());
    }
    Ok(())
}

fn print_failure(result: &VerificationResult) {
    eprintln!("FAIL {} ({})", result.case_name, result.check);
    if let Some(diff) = &result.diff {
        for line in diff.lines() {
            eprintln!("    {line}");
        }
    }
}
