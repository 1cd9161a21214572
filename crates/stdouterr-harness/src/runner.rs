//! Scenario execution engine.

use std::path::{Path, PathBuf};
use std::time::Instant;

use stdouterr_core::{Destination, FdTable, RedirectError, Redirection, Timeline, simulate};

use crate::capture::capture_scenario;
use crate::config::{CheckMode, DEFAULT_WORKDIR, HarnessConfig, existing_binary};
use crate::error::HarnessError;
use crate::scenario::{Scenario, ScenarioSet};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::verify::VerificationResult;

/// Runs scenario sets against the model and/or the real binary.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    pub binary: Option<PathBuf>,
    pub check: CheckMode,
    /// Scratch root; each scenario gets its own subdirectory.
    pub workdir: PathBuf,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(check: CheckMode) -> Self {
        Self {
            binary: None,
            check,
            workdir: PathBuf::from(DEFAULT_WORKDIR),
        }
    }

    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            check: config.check,
            workdir: config.workdir.clone(),
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Run every scenario in `set`.
    pub fn run(&self, set: &ScenarioSet) -> Result<Vec<VerificationResult>, HarnessError> {
        self.run_logged(set, &mut LogEmitter::to_sink("scenarios", "local"))
    }

    /// Run every scenario in `set`, logging one entry per check.
    ///
    /// Scenario failures (including unparsable redirections) become failed
    /// results; an invalid scenario name, a missing binary or a log write
    /// failure aborts before anything on disk is touched.
    pub fn run_logged(
        &self,
        set: &ScenarioSet,
        log: &mut LogEmitter,
    ) -> Result<Vec<VerificationResult>, HarnessError> {
        set.validate()?;
        let binary = if self.check.includes_process() {
            Some(existing_binary(self.binary.as_deref())?)
        } else {
            None
        };

        let mut results = Vec::new();
        for scenario in &set.scenarios {
            if self.check.includes_model() {
                let started = Instant::now();
                let result = check_model(scenario);
                record(log, &result, None, started)?;
                results.push(result);
            }
            if let Some(binary) = binary {
                let started = Instant::now();
                let workdir = self.workdir.join(&scenario.name);
                let (result, exit_code) = check_process(scenario, binary, &workdir);
                record(log, &result, exit_code, started)?;
                results.push(result);
            }
        }
        Ok(results)
    }
}

/// Model outcome for a scenario's redirections.
pub fn model_timeline(redirections: &[Redirection]) -> Result<Timeline, RedirectError> {
    let table = FdTable::resolve(FdTable::piped(), redirections)?;
    Ok(simulate(&table))
}

/// Compare the model's delivery order with the scenario's expectation.
pub fn check_model(scenario: &Scenario) -> VerificationResult {
    let expected = render_destinations(&scenario.expected_pipe, &scenario.expected_terminal);
    let actual = match scenario.parse().and_then(|r| model_timeline(&r)) {
        Ok(timeline) => render_destinations(
            &timeline.lines_at(&Destination::Pipe),
            &timeline.lines_at(&Destination::Terminal),
        ),
        Err(err) => format!("error: {err}"),
    };
    VerificationResult::compare(&scenario.name, "model", expected, actual)
}

/// Run the binary under the scenario and compare per-destination content.
///
/// Lines are sorted per destination: a real run only guarantees which
/// lines arrive where, not their order across streams.
pub fn check_process(
    scenario: &Scenario,
    binary: &Path,
    workdir: &Path,
) -> (VerificationResult, Option<i32>) {
    let expected = format!(
        "{}\nexit: 0",
        render_destinations(
            &sorted(scenario.expected_pipe.clone()),
            &sorted(scenario.expected_terminal.clone()),
        )
    );
    let outcome = scenario
        .parse()
        .map_err(HarnessError::from)
        .and_then(|r| {
            clear_dir(workdir)?;
            capture_scenario(binary, &r, workdir)
        });
    let (actual, exit_code) = match outcome {
        Ok(capture) => {
            let exit = capture
                .exit_code
                .map_or_else(|| String::from("signal"), |c| c.to_string());
            let rendered = render_destinations(
                &sorted(capture.lines_at(&Destination::Pipe)),
                &sorted(capture.lines_at(&Destination::Terminal)),
            );
            (format!("{rendered}\nexit: {exit}"), capture.exit_code)
        }
        Err(err) => (format!("error: {err}"), None),
    };
    (
        VerificationResult::compare(&scenario.name, "process", expected, actual),
        exit_code,
    )
}

/// `pipe: ...` / `terminal: ...` lines used as comparable text.
pub fn render_destinations(pipe: &[String], terminal: &[String]) -> String {
    let mut out = Vec::new();
    for (label, lines) in [("pipe", pipe), ("terminal", terminal)] {
        if lines.is_empty() {
            out.push(format!("{label}: <nothing>"));
        }
        out.extend(lines.iter().map(|line| format!("{label}: {line}")));
    }
    out.join("\n")
}

fn clear_dir(dir: &Path) -> Result<(), HarnessError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

fn sorted(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines
}

fn record(
    log: &mut LogEmitter,
    result: &VerificationResult,
    exit_code: Option<i32>,
    started: Instant,
) -> Result<(), HarnessError> {
    let level = if result.passed {
        LogLevel::Info
    } else {
        LogLevel::Warn
    };
    let mut entry = LogEntry::new("", level, "scenario_result")
        .with_scenario(&result.case_name)
        .with_check(&result.check)
        .with_outcome(Outcome::from_passed(result.passed))
        .with_duration_ms(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
    if let Some(code) = exit_code {
        entry = entry.with_exit_code(code);
    }
    if let Some(diff) = &result.diff {
        entry = entry.with_details(serde_json::json!({ "diff": diff }));
    }
    log.emit_entry(entry)?;
    Ok(())
}
