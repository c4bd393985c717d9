//! Result aggregation and rendering.
//!
//! Rendering functions are pure and return strings; the caller decides where
//! the text goes. Color is a parameter, never global state.

use crate::catalog::TestUnit;
use crate::results::{RunSummary, TestResult};
use crate::scheduler::ProgressSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BANNER_WIDTH: usize = 60;
const ERROR_LINES_SHOWN: usize = 3;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// `PASS` or `FAIL`, wrapped in ANSI color codes when `color` is set.
pub fn status_label(passed: bool, color: bool) -> String {
    let (label, code) = if passed { ("PASS", GREEN) } else { ("FAIL", RED) };
    if color {
        format!("{}{}{}", code, label, RESET)
    } else {
        label.to_string()
    }
}

/// Render the end-of-run summary block.
pub fn render_summary(results: &[TestResult], color: bool) -> String {
    let summary = RunSummary::from_results(results);
    let heavy = "=".repeat(BANNER_WIDTH);
    let light = "-".repeat(BANNER_WIDTH);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "TEST SUMMARY");
    let _ = writeln!(out, "{}", heavy);

    for result in results {
        let _ = writeln!(
            out,
            "  {}: {} ({:.2}s)",
            status_label(result.passed(), color),
            result.name(),
            result.duration().as_secs_f64()
        );
        if let Some(message) = result.error_message() {
            for line in message.lines().take(ERROR_LINES_SHOWN) {
                let _ = writeln!(out, "         {}", line);
            }
        }
    }

    let _ = writeln!(out, "{}", light);
    let _ = writeln!(
        out,
        "Total: {} tests, {} passed, {} failed",
        summary.total, summary.passed, summary.failed
    );
    let _ = writeln!(
        out,
        "Time:  {:.2} seconds",
        summary.total_duration.as_secs_f64()
    );
    let _ = writeln!(out, "{}", heavy);

    out
}

/// Rendered summary plus the process exit code.
pub fn summarize(results: &[TestResult], color: bool) -> (String, i32) {
    let summary = RunSummary::from_results(results);
    (render_summary(results, color), summary.exit_code)
}

/// Machine-readable form of a run.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub cancelled: bool,
    pub results: &'a [TestResult],
}

impl<'a> JsonReport<'a> {
    pub fn new(results: &'a [TestResult], cancelled: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: RunSummary::from_results(results),
            cancelled,
            results,
        }
    }

    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn write_json_report(path: &Path, results: &[TestResult], cancelled: bool) -> ReportResult<()> {
    let json = JsonReport::new(results, cancelled).to_json()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, json).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Prints per-unit progress lines to stdout as units start and finish.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProgress {
    pub verbose: bool,
    pub color: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool, color: bool) -> Self {
        Self { verbose, color }
    }

    pub fn finished_line(&self, result: &TestResult) -> String {
        format!(
            "{} {} ({:.2}s)",
            status_label(result.passed(), self.color),
            result.name(),
            result.duration().as_secs_f64()
        )
    }
}

impl ProgressSink for ConsoleProgress {
    fn started(&self, unit: &TestUnit) {
        println!("Running {}...", unit.name);
    }

    fn finished(&self, result: &TestResult) {
        let mut block = self.finished_line(result);
        if self.verbose && !result.output().is_empty() {
            block.push('\n');
            block.push_str(result.output().trim_end());
        }
        println!("{}", block);
    }
}
