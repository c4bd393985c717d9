//! Outcome types shared by the runner, scheduler and reporter.

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Outcome of executing one test unit.
///
/// Built only through [`TestResult::pass`] and [`TestResult::fail`], which
/// keeps `error_message` present exactly when the unit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    name: String,
    passed: bool,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    duration: Duration,
    output: String,
    error_message: Option<String>,
}

impl TestResult {
    pub fn pass(name: impl Into<String>, duration: Duration, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            duration,
            output: output.into(),
            error_message: None,
        }
    }

    /// A failing result. Blank messages are replaced so a failure always
    /// carries at least one line of diagnostic text.
    pub fn fail(
        name: impl Into<String>,
        duration: Duration,
        output: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let mut error_message = error_message.into();
        if error_message.trim().is_empty() {
            error_message = "Test failed without diagnostic output".to_string();
        }

        Self {
            name: name.into(),
            passed: false,
            duration,
            output: output.into(),
            error_message: Some(error_message),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Captured tool output.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Totals derived from a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Sum of per-unit durations, not wall-clock time.
    #[serde(rename = "total_duration_secs", serialize_with = "serialize_secs")]
    pub total_duration: Duration,
    pub exit_code: i32,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed()).count();
        let failed = total - passed;
        let total_duration = results.iter().map(TestResult::duration).sum();

        Self {
            total,
            passed,
            failed,
            total_duration,
            exit_code: exit_code(total, failed),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// `0` iff at least one unit ran and none failed.
pub fn exit_code(total: usize, failed: usize) -> i32 {
    if total > 0 && failed == 0 {
        0
    } else {
        1
    }
}
