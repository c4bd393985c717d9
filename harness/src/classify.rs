//! Simulator output classification
//!
//! The verdict for a simulated unit comes from a fixed, ordered rule table.
//! The first rule whose condition holds decides:
//!
//! | # | rule           | condition                             | verdict |
//! |---|----------------|---------------------------------------|---------|
//! | 1 | `timeout`      | the simulator was killed on timeout   | fail, [`TIMEOUT_MARKER`] |
//! | 2 | `fail-marker`  | output contains `FAIL` or `ERROR`     | fail, first 5 marked lines |
//! | 3 | `pass-marker`  | output contains `PASS`                | pass |
//! | 4 | `exit-status`  | always                                | pass iff exit code is 0 |
//!
//! Rule 4 is lenient: a simulator that prints nothing and exits 0 passes.

/// Error summary used when a phase exceeds its time limit.
pub const TIMEOUT_MARKER: &str = "Test timed out";

/// Substrings that mark a failing line.
pub const FAILURE_MARKERS: [&str; 2] = ["FAIL", "ERROR"];

/// Substring that marks an explicit pass.
pub const PASS_MARKER: &str = "PASS";

/// Maximum number of marked lines kept in an error summary.
pub const MAX_ERROR_LINES: usize = 5;

/// What the simulator left behind.
#[derive(Debug, Clone, Copy)]
pub struct SimulationOutcome<'a> {
    pub text: &'a str,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { summary: String },
}

struct Rule {
    name: &'static str,
    applies: fn(&SimulationOutcome<'_>) -> bool,
    decide: fn(&SimulationOutcome<'_>) -> Verdict,
}

/// Marker-driven rules, tried in order before the exit-status fallback.
const RULES: [Rule; 3] = [
    Rule {
        name: "timeout",
        applies: |outcome| outcome.timed_out,
        decide: |_| Verdict::Fail {
            summary: TIMEOUT_MARKER.to_string(),
        },
    },
    Rule {
        name: "fail-marker",
        applies: |outcome| has_failure_marker(outcome.text),
        decide: |outcome| Verdict::Fail {
            summary: failure_lines(outcome.text, MAX_ERROR_LINES).join("\n"),
        },
    },
    Rule {
        name: "pass-marker",
        applies: |outcome| outcome.text.contains(PASS_MARKER),
        decide: |_| Verdict::Pass,
    },
];

const EXIT_STATUS_RULE: &str = "exit-status";

fn exit_status_verdict(outcome: &SimulationOutcome<'_>) -> Verdict {
    match outcome.exit_code {
        Some(0) => Verdict::Pass,
        Some(code) => Verdict::Fail {
            summary: format!("Simulation exited with status {}", code),
        },
        None => Verdict::Fail {
            summary: "Simulation terminated by signal".to_string(),
        },
    }
}

/// Apply the rule table. Returns the verdict and the name of the deciding rule.
pub fn classify_with_rule(outcome: &SimulationOutcome<'_>) -> (Verdict, &'static str) {
    RULES
        .iter()
        .find(|rule| (rule.applies)(outcome))
        .map(|rule| ((rule.decide)(outcome), rule.name))
        .unwrap_or_else(|| (exit_status_verdict(outcome), EXIT_STATUS_RULE))
}

pub fn classify(outcome: &SimulationOutcome<'_>) -> Verdict {
    classify_with_rule(outcome).0
}

pub fn has_failure_marker(text: &str) -> bool {
    FAILURE_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Lines containing a failure marker, in original order, at most `limit`.
pub fn failure_lines(text: &str, limit: usize) -> Vec<&str> {
    text.lines()
        .filter(|line| has_failure_marker(line))
        .take(limit)
        .collect()
}
