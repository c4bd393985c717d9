//! Unit runner: compile, then simulate, then classify.
//!
//! [`UnitRunner::run`] never returns an error. Spawn failures, compiler
//! failures, timeouts and simulation failures all become a failing
//! [`TestResult`], so every unit yields exactly one result.

use crate::catalog::TestUnit;
use crate::classify::{classify_with_rule, SimulationOutcome, Verdict, TIMEOUT_MARKER};
use crate::results::TestResult;
use artifacts::{BuildLayout, SourceLibrary};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use toolchain::{CompileRequest, Toolchain};
use tracing::{debug, info, info_span, warn, Instrument};

/// Prefix of every compile-phase error summary.
pub const COMPILE_FAILURE_PREFIX: &str = "Compilation failed:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub build_dir: PathBuf,
    /// Design sources compiled together with every testbench.
    pub src_dir: PathBuf,
    pub compile_timeout: Duration,
    pub simulate_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            src_dir: PathBuf::from("src"),
            compile_timeout: Duration::from_secs(60),
            simulate_timeout: Duration::from_secs(300),
        }
    }
}

pub struct UnitRunner<T: Toolchain + ?Sized> {
    toolchain: Arc<T>,
    layout: BuildLayout,
    settings: RunnerSettings,
}

impl<T: Toolchain + ?Sized> UnitRunner<T> {
    pub fn new(toolchain: Arc<T>, settings: RunnerSettings) -> Self {
        let layout = BuildLayout::new(&settings.build_dir, toolchain.artifact_extension());
        Self {
            toolchain,
            layout,
            settings,
        }
    }

    /// Run one unit through both phases. Duration covers everything from
    /// library listing to classification.
    pub async fn run(&self, unit: &TestUnit) -> TestResult {
        let span = info_span!("unit", unit = %unit.name, toolchain = self.toolchain.toolchain_name());
        let start = Instant::now();

        async {
            let result = self.run_phases(unit, start).await;
            if result.passed() {
                info!(elapsed_ms = result.duration().as_millis() as u64, "Unit passed");
            } else {
                info!(
                    elapsed_ms = result.duration().as_millis() as u64,
                    error = result.error_message().unwrap_or_default(),
                    "Unit failed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_phases(&self, unit: &TestUnit, start: Instant) -> TestResult {
        let fail = |output: String, message: String| {
            TestResult::fail(&unit.name, start.elapsed(), output, message)
        };

        let library = match SourceLibrary::scan(&self.settings.src_dir) {
            Ok(library) => library,
            Err(e) => {
                warn!(error = %e, "Could not list source library");
                return fail(String::new(), e.to_string());
            }
        };

        if let Err(e) = self.layout.prepare() {
            warn!(error = %e, "Could not prepare build directory");
            return fail(String::new(), e.to_string());
        }

        let artifact = self.layout.artifact_path(&unit.name);
        let request = CompileRequest {
            unit_name: &unit.name,
            source: &unit.source,
            library: library.files(),
            artifact: &artifact,
        };

        debug!(
            phase = "compile",
            source = %unit.source.display(),
            library_files = library.len(),
            artifact = %artifact.display(),
            "Compiling"
        );

        let compiled = match self
            .toolchain
            .compile(&request, self.settings.compile_timeout)
            .await
        {
            Ok(output) => output,
            Err(e) => return fail(String::new(), e.to_string()),
        };

        if compiled.timed_out {
            return fail(
                compiled.stdout,
                format!("{}\n{}", COMPILE_FAILURE_PREFIX, TIMEOUT_MARKER),
            );
        }

        if !compiled.success() {
            let stderr = compiled.stderr.trim_end();
            let detail = if stderr.trim().is_empty() {
                match compiled.exit_code {
                    Some(code) => format!("compiler exited with status {}", code),
                    None => "compiler terminated by signal".to_string(),
                }
            } else {
                stderr.to_string()
            };
            return fail(
                compiled.stdout.clone(),
                format!("{}\n{}", COMPILE_FAILURE_PREFIX, detail),
            );
        }

        debug!(phase = "simulate", artifact = %artifact.display(), "Simulating");

        let simulated = match self
            .toolchain
            .simulate(&artifact, self.settings.simulate_timeout)
            .await
        {
            Ok(output) => output,
            Err(e) => return fail(String::new(), e.to_string()),
        };

        let text = simulated.combined();
        let (verdict, rule) = classify_with_rule(&SimulationOutcome {
            text: &text,
            exit_code: simulated.exit_code,
            timed_out: simulated.timed_out,
        });
        debug!(phase = "simulate", rule, exit = %simulated.describe_exit(), "Classified");

        match verdict {
            Verdict::Pass => TestResult::pass(&unit.name, start.elapsed(), text),
            Verdict::Fail { summary } => fail(text, summary),
        }
    }
}
