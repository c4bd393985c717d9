//! In-memory toolchain for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use toolchain::{CompileRequest, ProcessOutput, Toolchain, ToolchainError, ToolchainResult};

/// Scripted behavior of one tool invocation.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    delay: Duration,
    /// `None` simulates a tool that cannot be spawned.
    output: Option<ProcessOutput>,
    panics: bool,
}

impl Step {
    pub(crate) fn exit(code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            output: Some(ProcessOutput {
                exit_code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                ..ProcessOutput::default()
            }),
            panics: false,
        }
    }

    /// Exits without a status code, as when killed by a signal.
    pub(crate) fn killed_by_signal() -> Self {
        Self {
            delay: Duration::ZERO,
            output: Some(ProcessOutput::default()),
            panics: false,
        }
    }

    pub(crate) fn spawn_error() -> Self {
        Self {
            delay: Duration::ZERO,
            output: None,
            panics: false,
        }
    }

    /// The tool call panics after its delay.
    pub(crate) fn panic() -> Self {
        Self {
            panics: true,
            ..Self::spawn_error()
        }
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn play(&self, program: &str, limit: Duration) -> ToolchainResult<ProcessOutput> {
        if self.delay > limit {
            tokio::time::sleep(limit).await;
            return Ok(ProcessOutput {
                exit_code: None,
                timed_out: true,
                elapsed: limit,
                ..ProcessOutput::default()
            });
        }

        tokio::time::sleep(self.delay).await;
        if self.panics {
            panic!("scripted {} crashed", program);
        }
        match &self.output {
            Some(output) => Ok(ProcessOutput {
                elapsed: self.delay,
                ..output.clone()
            }),
            None => Err(ToolchainError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCompile {
    pub(crate) unit_name: String,
    pub(crate) library: Vec<PathBuf>,
    pub(crate) artifact: PathBuf,
}

/// Toolchain whose per-unit behavior is scripted up front. Units without a
/// script compile cleanly and print `PASS`.
pub(crate) struct ScriptedToolchain {
    compile_steps: HashMap<String, Step>,
    simulate_steps: HashMap<String, Step>,
    compile_calls: AtomicUsize,
    simulate_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    compiles: Mutex<Vec<RecordedCompile>>,
}

impl ScriptedToolchain {
    pub(crate) fn new() -> Self {
        Self {
            compile_steps: HashMap::new(),
            simulate_steps: HashMap::new(),
            compile_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            compiles: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn compile(mut self, unit: &str, step: Step) -> Self {
        self.compile_steps.insert(unit.to_string(), step);
        self
    }

    pub(crate) fn simulate(mut self, unit: &str, step: Step) -> Self {
        self.simulate_steps.insert(unit.to_string(), step);
        self
    }

    pub(crate) fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn simulate_calls(&self) -> usize {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    /// Highest number of tool invocations observed running at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn compiled_units(&self) -> Vec<String> {
        self.compiles
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.unit_name.clone())
            .collect()
    }

    pub(crate) fn last_compile(&self) -> Option<RecordedCompile> {
        self.compiles.lock().unwrap().last().cloned()
    }

    async fn tracked(&self, step: Step, program: &str, limit: Duration) -> ToolchainResult<ProcessOutput> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);
        step.play(program, limit).await
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Toolchain for ScriptedToolchain {
    async fn compile(
        &self,
        request: &CompileRequest<'_>,
        timeout: Duration,
    ) -> ToolchainResult<ProcessOutput> {
        self.compile_calls.fetch_add(1, Ordering::SeqCst);
        self.compiles.lock().unwrap().push(RecordedCompile {
            unit_name: request.unit_name.to_string(),
            library: request.library.to_vec(),
            artifact: request.artifact.to_path_buf(),
        });

        let step = self
            .compile_steps
            .get(request.unit_name)
            .cloned()
            .unwrap_or_else(|| Step::exit(0, "", ""));
        self.tracked(step, "fake-compiler", timeout).await
    }

    async fn simulate(&self, artifact: &Path, timeout: Duration) -> ToolchainResult<ProcessOutput> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);

        let unit = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let step = self
            .simulate_steps
            .get(&unit)
            .cloned()
            .unwrap_or_else(|| Step::exit(0, "PASS\n", ""));
        self.tracked(step, "fake-simulator", timeout).await
    }

    fn artifact_extension(&self) -> &str {
        "out"
    }

    fn toolchain_name(&self) -> &str {
        "scripted"
    }
}
