//! Process execution with a hard deadline.
//!
//! Every external tool call goes through [`run_with_timeout`]. Children are
//! spawned with `kill_on_drop`, so aborting the task that awaits them (for
//! example when a run is cancelled) also terminates the process.

use crate::provider::{ToolchainError, ToolchainResult};
use crate::types::{CommandSpec, ProcessOutput};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

/// How long pipes may stay open after the child has exited.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 8 * 1024;

/// Run `spec` to completion or until `limit` elapses.
///
/// On expiry the child is killed and the returned output has `timed_out`
/// set, carrying whatever text was read before the kill.
pub async fn run_with_timeout(spec: &CommandSpec, limit: Duration) -> ToolchainResult<ProcessOutput> {
    debug!(command = %spec, timeout_secs = limit.as_secs_f64(), "Spawning process");

    let start = Instant::now();

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolchainError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let stdout_reader = child.stdout.take().map(PipeReader::spawn);
    let stderr_reader = child.stderr.take().map(PipeReader::spawn);

    let waited = timeout(limit, child.wait()).await;

    match waited {
        Ok(status) => {
            let status = status.map_err(|source| ToolchainError::Wait {
                program: spec.program.clone(),
                source,
            })?;

            let drain_until = Instant::now() + PIPE_DRAIN_GRACE;
            let stdout = PipeReader::finish(stdout_reader, drain_until).await;
            let stderr = PipeReader::finish(stderr_reader, drain_until).await;

            debug!(
                command = %spec,
                exit_code = ?status.code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Process finished"
            );

            Ok(ProcessOutput {
                exit_code: status.code(),
                stdout,
                stderr,
                timed_out: false,
                elapsed: start.elapsed(),
            })
        }
        Err(_) => {
            warn!(command = %spec, timeout_secs = limit.as_secs_f64(), "Process timed out, killing it");

            if let Err(e) = child.kill().await {
                warn!(command = %spec, error = %e, "Failed to kill timed out process");
            }

            let drain_until = Instant::now() + PIPE_DRAIN_GRACE;
            let stdout = PipeReader::finish(stdout_reader, drain_until).await;
            let stderr = PipeReader::finish(stderr_reader, drain_until).await;

            Ok(ProcessOutput {
                exit_code: None,
                stdout,
                stderr,
                timed_out: true,
                elapsed: start.elapsed(),
            })
        }
    }
}

/// Background reader that appends a pipe's bytes to a shared buffer, so
/// text read so far survives the reader being cut off.
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(mut pipe: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let task = tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let mut bytes = sink.lock().unwrap_or_else(PoisonError::into_inner);
                        bytes.extend_from_slice(&chunk[..n]);
                    }
                    Err(e) => {
                        debug!(error = %e, "Pipe read ended early");
                        break;
                    }
                }
            }
        });

        Self { buffer, task }
    }

    /// Wait for end-of-file until `until`, then return the text read so far.
    /// A grandchild can keep a pipe open after the child exits, in which
    /// case the reader is abandoned at `until`.
    async fn finish(reader: Option<Self>, until: Instant) -> String {
        let Some(mut reader) = reader else {
            return String::new();
        };

        match timeout_at(until, &mut reader.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Output reader task failed"),
            Err(_) => {
                reader.task.abort();
                debug!("Output pipe still open after process exit, keeping partial output");
            }
        }

        let bytes = std::mem::take(&mut *reader.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
