//! Bounded worker pool over [`UnitRunner`].
//!
//! At most `concurrency` units are in flight at once and units start in input
//! order. Each task carries its input index, so the returned results follow
//! the input order whatever order units finish in. Sequential execution is
//! just `concurrency == 1`.

use crate::catalog::TestUnit;
use crate::results::TestResult;
use crate::runner::UnitRunner;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use toolchain::Toolchain;
use tracing::{debug, error, info, warn};

/// Observer for unit lifecycle events. Called from worker tasks.
pub trait ProgressSink: Send + Sync {
    fn started(&self, _unit: &TestUnit) {}

    fn finished(&self, _result: &TestResult) {}
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Completed results, in input order.
    pub results: Vec<TestResult>,
    pub cancelled: bool,
    /// Units that were never started because the run was cancelled.
    pub not_started: usize,
    /// Units whose processes were terminated by cancellation.
    pub interrupted: usize,
}

pub struct Scheduler<T: Toolchain + ?Sized + 'static> {
    runner: Arc<UnitRunner<T>>,
    concurrency: usize,
    progress: Arc<dyn ProgressSink>,
}

impl<T: Toolchain + ?Sized + 'static> Scheduler<T> {
    /// `concurrency` is clamped to at least 1.
    pub fn new(runner: UnitRunner<T>, concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            concurrency: concurrency.max(1),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every unit and return completed results in input order.
    ///
    /// When `shutdown` resolves no further units are started and in-flight
    /// units are aborted, which kills their child processes. Results that
    /// completed before that point are kept.
    pub async fn run_all<F>(&self, units: &[TestUnit], shutdown: F) -> ScheduleOutcome
    where
        F: Future<Output = ()>,
    {
        info!(
            units = units.len(),
            concurrency = self.concurrency,
            "Starting test run"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();
        let mut slots: Vec<Option<TestResult>> = (0..units.len()).map(|_| None).collect();
        let mut queue = units.iter().cloned().enumerate().peekable();
        let mut cancelled = false;
        let mut interrupted = 0;

        tokio::pin!(shutdown);

        loop {
            let nothing_to_start = cancelled || queue.peek().is_none();
            if nothing_to_start && tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = &mut shutdown, if !cancelled => {
                    warn!(in_flight = tasks.len(), "Cancellation requested, terminating in-flight units");
                    cancelled = true;
                    tasks.abort_all();
                }

                joined = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Some(Ok((index, result))) => slots[index] = Some(result),
                        Some(Err(e)) if e.is_cancelled() => interrupted += 1,
                        Some(Err(e)) => {
                            let Some(index) = task_index.get(&e.id()).copied() else {
                                error!(error = %e, "Worker task failed for an unknown unit");
                                continue;
                            };
                            let unit: &TestUnit = &units[index];
                            error!(unit = %unit.name, error = %e, "Worker task panicked");
                            let result = TestResult::fail(
                                &unit.name,
                                Duration::ZERO,
                                String::new(),
                                format!("Unit runner panicked: {}", e),
                            );
                            self.progress.finished(&result);
                            slots[index] = Some(result);
                        }
                        None => {}
                    }
                }

                permit = Arc::clone(&semaphore).acquire_owned(), if !nothing_to_start => {
                    let Ok(permit) = permit else {
                        break;
                    };
                    let Some((index, unit)) = queue.next() else {
                        continue;
                    };

                    let runner = Arc::clone(&self.runner);
                    let progress = Arc::clone(&self.progress);
                    debug!(unit = %unit.name, index, "Dispatching unit");

                    let handle = tasks.spawn(async move {
                        let _permit = permit;
                        progress.started(&unit);
                        let result = runner.run(&unit).await;
                        progress.finished(&result);
                        (index, result)
                    });
                    task_index.insert(handle.id(), index);
                }
            }
        }

        let not_started = queue.count();
        let results: Vec<TestResult> = slots.into_iter().flatten().collect();

        if cancelled {
            warn!(
                completed = results.len(),
                interrupted,
                not_started,
                "Test run cancelled"
            );
        } else {
            info!(completed = results.len(), "Test run finished");
        }

        ScheduleOutcome {
            results,
            cancelled,
            not_started,
            interrupted,
        }
    }
}
