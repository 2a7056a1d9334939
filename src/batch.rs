//! Batch translation driver
//!
//! Translates every page unit of a working directory through one
//! [`PageTranslator`], at most `workers` units at a time. A unit that fails
//! is recorded and the rest carry on; the result of a run is a
//! [`BatchSummary`], never an error.
//!
//! Each unit runs in two tasks. The outer task holds the worker permit and
//! cannot fail; the inner task calls the backend. That way a backend that
//! panics, hangs past the timeout or is cancelled only loses its own inner
//! task, and the permit is always returned.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::backend::PageTranslator;
use crate::config::DriverConfig;
use crate::error::Result;
use crate::units::{PageUnit, discover_units};

const CANCELLED_BEFORE_START: &str = "cancelled before start";
const CANCELLED: &str = "cancelled";

/// How long an aborted backend call may take to wind down. A call that
/// completes within it is reported as done, since its result is on disk.
const ABORT_GRACE: Duration = Duration::from_secs(2);

/// Cooperative cancellation shared by the driver and whoever may stop it
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The units of one run, enumerated once when the run starts
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub dir: PathBuf,
    pub units: Vec<PageUnit>,
}

impl BatchJob {
    pub fn discover(dir: &Path) -> Result<Self> {
        let units = discover_units(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            units,
        })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed { reason: String },
}

impl JobOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        JobOutcome::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitResult {
    pub unit: PageUnit,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

impl UnitResult {
    fn not_started(unit: PageUnit, reason: &str) -> Self {
        Self {
            unit,
            outcome: JobOutcome::failed(reason),
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnit {
    pub unit: PageUnit,
    pub reason: String,
}

/// Tally of one run. `succeeded + failed.len() == attempted` always holds.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Sorted by page index, then file name
    pub failed: Vec<FailedUnit>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn from_results(results: Vec<UnitResult>, elapsed: Duration) -> Self {
        let attempted = results.len();
        let mut succeeded = 0;
        let mut failed = Vec::new();
        for result in results {
            match result.outcome {
                JobOutcome::Succeeded => succeeded += 1,
                JobOutcome::Failed { reason } => failed.push(FailedUnit {
                    unit: result.unit,
                    reason,
                }),
            }
        }
        failed.sort_by(|a, b| a.unit.cmp(&b.unit));
        Self {
            attempted,
            succeeded,
            failed,
            elapsed,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} succeeded, {} failed",
            self.attempted,
            self.succeeded,
            self.failed.len()
        )?;
        for failure in &self.failed {
            write!(f, "\n  {}: {}", failure.unit, failure.reason)?;
        }
        Ok(())
    }
}

/// Outcome of a single backend call
enum Attempt {
    Done,
    Failed(String),
    Cancelled,
}

pub struct BatchDriver {
    translator: Arc<dyn PageTranslator>,
    config: DriverConfig,
    cancel: CancelHandle,
}

impl BatchDriver {
    pub fn new(translator: Arc<dyn PageTranslator>, config: DriverConfig) -> Self {
        Self {
            translator,
            config,
            cancel: CancelHandle::new(),
        }
    }

    /// Use an existing handle, e.g. one wired to Ctrl-C
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Translate every unit in `dir`.
    ///
    /// Errors only when the run cannot start (bad configuration, missing
    /// directory). Unit failures end up in the summary.
    pub async fn run(&self, dir: &Path) -> Result<BatchSummary> {
        self.config.validate()?;
        let job = BatchJob::discover(dir)?;
        Ok(self.run_job(job).await)
    }

    pub async fn run_job(&self, job: BatchJob) -> BatchSummary {
        let started = Instant::now();
        if job.is_empty() {
            info!("No page units in {}", job.dir.display());
            return BatchSummary::from_results(Vec::new(), started.elapsed());
        }

        let workers = self.config.workers.max(1);
        info!(
            "Translating {} units from {} with {} ({} workers)",
            job.len(),
            job.dir.display(),
            self.translator.name(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut results = Vec::with_capacity(job.len());

        for unit in job.units.iter().cloned() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                results.push(UnitResult::not_started(unit, CANCELLED_BEFORE_START));
                continue;
            };

            let translator = self.translator.clone();
            let config = self.config.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let result = run_unit(translator, unit, &config, &cancel).await;
                drop(permit);
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Unit task ended abnormally: {}", e),
            }
        }

        // a unit whose outer task vanished still has to be counted
        let reported: HashSet<PathBuf> = results.iter().map(|r| r.unit.path.clone()).collect();
        for unit in job.units {
            if !reported.contains(&unit.path) {
                results.push(UnitResult::not_started(unit, "worker task aborted"));
            }
        }

        let summary = BatchSummary::from_results(results, started.elapsed());
        info!(
            "Batch finished in {:.1}s: {} succeeded, {} failed",
            summary.elapsed.as_secs_f64(),
            summary.succeeded,
            summary.failed_count()
        );
        summary
    }
}

async fn run_unit(
    translator: Arc<dyn PageTranslator>,
    unit: PageUnit,
    config: &DriverConfig,
    cancel: &CancelHandle,
) -> UnitResult {
    let started = Instant::now();
    info!("Translating {}", unit);

    let mut attempts = 0;
    let outcome = loop {
        attempts += 1;
        match attempt_unit(&translator, &unit.path, config.unit_timeout, cancel).await {
            Attempt::Done => break JobOutcome::Succeeded,
            Attempt::Cancelled => break JobOutcome::failed(CANCELLED),
            Attempt::Failed(reason) if attempts <= config.retries => {
                let delay = config.backoff_for(attempts);
                warn!(
                    "{} failed (attempt {}): {}; retrying in {:.1}s",
                    unit,
                    attempts,
                    reason,
                    delay.as_secs_f64()
                );
                tokio::select! {
                    _ = cancel.cancelled() => break JobOutcome::failed(CANCELLED),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Attempt::Failed(reason) => break JobOutcome::failed(reason),
        }
    };

    let elapsed = started.elapsed();
    match &outcome {
        JobOutcome::Succeeded => info!("Finished {} in {:.1}s", unit, elapsed.as_secs_f64()),
        JobOutcome::Failed { reason } => warn!("Failed {}: {}", unit, reason),
    }

    UnitResult {
        unit,
        outcome,
        elapsed,
    }
}

async fn attempt_unit(
    translator: &Arc<dyn PageTranslator>,
    path: &Path,
    timeout: Option<Duration>,
    cancel: &CancelHandle,
) -> Attempt {
    let backend = translator.clone();
    let path = path.to_path_buf();
    let mut call = tokio::spawn(async move { backend.translate_page(&path).await });
    let abort = call.abort_handle();

    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    let interrupted = tokio::select! {
        joined = &mut call => return match joined {
            Ok(Ok(())) => Attempt::Done,
            Ok(Err(e)) => Attempt::Failed(e.to_string()),
            Err(e) => Attempt::Failed(join_failure(e)),
        },
        _ = deadline => {
            let limit = timeout.unwrap_or_default();
            debug!("Aborting backend call after {:?}", limit);
            Attempt::Failed(format!("timed out after {:.1}s", limit.as_secs_f64()))
        }
        _ = cancel.cancelled() => Attempt::Cancelled,
    };

    abort.abort();
    match tokio::time::timeout(ABORT_GRACE, call).await {
        Ok(Ok(Ok(()))) => {
            debug!("Backend call finished while being aborted");
            Attempt::Done
        }
        _ => interrupted,
    }
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("backend panicked: {}", message)
}
