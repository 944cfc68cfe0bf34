//! Bounded worker pool executing a job queue.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use parking_lot::Mutex;

use super::cancel::CancelHandle;
use super::copy::copy_file;
use super::encoder::{run_encoder, EncoderConfig, RunLimits};
use super::staging::{ensure_parent, probe_writable, publish, stage_path, Published};
use crate::config::{Settings, DEFAULT_ENCODER_NAME};
use crate::errors::{JobError, StructuralError};
use crate::plan::{Job, JobKind, JobQueue};
use crate::report::{FailureKind, JobOutcome, RunReport, SkipReason};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker count; 0 means one worker per runnable job.
    pub max_workers: usize,
    /// Replace files that appear at a destination during the run.
    pub overwrite: bool,
    /// Root that job destinations are relative to.
    pub output_root: PathBuf,
    /// How long running encoders may continue after cancellation.
    pub shutdown_grace: Duration,
    /// Encoder for encode jobs; `None` when the queue has none.
    pub encoder: Option<EncoderConfig>,
}

impl DispatcherConfig {
    pub fn from_settings(
        settings: &Settings,
        output_root: impl Into<PathBuf>,
        encoder: Option<EncoderConfig>,
    ) -> Self {
        Self {
            max_workers: settings.jobs.max_workers,
            overwrite: settings.jobs.overwrite,
            output_root: output_root.into(),
            shutdown_grace: settings.jobs.shutdown_grace(),
            encoder,
        }
    }
}

/// Runs planned jobs on a fixed pool of worker threads.
pub struct Dispatcher {
    config: DispatcherConfig,
    cancel: CancelHandle,
}

/// State shared by the workers of one run.
struct RunState<'q> {
    /// Queue positions and jobs still to run.
    pending: Vec<(usize, &'q Arc<Job>)>,
    /// Next entry of `pending` to claim.
    cursor: AtomicUsize,
    /// One slot per queue position.
    slots: Mutex<Vec<Option<JobOutcome>>>,
    /// Set once the output root has become unusable.
    aborted: AtomicBool,
    abort_cause: Mutex<Option<String>>,
}

impl<'q> RunState<'q> {
    fn claim(&self, cancel: &CancelHandle) -> Option<(usize, &'q Arc<Job>)> {
        if cancel.is_cancelled() || self.aborted.load(Ordering::SeqCst) {
            return None;
        }
        let next = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.pending.get(next).copied()
    }

    fn record(&self, slot: usize, outcome: JobOutcome) {
        self.slots.lock()[slot] = Some(outcome);
    }

    fn abort(&self, cause: &StructuralError) {
        let mut abort_cause = self.abort_cause.lock();
        if abort_cause.is_none() {
            tracing::error!("{}; aborting remaining jobs", cause);
            *abort_cause = Some(cause.to_string());
        }
        self.aborted.store(true, Ordering::SeqCst);
    }
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, cancel: CancelHandle) -> Self {
        Self { config, cancel }
    }

    /// Execute every job in the queue and collect one outcome per job.
    ///
    /// Job failures are recorded, never propagated. The only error is a
    /// pool that could not start a single worker.
    pub fn run(&self, queue: &JobQueue) -> Result<RunReport, StructuralError> {
        let started_at = Local::now();
        let started = Instant::now();

        let mut slots: Vec<Option<JobOutcome>> = vec![None; queue.len()];
        let mut pending = Vec::new();
        for (slot, planned) in queue.jobs().iter().enumerate() {
            if planned.is_runnable() {
                pending.push((slot, &planned.job));
            } else {
                tracing::debug!("Skipping {}: already present", planned.job.dest_path.display());
                slots[slot] = Some(JobOutcome::skipped(
                    Arc::clone(&planned.job),
                    SkipReason::PreExisting,
                    Duration::ZERO,
                ));
            }
        }

        let workers = match self.config.max_workers {
            0 => pending.len(),
            n => n.min(pending.len()),
        };
        tracing::info!(
            "Dispatching {} job(s) on {} worker(s), {} already present",
            pending.len(),
            workers,
            queue.len() - pending.len()
        );

        let state = RunState {
            pending,
            cursor: AtomicUsize::new(0),
            slots: Mutex::new(slots),
            aborted: AtomicBool::new(false),
            abort_cause: Mutex::new(None),
        };

        let spawned = thread::scope(|scope| {
            let mut spawned = 0usize;
            for n in 0..workers {
                let builder = thread::Builder::new().name(format!("creatuino-worker-{}", n));
                match builder.spawn_scoped(scope, || self.worker_loop(&state)) {
                    Ok(_) => spawned += 1,
                    Err(e) => {
                        tracing::warn!("Could not start worker {}: {}", n, e);
                        if spawned == 0 {
                            return Err(e);
                        }
                        break;
                    }
                }
            }
            Ok::<usize, io::Error>(spawned)
        })
        .map_err(|source| StructuralError::WorkerSpawn { source })?;
        tracing::debug!("{} worker(s) finished", spawned);

        let abort_cause = state.abort_cause.into_inner();
        let outcomes: Vec<JobOutcome> = state
            .slots
            .into_inner()
            .into_iter()
            .zip(queue.jobs())
            .map(|(slot, planned)| {
                slot.unwrap_or_else(|| self.unstarted_outcome(&planned.job, abort_cause.as_deref()))
            })
            .collect();

        let report = RunReport::new(started_at, started.elapsed(), outcomes);
        let counts = report.counts();
        tracing::info!(
            "Dispatch finished: {} done, {} skipped, {} failed",
            counts.done,
            counts.skipped(),
            counts.failed
        );
        Ok(report)
    }

    fn unstarted_outcome(&self, job: &Arc<Job>, abort_cause: Option<&str>) -> JobOutcome {
        match abort_cause {
            Some(cause) => JobOutcome::failed(
                Arc::clone(job),
                FailureKind::Aborted,
                format!("not started: {}", cause),
                Duration::ZERO,
            ),
            None => JobOutcome::failed(
                Arc::clone(job),
                FailureKind::Cancelled,
                "cancelled before start",
                Duration::ZERO,
            ),
        }
    }

    fn worker_loop(&self, state: &RunState<'_>) {
        while let Some((slot, job)) = state.claim(&self.cancel) {
            let started = Instant::now();
            tracing::debug!(
                "Starting {} {} -> {}",
                job.kind,
                job.source_path.display(),
                job.dest_path.display()
            );

            let result = self.execute(job);
            let elapsed = started.elapsed();

            let outcome = match result {
                Ok(Published::Written) => {
                    tracing::debug!(
                        "Done {} in {:.1}s",
                        job.dest_path.display(),
                        elapsed.as_secs_f64()
                    );
                    JobOutcome::done(Arc::clone(job), elapsed)
                }
                Ok(Published::DestinationExists) => {
                    tracing::warn!(
                        "Skipped {}: file appeared during run",
                        job.dest_path.display()
                    );
                    JobOutcome::skipped(Arc::clone(job), SkipReason::AppearedDuringRun, elapsed)
                }
                Err(err) => {
                    tracing::error!("Failed {}: {}", job.dest_path.display(), err);
                    if may_be_structural(&err) {
                        if let Err(cause) = probe_writable(&self.config.output_root) {
                            state.abort(&cause);
                        }
                    }
                    let kind = match err {
                        JobError::TimedOut { .. } => FailureKind::TimedOut,
                        JobError::Cancelled => FailureKind::Cancelled,
                        // a terminal interrupt reaches the encoder's process group too
                        JobError::EncoderFailed { .. } if self.cancel.is_cancelled() => {
                            FailureKind::Cancelled
                        }
                        _ => FailureKind::Job,
                    };
                    JobOutcome::failed(Arc::clone(job), kind, err.to_string(), elapsed)
                }
            };
            state.record(slot, outcome);
        }
    }

    fn execute(&self, job: &Job) -> Result<Published, JobError> {
        let dest = self.config.output_root.join(&job.dest_path);
        ensure_parent(&dest)?;

        match job.kind {
            JobKind::Copy => copy_file(&job.source_path, &dest, self.config.overwrite),
            JobKind::Encode => self.encode(job, &dest),
        }
    }

    fn encode(&self, job: &Job, dest: &std::path::Path) -> Result<Published, JobError> {
        let Some(encoder) = &self.config.encoder else {
            return Err(JobError::Spawn {
                encoder: PathBuf::from(DEFAULT_ENCODER_NAME),
                source: io::Error::new(io::ErrorKind::NotFound, "no encoder configured"),
            });
        };

        if !job.source_path.is_file() {
            return Err(JobError::SourceMissing {
                path: job.source_path.clone(),
            });
        }

        let temp = stage_path(dest)?;
        let limits = RunLimits {
            cancel: &self.cancel,
            shutdown_grace: self.config.shutdown_grace,
        };
        run_encoder(encoder, &job.source_path, &temp, &limits)?;
        publish(temp, dest, self.config.overwrite)
    }
}

/// Errors that could stem from the output root itself.
fn may_be_structural(err: &JobError) -> bool {
    matches!(err, JobError::Io { .. } | JobError::EncoderFailed { .. })
}
