//! Aggregated run report and exit status.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::outcome::{serialize_secs, FailureKind, JobOutcome, Outcome, OutcomeStatus, SkipReason};

/// Every job done or skipped.
pub const EXIT_OK: u8 = 0;
/// At least one job failed.
pub const EXIT_JOB_FAILURES: u8 = 1;
/// The run stopped before dispatch.
pub const EXIT_FATAL: u8 = 2;

/// Outcome counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub total: usize,
    pub done: usize,
    pub skipped_pre_existing: usize,
    pub skipped_appeared: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub aborted: usize,
}

impl RunCounts {
    pub fn skipped(&self) -> usize {
        self.skipped_pre_existing + self.skipped_appeared
    }
}

/// All outcomes of one run, in queue order.
#[derive(Debug, Clone)]
pub struct RunReport {
    started_at: DateTime<Local>,
    elapsed: Duration,
    outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Local>, elapsed: Duration, outcomes: Vec<JobOutcome>) -> Self {
        Self {
            started_at,
            elapsed,
            outcomes,
        }
    }

    /// Report of a run that had nothing to do.
    pub fn empty(started_at: DateTime<Local>) -> Self {
        Self::new(started_at, Duration::ZERO, Vec::new())
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            total: self.outcomes.len(),
            ..RunCounts::default()
        };
        for outcome in &self.outcomes {
            match &outcome.outcome {
                Outcome::Done => counts.done += 1,
                Outcome::Skipped { reason } => match reason {
                    SkipReason::PreExisting => counts.skipped_pre_existing += 1,
                    SkipReason::AppearedDuringRun => counts.skipped_appeared += 1,
                },
                Outcome::Failed { kind, .. } => {
                    counts.failed += 1;
                    match kind {
                        FailureKind::Cancelled => counts.cancelled += 1,
                        FailureKind::Aborted => counts.aborted += 1,
                        FailureKind::Job | FailureKind::TimedOut => {}
                    }
                }
            }
        }
        counts
    }

    /// Failed outcomes, in queue order.
    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status() == OutcomeStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> u8 {
        if self.has_failures() {
            EXIT_JOB_FAILURES
        } else {
            EXIT_OK
        }
    }

    /// Write the report as pretty JSON, replacing `path` atomically.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let document = ReportDocument {
            started_at: self.started_at,
            elapsed: self.elapsed,
            exit_code: self.exit_code(),
            counts: self.counts(),
            outcomes: &self.outcomes,
        };

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, &document)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        tracing::info!("Wrote run report to {}", path.display());
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    started_at: DateTime<Local>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    elapsed: Duration,
    exit_code: u8,
    counts: RunCounts,
    outcomes: &'a [JobOutcome],
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts();
        writeln!(
            f,
            "Run started {} finished in {:.1}s: {} job(s), {} done, {} skipped, {} failed",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.elapsed.as_secs_f64(),
            counts.total,
            counts.done,
            counts.skipped(),
            counts.failed
        )?;

        if counts.skipped() > 0 {
            writeln!(
                f,
                "Skipped: {} {}, {} {}",
                counts.skipped_pre_existing,
                SkipReason::PreExisting.as_str(),
                counts.skipped_appeared,
                SkipReason::AppearedDuringRun.as_str()
            )?;
            for outcome in &self.outcomes {
                if let Outcome::Skipped {
                    reason: SkipReason::AppearedDuringRun,
                } = outcome.outcome
                {
                    writeln!(
                        f,
                        "  - {} (line {}): {}",
                        outcome.job.dest_path.display(),
                        outcome.job.map_line,
                        SkipReason::AppearedDuringRun.as_str()
                    )?;
                }
            }
        }

        if counts.failed > 0 {
            writeln!(f, "Failed:")?;
            for outcome in self.failures() {
                writeln!(
                    f,
                    "  - {} (line {}, {} from {}): {}",
                    outcome.job.dest_path.display(),
                    outcome.job.map_line,
                    outcome.job.kind,
                    outcome.job.source_path.display(),
                    outcome.detail().unwrap_or_default()
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Job, JobKind, SequenceIndex};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn job(n: usize) -> Arc<Job> {
        Arc::new(Job {
            source_path: PathBuf::from(format!("/music/{}.wav", n)),
            dest_path: PathBuf::from(format!("01/{}.mp3", n)),
            kind: JobKind::Encode,
            sequence_index: SequenceIndex::new(0, n),
            map_line: 1,
        })
    }

    fn mixed_report() -> RunReport {
        RunReport::new(
            Local::now(),
            Duration::from_millis(1500),
            vec![
                JobOutcome::done(job(1), Duration::from_millis(400)),
                JobOutcome::skipped(job(2), SkipReason::PreExisting, Duration::ZERO),
                JobOutcome::skipped(job(3), SkipReason::AppearedDuringRun, Duration::ZERO),
                JobOutcome::failed(
                    job(4),
                    FailureKind::Job,
                    "encoder exit status: 1",
                    Duration::ZERO,
                ),
                JobOutcome::failed(
                    job(5),
                    FailureKind::Cancelled,
                    "cancelled before start",
                    Duration::ZERO,
                ),
            ],
        )
    }

    #[test]
    fn counts_split_skip_reasons() {
        let counts = mixed_report().counts();
        assert_eq!(counts.total, 5);
        assert_eq!(counts.done, 1);
        assert_eq!(counts.skipped_pre_existing, 1);
        assert_eq!(counts.skipped_appeared, 1);
        assert_eq!(counts.skipped(), 2);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.cancelled, 1);
    }

    #[test]
    fn exit_code_reflects_failures() {
        assert_eq!(mixed_report().exit_code(), EXIT_JOB_FAILURES);
        assert_eq!(RunReport::empty(Local::now()).exit_code(), EXIT_OK);

        let clean = RunReport::new(
            Local::now(),
            Duration::ZERO,
            vec![
                JobOutcome::done(job(1), Duration::ZERO),
                JobOutcome::skipped(job(2), SkipReason::PreExisting, Duration::ZERO),
            ],
        );
        assert_eq!(clean.exit_code(), EXIT_OK);
    }

    #[test]
    fn summary_lists_every_failure() {
        let text = mixed_report().to_string();
        assert!(text.contains("5 job(s), 1 done, 2 skipped, 2 failed"));
        assert!(text.contains("1 already present, 1 appeared during run"));
        assert!(
            text.contains("01/4.mp3 (line 1, encode from /music/4.wav): encoder exit status: 1")
        );
        assert!(text.contains("01/5.mp3"));
        assert!(!text.contains("01/1.mp3"));
    }

    #[test]
    fn json_export_contains_counts_and_outcomes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports/run.json");

        mixed_report().write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["exit_code"], 1);
        assert_eq!(value["counts"]["done"], 1);
        assert_eq!(value["outcomes"].as_array().unwrap().len(), 5);
        assert_eq!(value["outcomes"][3]["kind"], "job");
        assert_eq!(value["elapsed_secs"], 1.5);
    }
}
