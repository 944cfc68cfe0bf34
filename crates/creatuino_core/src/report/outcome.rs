//! Per-job outcome types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::plan::Job;

/// Coarse status of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Done,
    Skipped,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Output existed when the plan was made.
    PreExisting,
    /// Output was created by someone else while the job ran.
    AppearedDuringRun,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreExisting => "already present",
            Self::AppearedDuringRun => "appeared during run",
        }
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Encode or copy error local to the job.
    Job,
    /// Encoder exceeded its timeout.
    TimedOut,
    /// Stopped by a cancellation request.
    Cancelled,
    /// Never ran because the output root became unusable.
    Aborted,
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Skipped { reason: SkipReason },
    Failed { kind: FailureKind, detail: String },
}

impl Outcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Done => OutcomeStatus::Done,
            Self::Skipped { .. } => OutcomeStatus::Skipped,
            Self::Failed { .. } => OutcomeStatus::Failed,
        }
    }
}

/// A job's outcome together with the job it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: Arc<Job>,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn done(job: Arc<Job>, elapsed: Duration) -> Self {
        Self {
            job,
            outcome: Outcome::Done,
            elapsed,
        }
    }

    pub fn skipped(job: Arc<Job>, reason: SkipReason, elapsed: Duration) -> Self {
        Self {
            job,
            outcome: Outcome::Skipped { reason },
            elapsed,
        }
    }

    pub fn failed(
        job: Arc<Job>,
        kind: FailureKind,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            job,
            outcome: Outcome::Failed {
                kind,
                detail: detail.into(),
            },
            elapsed,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        self.outcome.status()
    }

    /// Failure detail, if the job failed.
    pub fn detail(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

pub(crate) fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
