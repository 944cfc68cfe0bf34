//! Job and job queue types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

/// How a job produces its destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Run the external encoder.
    Encode,
    /// Source is already in the target format; copy bytes.
    Copy,
}

impl JobKind {
    /// Get display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable ordering key: map entry position, then position inside the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SequenceIndex {
    /// 0-based index of the map entry.
    pub entry: usize,
    /// 1-based ordinal inside the entry (always 1 for file entries).
    pub ordinal: usize,
}

impl SequenceIndex {
    pub fn new(entry: usize, ordinal: usize) -> Self {
        Self { entry, ordinal }
    }
}

/// One unit of work: one source file to one destination file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    /// Resolved input file.
    pub source_path: PathBuf,
    /// Destination relative to the output root.
    pub dest_path: PathBuf,
    /// Encode or copy.
    pub kind: JobKind,
    /// Ordering key.
    pub sequence_index: SequenceIndex,
    /// Map file line the job came from.
    pub map_line: usize,
}

/// What the dispatcher should do with a planned job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Execute the job.
    Run,
    /// Destination already existed at planning time.
    SkipExisting,
}

/// A job together with the planner's decision for it.
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub job: Arc<Job>,
    pub disposition: Disposition,
}

impl PlannedJob {
    pub fn is_runnable(&self) -> bool {
        self.disposition == Disposition::Run
    }
}

/// Validated, ordered job queue produced by the planner.
///
/// Destinations are pairwise unique; order follows `SequenceIndex`.
#[derive(Debug, Clone, Default)]
pub struct JobQueue {
    jobs: Vec<PlannedJob>,
}

impl JobQueue {
    pub(crate) fn from_sorted(jobs: Vec<PlannedJob>) -> Self {
        Self { jobs }
    }

    /// All planned jobs in queue order.
    pub fn jobs(&self) -> &[PlannedJob] {
        &self.jobs
    }

    /// Number of jobs in queue.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if queue is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs the dispatcher will actually execute.
    pub fn runnable_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_runnable()).count()
    }

    /// Jobs skipped because their output already exists.
    pub fn pre_skipped_count(&self) -> usize {
        self.len() - self.runnable_count()
    }

    /// Runnable jobs of the given kind.
    pub fn runnable_of_kind(&self, kind: JobKind) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.is_runnable() && j.job.kind == kind)
            .count()
    }
}
