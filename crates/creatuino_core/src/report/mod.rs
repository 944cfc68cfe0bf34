//! Run reporting.
//!
//! Every job yields exactly one [`JobOutcome`]; the dispatcher collects them
//! in queue order and [`RunReport`] folds them into counts, a human-readable
//! summary, an optional JSON export and the process exit status.

mod outcome;
mod run;

pub use outcome::{FailureKind, JobOutcome, Outcome, OutcomeStatus, SkipReason};
pub use run::{RunCounts, RunReport, EXIT_FATAL, EXIT_JOB_FAILURES, EXIT_OK};
