//! Error taxonomy for a creatuino run.
//!
//! Errors are split by how far they are allowed to propagate:
//! - `ParseError` / `PlanError`: fatal, raised before any side effect
//! - `JobError`: recovered per job and folded into its outcome
//! - `StructuralError`: fatal, the only kind allowed to abort a running queue

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// One line of a map file that could not be split into exactly two fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct MalformedMapLine {
    /// 1-based line number.
    pub line: usize,
    /// Why the line was rejected.
    pub reason: String,
}

impl MalformedMapLine {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Map file could not be turned into entries.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Map file not found: {}", .path.display())]
    MapFileNotFound { path: PathBuf },

    #[error("Failed to read map file {}: {source}", .path.display())]
    MapFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Map file {} has {} malformed line(s):\n{}",
        .path.display(),
        .lines.len(),
        bullet_list(.lines)
    )]
    MalformedLines {
        path: PathBuf,
        lines: Vec<MalformedMapLine>,
    },
}

/// A single reason the plan was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanIssue {
    #[error("line {line}: invalid input path '{}': {reason}", .path.display())]
    InvalidInputPath {
        line: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("line {line}: invalid output name '{name}': {reason}")]
    InvalidOutputName {
        line: usize,
        name: String,
        reason: String,
    },

    #[error(
        "duplicate destination '{}' (line {first_line} and line {second_line})",
        .dest.display()
    )]
    DuplicateDestination {
        dest: PathBuf,
        first_line: usize,
        second_line: usize,
    },

    #[error(
        "destination '{}' (line {file_line}) is also the parent directory of \
         '{}' (line {nested_line})",
        .file_dest.display(),
        .nested_dest.display()
    )]
    DestinationConflict {
        file_dest: PathBuf,
        file_line: usize,
        nested_dest: PathBuf,
        nested_line: usize,
    },
}

/// Planning failed; no job has been executed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Planning failed with {} issue(s):\n{}", .issues.len(), bullet_list(.issues))]
pub struct PlanError {
    pub issues: Vec<PlanIssue>,
}

impl PlanError {
    pub fn new(issues: Vec<PlanIssue>) -> Self {
        Self { issues }
    }

    /// Number of `DuplicateDestination` issues.
    pub fn duplicate_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, PlanIssue::DuplicateDestination { .. }))
            .count()
    }
}

/// Failure of a single job. Never propagates past the job's outcome.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("source file vanished: {}", .path.display())]
    SourceMissing { path: PathBuf },

    #[error("I/O error while {operation} '{}': {source}", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start encoder '{}': {source}", .encoder.display())]
    Spawn {
        encoder: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("encoder {status}{}", stderr_block(.stderr_tail))]
    EncoderFailed {
        status: String,
        stderr_tail: Vec<String>,
    },

    #[error("encoder timed out after {}s and was terminated", .timeout.as_secs())]
    TimedOut { timeout: Duration },

    #[error("cancelled while running; encoder terminated after shutdown grace period")]
    Cancelled,
}

impl JobError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

/// Failure affecting the whole run rather than one job.
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("Output root {} is not writable: {source}", .path.display())]
    OutputRootUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Encoder '{name}' not found in PATH; set encoder.path or pass --ffmpeg")]
    EncoderNotFound { name: String },

    #[error("Failed to start worker thread: {source}")]
    WorkerSpawn {
        #[source]
        source: io::Error,
    },
}

/// Any error that stops a run before or instead of producing a report.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Result type for run-level operations.
pub type PrepResult<T> = Result<T, PrepError>;

fn bullet_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  - {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn stderr_block(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!("; stderr tail:\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_lists_every_line() {
        let err = ParseError::MalformedLines {
            path: PathBuf::from("map.csv"),
            lines: vec![
                MalformedMapLine::new(2, "expected 2 fields, found 1"),
                MalformedMapLine::new(7, "expected 2 fields, found 3"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 malformed line(s)"));
        assert!(msg.contains("line 2: expected 2 fields, found 1"));
        assert!(msg.contains("line 7: expected 2 fields, found 3"));
    }

    #[test]
    fn plan_error_counts_duplicates() {
        let err = PlanError::new(vec![
            PlanIssue::DuplicateDestination {
                dest: PathBuf::from("01/1.mp3"),
                first_line: 1,
                second_line: 3,
            },
            PlanIssue::InvalidOutputName {
                line: 4,
                name: "/abs".to_string(),
                reason: "must be relative".to_string(),
            },
        ]);
        assert_eq!(err.duplicate_count(), 1);
        assert!(err.to_string().contains("line 1 and line 3"));
    }

    #[test]
    fn encoder_failure_includes_stderr_tail() {
        let err = JobError::EncoderFailed {
            status: "exit status: 1".to_string(),
            stderr_tail: vec!["Invalid data found when processing input".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("exit status: 1"));
        assert!(msg.contains("Invalid data found"));
    }
}
