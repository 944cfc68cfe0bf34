//! Validation and ordering of resolved jobs into the final queue.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::types::{Disposition, Job, JobKind, JobQueue, PlannedJob};
use crate::errors::{PlanError, PlanIssue};

/// Settings the planner needs.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Output root that destinations are relative to.
    pub output_root: PathBuf,
    /// When false, jobs whose destination already exists are pre-skipped.
    pub overwrite: bool,
}

/// Build the job queue from per-entry resolution results.
///
/// Every issue is collected before failing, so the caller sees all
/// problems at once. Nothing is written to disk.
pub fn plan(
    batches: Vec<Result<Vec<Job>, PlanIssue>>,
    config: &PlannerConfig,
) -> Result<JobQueue, PlanError> {
    let mut issues = Vec::new();
    let mut jobs = Vec::new();

    for batch in batches {
        match batch {
            Ok(batch_jobs) => jobs.extend(batch_jobs),
            Err(issue) => issues.push(issue),
        }
    }

    jobs.sort_by_key(|j| j.sequence_index);

    issues.extend(find_duplicates(&jobs));
    issues.extend(find_conflicts(&jobs));

    if !issues.is_empty() {
        let err = PlanError::new(issues);
        tracing::error!("{}", err);
        return Err(err);
    }

    let planned: Vec<PlannedJob> = jobs
        .into_iter()
        .map(|job| {
            let exists = config.output_root.join(&job.dest_path).is_file();
            let disposition = if !config.overwrite && exists {
                tracing::debug!("Skipping {}: output already exists", job.dest_path.display());
                Disposition::SkipExisting
            } else {
                Disposition::Run
            };
            PlannedJob {
                job: Arc::new(job),
                disposition,
            }
        })
        .collect();

    let queue = JobQueue::from_sorted(planned);
    tracing::info!(
        "Planned {} job(s): {} encode, {} copy, {} already present",
        queue.len(),
        queue.runnable_of_kind(JobKind::Encode),
        queue.runnable_of_kind(JobKind::Copy),
        queue.pre_skipped_count()
    );
    Ok(queue)
}

/// Case-folded key; FAT file systems treat names case-insensitively.
fn fold(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Every pair of jobs that target the same destination.
fn find_duplicates(jobs: &[Job]) -> Vec<PlanIssue> {
    let mut groups: HashMap<String, Vec<&Job>> = HashMap::new();
    let mut order = Vec::new();
    for job in jobs {
        let key = fold(&job.dest_path);
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(job);
    }

    let mut issues = Vec::new();
    for key in order {
        let group = &groups[&key];
        for (i, first) in group.iter().enumerate() {
            for second in &group[i + 1..] {
                issues.push(PlanIssue::DuplicateDestination {
                    dest: second.dest_path.clone(),
                    first_line: first.map_line,
                    second_line: second.map_line,
                });
            }
        }
    }
    issues
}

/// Destinations that are also used as a parent directory of another one.
fn find_conflicts(jobs: &[Job]) -> Vec<PlanIssue> {
    let mut files: HashMap<String, &Job> = HashMap::new();
    for job in jobs {
        files.entry(fold(&job.dest_path)).or_insert(job);
    }

    let mut issues = Vec::new();
    for job in jobs {
        for ancestor in job.dest_path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            if let Some(file_job) = files.get(&fold(ancestor)) {
                issues.push(PlanIssue::DestinationConflict {
                    file_dest: file_job.dest_path.clone(),
                    file_line: file_job.map_line,
                    nested_dest: job.dest_path.clone(),
                    nested_line: job.map_line,
                });
            }
        }
    }
    issues
}
