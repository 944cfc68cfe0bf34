//! One creatuino run: parse, resolve, plan, dispatch.
//!
//! Everything up to and including planning is side-effect free; a
//! `PrepError` from [`plan_only`] or [`run`] means nothing was written.

use std::fs;
use std::path::Path;

use chrono::Local;

use crate::config::{ConfigError, Settings};
use crate::dispatch::{probe_writable, CancelHandle, Dispatcher, DispatcherConfig, EncoderConfig};
use crate::errors::{PrepResult, StructuralError};
use crate::mapfile::load_map_file;
use crate::plan::{
    plan, resolve_all, EntryResolver, JobKind, JobQueue, PlannerConfig, ResolverConfig,
};
use crate::report::RunReport;

/// Parse the map file and build the job queue without touching the output.
pub fn plan_only(settings: &Settings) -> PrepResult<JobQueue> {
    settings.validate().map_err(ConfigError::Invalid)?;

    let mapfile = &settings.paths.mapfile;
    let entries = load_map_file(mapfile)?;

    let base_dir = match mapfile.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let resolver = EntryResolver::new(ResolverConfig::from_settings(settings, base_dir));
    let batches = resolve_all(&resolver, &entries);

    let queue = plan(
        batches,
        &PlannerConfig {
            output_root: settings.paths.output_dir.clone(),
            overwrite: settings.jobs.overwrite,
        },
    )?;
    Ok(queue)
}

/// Run the whole pipeline and report every job's outcome.
pub fn run(settings: &Settings, cancel: &CancelHandle) -> PrepResult<RunReport> {
    let queue = plan_only(settings)?;

    if queue.is_empty() {
        tracing::warn!("Map file produced no jobs; nothing to do");
        return Ok(RunReport::empty(Local::now()));
    }

    let output_root = &settings.paths.output_dir;
    if queue.runnable_count() > 0 {
        fs::create_dir_all(output_root).map_err(|source| {
            StructuralError::OutputRootUnwritable {
                path: output_root.clone(),
                source,
            }
        })?;
        probe_writable(output_root)?;
    } else {
        tracing::info!("Every output already exists; nothing to write");
    }

    let encoder = if queue.runnable_of_kind(JobKind::Encode) > 0 {
        let encoder = EncoderConfig::from_settings(&settings.encoder, settings.logging.error_tail)?;
        tracing::debug!("Using encoder {}", encoder.program.display());
        Some(encoder)
    } else {
        None
    };

    let dispatcher = Dispatcher::new(
        DispatcherConfig::from_settings(settings, output_root, encoder),
        cancel.clone(),
    );
    Ok(dispatcher.run(&queue)?)
}
