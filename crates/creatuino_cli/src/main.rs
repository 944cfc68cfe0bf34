//! creatuino - command line entry point
//!
//! Handles everything that touches the process environment:
//! - Argument parsing and configuration loading
//! - Logging initialization
//! - Ctrl-C handling
//! - Exit status

use std::path::PathBuf;
use std::process::{self, ExitCode};
use std::thread;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use creatuino_core::config::{ConfigManager, Settings};
use creatuino_core::dispatch::CancelHandle;
use creatuino_core::logging::{init_tracing, LogLevel};
use creatuino_core::pipeline;
use creatuino_core::plan::JobQueue;
use creatuino_core::report::{EXIT_FATAL, EXIT_OK};

#[derive(Parser, Debug)]
#[command(name = "creatuino")]
#[command(about = "Build an SD card layout for TonUINO-style audio players", long_about = None)]
#[command(version)]
struct Cli {
    /// Overwrite existing output files
    #[arg(short = 'f', long)]
    overwrite: bool,

    /// Number of parallel encoder jobs (0 = one per job)
    #[arg(short = 'j', long = "parallel-jobs", value_name = "N")]
    parallel_jobs: Option<usize>,

    /// Map file with `output;input` lines
    #[arg(short, long, value_name = "PATH")]
    mapfile: Option<PathBuf>,

    /// Output root, usually the SD card mount point
    #[arg(short, long = "output-dir", value_name = "PATH")]
    output_dir: Option<PathBuf>,

    /// Re-encode files that are already in the target format
    #[arg(short, long)]
    recode: bool,

    /// Increase verbosity (-v warn, -vv info, -vvv debug)
    #[arg(short, action = ArgAction::Count)]
    verbose: u8,

    /// Encoder executable (default: ffmpeg from PATH)
    #[arg(long = "ffmpeg", value_name = "PATH")]
    ffmpeg: Option<String>,

    /// Options passed to every encoder invocation
    #[arg(long = "ffmpeg-options", value_name = "STR", allow_hyphen_values = true)]
    ffmpeg_options: Option<String>,

    /// Load settings from a TOML file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the effective settings to a TOML file and exit
    #[arg(long = "save-config", value_name = "PATH")]
    save_config: Option<PathBuf>,

    /// Plan and print the jobs without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Also write the run report as JSON
    #[arg(long = "report-json", value_name = "PATH")]
    report_json: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let settings = load_settings(&cli)?;

    let log_file = settings.logging.log_file_path();
    let _log_guard = init_tracing(settings.logging.level, log_file.as_deref())
        .context("Failed to initialize logging")?;
    tracing::debug!("creatuino {} starting", creatuino_core::version());

    if let Some(path) = &cli.save_config {
        ConfigManager::with_settings(path, settings)
            .save()
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
        println!("Saved settings to {}", path.display());
        return Ok(EXIT_OK);
    }

    if cli.dry_run {
        return Ok(match pipeline::plan_only(&settings) {
            Ok(queue) => {
                print_queue(&queue);
                EXIT_OK
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_FATAL
            }
        });
    }

    let cancel = CancelHandle::new();
    watch_interrupt(cancel.clone(), settings.jobs.shutdown_grace_secs)?;

    let report = match pipeline::run(&settings, &cancel) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_FATAL);
        }
    };

    print!("{}", report);

    if let Some(path) = &cli.report_json {
        if let Err(e) = report.write_json(path) {
            tracing::error!("Failed to write report to {}: {}", path.display(), e);
            eprintln!("Error: failed to write report to {}: {}", path.display(), e);
        }
    }

    Ok(report.exit_code())
}

/// Defaults, then the config file, then command-line flags.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => {
            let mut manager = ConfigManager::new(path);
            manager
                .load()
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            manager.into_settings()
        }
        None => Settings::default(),
    };

    if cli.overwrite {
        settings.jobs.overwrite = true;
    }
    if let Some(n) = cli.parallel_jobs {
        settings.jobs.max_workers = n;
    }
    if let Some(path) = &cli.mapfile {
        settings.paths.mapfile = path.clone();
    }
    if let Some(path) = &cli.output_dir {
        settings.paths.output_dir = path.clone();
    }
    if cli.recode {
        settings.encoder.recode = true;
    }
    if cli.verbose > 0 {
        settings.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    if let Some(path) = &cli.ffmpeg {
        settings.encoder.path = path.clone();
    }
    if let Some(options) = &cli.ffmpeg_options {
        settings.encoder.options = options.clone();
    }

    Ok(settings)
}

/// Cancel the run on Ctrl-C; a second Ctrl-C exits immediately.
///
/// The signal is awaited on a small current-thread runtime owned by a
/// helper thread; the workers themselves stay plain threads. Hidden
/// `.creatuino-*` temp files may be left behind by a forced exit.
fn watch_interrupt(cancel: CancelHandle, grace_secs: u64) -> Result<()> {
    thread::Builder::new()
        .name("creatuino-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };

            runtime.block_on(async {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                        return;
                    }
                    match on_interrupt(&cancel) {
                        Interrupt::Cancelled => tracing::warn!(
                            "Interrupted; no new jobs will start, running jobs get {}s \
                             (press Ctrl-C again to exit now)",
                            grace_secs
                        ),
                        Interrupt::ForceExit => {
                            tracing::error!("Interrupted again; exiting without waiting for jobs");
                            eprintln!("Error: interrupted");
                            process::exit(i32::from(EXIT_FATAL));
                        }
                    }
                }
            });
        })
        .context("Failed to start signal thread")?;
    Ok(())
}

/// What a Ctrl-C does at this point of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// First signal: stop claiming jobs, let running ones finish.
    Cancelled,
    /// Repeated signal: leave without waiting.
    ForceExit,
}

fn on_interrupt(cancel: &CancelHandle) -> Interrupt {
    if cancel.is_cancelled() {
        Interrupt::ForceExit
    } else {
        cancel.cancel();
        Interrupt::Cancelled
    }
}

fn print_queue(queue: &JobQueue) {
    for planned in queue.jobs() {
        let job = &planned.job;
        println!(
            "{:<6} {} -> {}{}",
            job.kind,
            job.source_path.display(),
            job.dest_path.display(),
            if planned.is_runnable() { "" } else { " (exists, skip)" }
        );
    }
    println!(
        "{} job(s): {} to run, {} already present",
        queue.len(),
        queue.runnable_count(),
        queue.pre_skipped_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "creatuino",
            "-f",
            "-j",
            "3",
            "-m",
            "cards.csv",
            "-o",
            "/media/sd",
            "-vv",
            "--ffmpeg-options",
            "-b:a 128K -vn",
        ]);
        let settings = load_settings(&cli).unwrap();

        assert!(settings.jobs.overwrite);
        assert_eq!(settings.jobs.max_workers, 3);
        assert_eq!(settings.paths.mapfile, PathBuf::from("cards.csv"));
        assert_eq!(settings.paths.output_dir, PathBuf::from("/media/sd"));
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.encoder.options, "-b:a 128K -vn");
        assert!(!settings.encoder.recode);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("creatuino.toml");
        std::fs::write(
            &config,
            "[jobs]\nmax_workers = 8\n\n[encoder]\nrecode = true\npath = \"/opt/ffmpeg\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "creatuino",
            "--config",
            config.to_str().unwrap(),
            "-j",
            "2",
        ]);
        let settings = load_settings(&cli).unwrap();

        assert_eq!(settings.jobs.max_workers, 2);
        assert!(settings.encoder.recode);
        assert_eq!(settings.encoder.path, "/opt/ffmpeg");
    }

    #[test]
    fn second_interrupt_forces_exit() {
        let cancel = CancelHandle::new();

        assert_eq!(on_interrupt(&cancel), Interrupt::Cancelled);
        assert!(cancel.is_cancelled());
        assert_eq!(on_interrupt(&cancel), Interrupt::ForceExit);
        assert_eq!(on_interrupt(&cancel), Interrupt::ForceExit);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["creatuino", "--config", "/nonexistent/creatuino.toml"]);
        assert!(load_settings(&cli).is_err());
    }
}
