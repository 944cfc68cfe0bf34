//! External encoder invocation.

use std::collections::VecDeque;
use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::cancel::CancelHandle;
use crate::config::{EncoderSettings, DEFAULT_ENCODER_NAME};
use crate::errors::{JobError, StructuralError};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Resolved encoder configuration used by every encode job.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Executable to run.
    pub program: PathBuf,
    /// Options inserted between the input and the output path.
    pub options: Vec<String>,
    /// Per-invocation timeout; `None` disables it.
    pub timeout: Option<Duration>,
    /// Stderr lines kept for failure details.
    pub error_tail: usize,
}

impl EncoderConfig {
    /// Build from settings, locating the executable.
    pub fn from_settings(
        settings: &EncoderSettings,
        error_tail: usize,
    ) -> Result<Self, StructuralError> {
        Ok(Self {
            program: locate_encoder(&settings.path)?,
            options: settings.option_args(),
            timeout: settings.timeout(),
            error_tail,
        })
    }

    /// Arguments for one invocation.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
            "-i".into(),
            input.into(),
        ];
        args.extend(self.options.iter().map(OsString::from));
        args.push(output.into());
        args
    }
}

/// Find the encoder executable.
///
/// An explicit path is used as given; an empty one searches `PATH` for
/// `ffmpeg`.
pub fn locate_encoder(configured: &str) -> Result<PathBuf, StructuralError> {
    let configured = configured.trim();
    if !configured.is_empty() {
        return Ok(PathBuf::from(configured));
    }

    find_in_path(DEFAULT_ENCODER_NAME).ok_or_else(|| StructuralError::EncoderNotFound {
        name: DEFAULT_ENCODER_NAME.to_string(),
    })
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Controls that can stop a running encoder early.
pub(crate) struct RunLimits<'a> {
    pub cancel: &'a CancelHandle,
    pub shutdown_grace: Duration,
}

/// Run the encoder for one job, writing to `output`.
///
/// Returns once the process has exited successfully; any other end
/// (non-zero exit, signal, timeout, cancellation) is a `JobError`.
pub(crate) fn run_encoder(
    config: &EncoderConfig,
    input: &Path,
    output: &Path,
    limits: &RunLimits<'_>,
) -> Result<(), JobError> {
    let stderr_file = tempfile::tempfile()
        .map_err(|e| JobError::io("creating stderr capture for", output, e))?;
    let stderr_writer = stderr_file
        .try_clone()
        .map_err(|e| JobError::io("creating stderr capture for", output, e))?;

    let mut cmd = Command::new(&config.program);
    cmd.args(config.args(input, output))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_writer));

    tracing::debug!("Running encoder: {:?}", cmd);

    let mut child = cmd.spawn().map_err(|source| JobError::Spawn {
        encoder: config.program.clone(),
        source,
    })?;

    let status = wait_with_limits(&mut child, &config.program, config.timeout, limits)?;
    if status.success() {
        return Ok(());
    }

    Err(JobError::EncoderFailed {
        status: status.to_string(),
        stderr_tail: read_tail(stderr_file, config.error_tail),
    })
}

fn wait_with_limits(
    child: &mut Child,
    program: &Path,
    timeout: Option<Duration>,
    limits: &RunLimits<'_>,
) -> Result<ExitStatus, JobError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                terminate(child);
                return Err(JobError::io("waiting for", program, e));
            }
        }

        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                tracing::warn!("Encoder exceeded {}s timeout, terminating", timeout.as_secs());
                terminate(child);
                return Err(JobError::TimedOut { timeout });
            }
        }

        if limits.cancel.grace_expired(limits.shutdown_grace) {
            tracing::warn!("Shutdown grace period over, terminating encoder");
            terminate(child);
            return Err(JobError::Cancelled);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("Failed to kill encoder: {}", e);
    }
    // Reap so no zombie outlives the job
    let _ = child.wait();
}

/// Last `max_lines` non-empty lines of the captured stderr.
fn read_tail(mut file: File, max_lines: usize) -> Vec<String> {
    if max_lines == 0 || file.seek(SeekFrom::Start(0)).is_err() {
        return Vec::new();
    }

    let mut tail = VecDeque::with_capacity(max_lines);
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if tail.len() == max_lines {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
    tail.into_iter().collect()
}
