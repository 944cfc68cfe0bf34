//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field carries a serde default so partial files load cleanly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Default encoder binary looked up in `PATH` when `encoder.path` is empty.
pub const DEFAULT_ENCODER_NAME: &str = "ffmpeg";

/// Default ffmpeg options; known to produce files TonUINO boxes play.
pub const DEFAULT_ENCODER_OPTIONS: &str = "-vsync 0 -codec:a libmp3lame -b:a 192K -vn -sn -dn";

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Map file and output locations.
    #[serde(default)]
    pub paths: PathSettings,

    /// External encoder invocation.
    #[serde(default)]
    pub encoder: EncoderSettings,

    /// Job planning and dispatch.
    #[serde(default)]
    pub jobs: JobSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        let ext = self.encoder.target_extension.trim();
        if ext.is_empty() {
            return Err("encoder.target_extension must not be empty".to_string());
        }
        if ext.contains(['.', '/', '\\']) {
            return Err(format!(
                "encoder.target_extension '{}' must be a bare extension such as 'mp3'",
                ext
            ));
        }
        if self.paths.mapfile.as_os_str().is_empty() {
            return Err("paths.mapfile must not be empty".to_string());
        }
        if self.paths.output_dir.as_os_str().is_empty() {
            return Err("paths.output_dir must not be empty".to_string());
        }
        if self.jobs.min_ordinal_width > 9 {
            return Err(format!(
                "jobs.min_ordinal_width {} is out of range (0-9)",
                self.jobs.min_ordinal_width
            ));
        }
        Ok(())
    }
}

/// Path configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Map file listing output names and their sources.
    #[serde(default = "default_mapfile")]
    pub mapfile: PathBuf,

    /// Output root; usually the mount point of the SD card.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_mapfile() -> PathBuf {
    PathBuf::from("map.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./out")
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            mapfile: default_mapfile(),
            output_dir: default_output_dir(),
        }
    }
}

/// External encoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Encoder executable. Empty means "search PATH for ffmpeg".
    #[serde(default)]
    pub path: String,

    /// Options applied to every encode job, split on whitespace.
    #[serde(default = "default_encoder_options")]
    pub options: String,

    /// Re-encode sources already in the target format.
    #[serde(default)]
    pub recode: bool,

    /// Canonical output extension, without the dot.
    #[serde(default = "default_target_extension")]
    pub target_extension: String,

    /// Per-invocation timeout in seconds (0 disables).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_encoder_options() -> String {
    DEFAULT_ENCODER_OPTIONS.to_string()
}

fn default_target_extension() -> String {
    "mp3".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            options: default_encoder_options(),
            recode: false,
            target_extension: default_target_extension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EncoderSettings {
    /// Options as individual arguments.
    pub fn option_args(&self) -> Vec<String> {
        self.options.split_whitespace().map(str::to_string).collect()
    }

    /// Timeout as a duration, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Target extension normalized to lowercase without a leading dot.
    pub fn normalized_extension(&self) -> String {
        self.target_extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase()
    }
}

/// Job planning and dispatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Parallel workers; 0 means one worker per job.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Replace existing output files instead of skipping them.
    #[serde(default)]
    pub overwrite: bool,

    /// Seconds in-flight jobs may keep running after a stop request.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Minimum zero-padded width of ordinals generated for directory entries.
    #[serde(default = "default_min_ordinal_width")]
    pub min_ordinal_width: usize,
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_min_ordinal_width() -> usize {
    1
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            overwrite: false,
            shutdown_grace_secs: default_shutdown_grace_secs(),
            min_ordinal_width: default_min_ordinal_width(),
        }
    }
}

impl JobSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional log file; empty disables file logging.
    #[serde(default)]
    pub log_file: String,

    /// Number of encoder stderr lines kept for failure details.
    #[serde(default = "default_error_tail")]
    pub error_tail: usize,
}

fn default_log_level() -> LogLevel {
    LogLevel::Error
}

fn default_error_tail() -> usize {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: String::new(),
            error_tail: default_error_tail(),
        }
    }
}

impl LoggingSettings {
    /// Log file path, if configured.
    pub fn log_file_path(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[encoder]"));
        assert!(toml.contains("[jobs]"));
        assert!(toml.contains("mapfile"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[paths]\noutput_dir = \"/media/sdcard\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.paths.output_dir, PathBuf::from("/media/sdcard"));
        assert_eq!(parsed.paths.mapfile, PathBuf::from("map.csv"));
        assert_eq!(parsed.encoder.options, DEFAULT_ENCODER_OPTIONS);
        assert_eq!(parsed.encoder.target_extension, "mp3");
        assert!(!parsed.jobs.overwrite);
        assert!(parsed.jobs.max_workers >= 1);
    }

    #[test]
    fn option_args_split_on_whitespace() {
        let encoder = EncoderSettings {
            options: "  -b:a   128K -vn ".to_string(),
            ..EncoderSettings::default()
        };
        assert_eq!(encoder.option_args(), vec!["-b:a", "128K", "-vn"]);
    }

    #[test]
    fn zero_timeout_disables() {
        let mut encoder = EncoderSettings::default();
        assert_eq!(encoder.timeout(), Some(Duration::from_secs(600)));
        encoder.timeout_secs = 0;
        assert_eq!(encoder.timeout(), None);
    }

    #[test]
    fn validate_rejects_bad_extension() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.encoder.target_extension = "".to_string();
        assert!(settings.validate().is_err());

        settings.encoder.target_extension = "mp3/x".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn filtergraph_options_are_accepted() {
        let mut settings = Settings::default();
        settings.encoder.options =
            "-filter_complex [0:a]volume=2[v];[v]aresample=44100[o] -map [o]".to_string();

        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.encoder.option_args(),
            vec![
                "-filter_complex",
                "[0:a]volume=2[v];[v]aresample=44100[o]",
                "-map",
                "[o]"
            ]
        );
    }

    #[test]
    fn extension_is_normalized() {
        let encoder = EncoderSettings {
            target_extension: ".MP3".to_string(),
            ..EncoderSettings::default()
        };
        // Leading dot is rejected by validate but tolerated here
        assert_eq!(encoder.normalized_extension(), "mp3");
    }

    #[test]
    fn empty_log_file_means_none() {
        let mut logging = LoggingSettings::default();
        assert!(logging.log_file_path().is_none());
        logging.log_file = "run.log".to_string();
        assert_eq!(logging.log_file_path(), Some(PathBuf::from("run.log")));
    }
}
