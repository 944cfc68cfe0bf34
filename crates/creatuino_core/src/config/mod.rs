//! Configuration management for creatuino.
//!
//! This module provides:
//! - TOML-based settings with logical sections (`paths`, `encoder`, `jobs`, `logging`)
//! - Atomic file writes (write to temp, then rename)
//! - Validation on load with automatic defaults
//!
//! Settings are plain values: the CLI loads them once, applies its flags and
//! hands sub-sections to each component. Nothing in the core reads the
//! environment on its own.
//!
//! # Example
//!
//! ```no_run
//! use creatuino_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new("creatuino.toml");
//! config.load().unwrap();
//! println!("Output root: {}", config.settings().paths.output_dir.display());
//!
//! let mut settings = config.into_settings();
//! settings.jobs.overwrite = true;
//! ConfigManager::with_settings("creatuino.toml", settings).save().unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    EncoderSettings, JobSettings, LoggingSettings, PathSettings, Settings, DEFAULT_ENCODER_NAME,
    DEFAULT_ENCODER_OPTIONS,
};
