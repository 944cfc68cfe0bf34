//! Config manager for loading and saving settings files.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Validation on load
//! - Generated files carry section comments

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;

use super::settings::Settings;

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages a settings file on disk.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Create a manager holding the given settings, e.g. for saving.
    pub fn with_settings(config_path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            config_path: config_path.into(),
            settings,
        }
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Consume the manager, returning its settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist or fails validation.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = parse_and_validate(&content)?;
        tracing::debug!("Loaded config from {}", self.config_path.display());
        Ok(())
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        self.settings.validate().map_err(ConfigError::Invalid)?;
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        tracing::info!("Saved config to {}", self.config_path.display());
        Ok(())
    }

    /// Generate config content with helpful comments.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();

        output.push_str("# creatuino configuration\n");
        output.push_str("# Command-line flags override values in this file.\n\n");

        push_section(
            &mut output,
            "Map file and output root (usually the SD card mount point)",
            "paths",
            &toml::to_string_pretty(&self.settings.paths)?,
        );
        push_section(
            &mut output,
            "External encoder; empty path searches PATH for ffmpeg",
            "encoder",
            &toml::to_string_pretty(&self.settings.encoder)?,
        );
        push_section(
            &mut output,
            "Job planning and dispatch; max_workers = 0 runs one worker per job",
            "jobs",
            &toml::to_string_pretty(&self.settings.jobs)?,
        );
        push_section(
            &mut output,
            "Logging configuration",
            "logging",
            &toml::to_string_pretty(&self.settings.logging)?,
        );

        Ok(output)
    }

    /// Write content to config file atomically.
    ///
    /// Writes to a temp file first, then renames.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn parse_and_validate(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.validate().map_err(ConfigError::Invalid)?;
    Ok(settings)
}

fn push_section(output: &mut String, comment: &str, table: &str, body: &str) {
    output.push_str(&format!("# {}\n", comment));
    output.push_str(&format!("[{}]\n", table));
    for line in body.lines() {
        output.push_str(line);
        output.push('\n');
    }
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("missing.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_applies_defaults_for_missing_sections() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("creatuino.toml");
        fs::write(
            &config_path,
            "[jobs]\nmax_workers = 3\noverwrite = true\n",
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load().unwrap();

        assert_eq!(manager.settings().jobs.max_workers, 3);
        assert!(manager.settings().jobs.overwrite);
        assert_eq!(manager.settings().encoder.target_extension, "mp3");
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("creatuino.toml");
        fs::write(&config_path, "[encoder]\ntarget_extension = \"\"\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        assert!(matches!(manager.load(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("creatuino.toml");

        let mut settings = Settings::default();
        settings.jobs.max_workers = 2;
        settings.encoder.recode = true;
        settings.paths.output_dir = PathBuf::from("/media/tonuino");

        ConfigManager::with_settings(&config_path, settings.clone())
            .save()
            .unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[encoder]"));
        assert!(content.contains("# creatuino configuration"));

        let mut manager = ConfigManager::new(&config_path);
        manager.load().unwrap();
        assert_eq!(manager.into_settings(), settings);
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("creatuino.toml");

        ConfigManager::new(&config_path).save().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(config_path.exists());
        assert!(!temp_path.exists());
    }
}
