//! Logging types.

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    Info,
    /// Warnings.
    Warn,
    /// Errors only.
    #[default]
    Error,
}

impl LogLevel {
    /// Resolve the level from the number of `-v` flags.
    ///
    /// 0 → error, 1 → warn, 2 → info, 3 or more → debug.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    /// Filter directive understood by `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Error);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Warn);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(3), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(9), LogLevel::Debug);
    }

    #[test]
    fn level_serializes_lowercase() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }
        let text = toml::to_string(&Wrapper {
            level: LogLevel::Warn,
        })
        .unwrap();
        assert!(text.contains("level = \"warn\""));
        let parsed: Wrapper = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Debug);
    }
}
