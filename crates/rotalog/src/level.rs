//! Severity levels and the level gate

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::Level;

/// Urgency of a log line, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Severity {
    #[default]
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    /// All severities, least urgent first
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Upper-case level name, e.g. `WARN`
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Bracketed tag written into the line prefix, e.g. `[WARN]`
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Debug => "[DEBUG]",
            Severity::Info => "[INFO]",
            Severity::Warn => "[WARN]",
            Severity::Error => "[ERROR]",
            Severity::Fatal => "[FATAL]",
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Returns true iff `candidate` is at least as urgent as `threshold`.
pub fn admit(candidate: Severity, threshold: Severity) -> bool {
    candidate >= threshold
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            other => Err(Error::Config {
                message: format!("Unknown log level '{}'", other),
            }),
        }
    }
}

impl From<Severity> for Level {
    fn from(level: Severity) -> Self {
        match level {
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warn => Level::WARN,
            Severity::Error | Severity::Fatal => Level::ERROR,
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        if level == Level::ERROR {
            Severity::Error
        } else if level == Level::WARN {
            Severity::Warn
        } else if level == Level::INFO {
            Severity::Info
        } else {
            Severity::Debug
        }
    }
}
