//! Logger configuration and management

use crate::{level::Severity, Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Environment variable naming a project root; logs default to `<root>/logs`
pub const PROJECT_PATH_ENV: &str = "ROTALOG_PROJECT_PATH";

/// Directory used when neither the config nor the environment names one
pub const FALLBACK_LOG_DIR: &str = "./logs";

/// Main logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum severity that is emitted
    pub level: Severity,

    /// Decorate level tags with ANSI colors
    pub color_enabled: bool,

    /// Print `file:line:` of the call site before the message
    pub include_location: bool,

    /// Directory for log files. Falls back to `$ROTALOG_PROJECT_PATH/logs`,
    /// then `./logs`
    pub log_dir: Option<PathBuf>,

    /// Base file name, e.g. `app.log`. No name means console output.
    pub log_file_name: Option<String>,

    /// Archival and retention settings
    pub retention: RetentionConfig,
}

/// Archival and retention of rotated files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Rotated files older than this many days are deleted
    pub max_age_days: u32,

    /// Gzip each file once it has been rotated out
    pub compress_rotated: bool,

    /// Sweep expired files after each rotation
    pub sweep_on_rotate: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Severity::Debug,
            color_enabled: true,
            include_location: true,
            log_dir: None,
            log_file_name: None,
            retention: RetentionConfig::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 3,
            compress_rotated: true,
            sweep_on_rotate: true,
        }
    }
}

impl LoggerConfig {
    /// Load configuration from file or create default
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            toml::from_str(&content).map_err(|e| Error::Config {
                message: format!("Failed to parse logger config: {}", e),
            })?
        } else {
            Self::default()
        };

        config.load_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        // Ensure parent directory exists
        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = self.to_toml_string()?;
        tokio::fs::write(&config_file, content).await?;
        Ok(())
    }

    /// Render as pretty TOML, the format read by [`load`](Self::load)
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize logger config: {}", e),
        })
    }

    /// Load environment variable overrides
    pub fn load_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("ROTALOG_LOG_LEVEL") {
            self.level = level.parse().unwrap_or(self.level);
        }

        if let Ok(color) = std::env::var("ROTALOG_COLOR") {
            self.color_enabled = color.parse().unwrap_or(self.color_enabled);
        }

        if let Ok(dir) = std::env::var("ROTALOG_LOG_DIR") {
            if !dir.is_empty() {
                self.log_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(name) = std::env::var("ROTALOG_LOG_FILE") {
            self.log_file_name = Some(name).filter(|n| !n.is_empty());
        }

        if let Ok(days) = std::env::var("ROTALOG_RETENTION_DAYS") {
            self.retention.max_age_days = days.parse().unwrap_or(self.retention.max_age_days);
        }
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("com", "rotalog", "rotalog").ok_or_else(|| Error::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("rotalog.toml"))
    }

    /// Directory log files go to when none is configured explicitly
    pub fn default_log_dir() -> PathBuf {
        match std::env::var(PROJECT_PATH_ENV) {
            Ok(root) if !root.is_empty() => PathBuf::from(root).join("logs"),
            _ => PathBuf::from(FALLBACK_LOG_DIR),
        }
    }

    /// Configured log directory, or the default one
    pub fn resolved_log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => Self::default_log_dir(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retention.max_age_days == 0 {
            return Err(Error::Config {
                message: "max_age_days must be greater than 0".to_string(),
            });
        }

        if let Some(name) = &self.log_file_name {
            validate_file_name(name)?;
        }

        Ok(())
    }
}

/// Check that a base log file name stays inside the log directory: no
/// absolute path, no `..`, no trailing separator.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.ends_with('/') || name.ends_with('\\') {
        return Err(Error::Config {
            message: format!("log_file_name '{}' names a directory", name),
        });
    }

    let escapes = Path::new(name).components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    });
    if escapes {
        return Err(Error::Config {
            message: format!("log_file_name '{}' must be relative to log_dir", name),
        });
    }

    Ok(())
}
