//! Hourly rotation policy and rotated file naming

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Minimum age of the active file, in seconds, before the next write rotates it
pub const ROTATION_INTERVAL_SECS: i64 = 3600;

/// Extension used when the configured file name has none
pub const DEFAULT_EXTENSION: &str = "log";

/// Extension appended to archived (compressed) files
pub const ARCHIVE_EXTENSION: &str = "gz";

/// True once at least one rotation interval has passed since `last_rotation`.
/// Both arguments are Unix timestamps in seconds.
pub fn should_rotate(now: i64, last_rotation: i64) -> bool {
    now.saturating_sub(last_rotation) >= ROTATION_INTERVAL_SECS
}

/// Path of the file active during the hour containing `now`:
/// `<dir>/<name-dirs>/<stem>_YYYYMMDD_HH.<ext>`.
///
/// Every writer within the same hour resolves to the same path, so reopening
/// appends instead of truncating.
pub fn next_file_name(base_dir: &Path, base_name: &str, now: NaiveDateTime) -> PathBuf {
    let name = RotatedName::parse(base_name);
    name.directory(base_dir).join(format!(
        "{}_{}.{}",
        name.stem,
        now.format("%Y%m%d_%H"),
        name.extension
    ))
}

/// A configured file name split into the pieces rotated names are built from.
///
/// `"app.log"` has stem `app` and extension `log`; `"audit/app"` places the
/// files under an `audit` subdirectory with the default extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedName {
    pub parent: Option<PathBuf>,
    pub stem: String,
    pub extension: String,
}

impl RotatedName {
    pub fn parse(base_name: &str) -> Self {
        let path = Path::new(base_name);

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| base_name.to_string());

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        Self {
            parent,
            stem,
            extension,
        }
    }

    /// Directory that holds the rotated files for this name
    pub fn directory(&self, base_dir: &Path) -> PathBuf {
        match &self.parent {
            Some(parent) => base_dir.join(parent),
            None => base_dir.to_path_buf(),
        }
    }

    /// Matcher for rotated (and archived) file names of this stem
    pub fn matcher(&self) -> Result<RotatedNameMatcher> {
        RotatedNameMatcher::new(&self.stem, &self.extension)
    }
}

/// Recognizes `<stem>_YYYYMMDD_HH.<ext>` with an optional `.gz` suffix.
#[derive(Debug, Clone)]
pub struct RotatedNameMatcher {
    pattern: Regex,
}

impl RotatedNameMatcher {
    pub fn new(stem: &str, extension: &str) -> Result<Self> {
        let pattern = format!(
            r"^{}_(\d{{4}})(\d{{2}})(\d{{2}})_(\d{{2}})\.{}(\.{})?$",
            regex::escape(stem),
            regex::escape(extension),
            ARCHIVE_EXTENSION
        );
        let pattern = Regex::new(&pattern).map_err(|e| Error::Config {
            message: format!("Invalid log file name '{}.{}': {}", stem, extension, e),
        })?;
        Ok(Self { pattern })
    }

    /// Hour stamp embedded in `file_name`, if it is one of ours
    pub fn stamp(&self, file_name: &str) -> Option<NaiveDateTime> {
        let caps = self.pattern.captures(file_name)?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let year = i32::try_from(field(1)?).ok()?;
        NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?.and_hms_opt(field(4)?, 0, 0)
    }

    pub fn is_archive(&self, file_name: &str) -> bool {
        self.pattern
            .captures(file_name)
            .map(|caps| caps.get(5).is_some())
            .unwrap_or(false)
    }
}

/// Parse the hour stamp out of a rotated or archived file name.
pub fn parse_rotated_stamp(file_name: &str, stem: &str, extension: &str) -> Option<NaiveDateTime> {
    RotatedNameMatcher::new(stem, extension)
        .ok()?
        .stamp(file_name)
}
