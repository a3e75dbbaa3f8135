//! Archival of rotated files and the retention sweep

use crate::{config::RetentionConfig, rotation::RotatedName, Error, Result};
use chrono::{Duration, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Delete rotated and archived files whose embedded hour stamp is strictly
/// older than `now - retention_days`. Returns the paths that were removed.
///
/// Failures on individual files are logged and skipped.
pub fn sweep_expired(
    base_dir: &Path,
    base_name: &str,
    now: NaiveDateTime,
    retention_days: u32,
) -> Vec<PathBuf> {
    let name = RotatedName::parse(base_name);
    let dir = name.directory(base_dir);
    let mut removed = Vec::new();

    if !dir.exists() {
        return removed;
    }

    let matcher = match name.matcher() {
        Ok(matcher) => matcher,
        Err(e) => {
            warn!(
                rotalog.event = "retention_sweep_skipped",
                base_name = base_name,
                error = %e,
                "Cannot match rotated files for this name"
            );
            return removed;
        }
    };

    // A horizon reaching past the calendar's start expires nothing
    let Some(cutoff) = Duration::try_days(i64::from(retention_days))
        .and_then(|horizon| now.checked_sub_signed(horizon))
    else {
        return removed;
    };

    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    rotalog.event = "retention_scan_failed",
                    dir = %dir.display(),
                    error = %e,
                    "Failed to read log directory entry"
                );
                continue;
            }
        };

        let Some(stamp) = entry.file_name().to_str().and_then(|n| matcher.stamp(n)) else {
            continue;
        };

        if stamp >= cutoff {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(
                    rotalog.event = "expired_file_removed",
                    file = %entry.path().display(),
                    "Removed expired log file"
                );
                removed.push(entry.path().to_path_buf());
            }
            Err(e) => {
                warn!(
                    rotalog.event = "file_removal_failed",
                    file = %entry.path().display(),
                    error = %e,
                    "Failed to remove expired log file"
                );
            }
        }
    }

    removed
}

/// Gzip `file_path` into `<file_path>.gz` and remove the original.
pub fn compress_file(file_path: &Path) -> Result<PathBuf> {
    let compressed_path = archive_path(file_path);

    let result = (|| -> io::Result<()> {
        let input_file = File::open(file_path)?;
        let output_file = File::create(&compressed_path)?;
        let mut encoder = GzEncoder::new(output_file, Compression::default());

        let mut reader = BufReader::new(input_file);
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        // Leave the original in place and drop any partial archive
        let _ = std::fs::remove_file(&compressed_path);
        return Err(Error::Retention {
            message: format!("Failed to compress {}: {}", file_path.display(), e),
        });
    }

    std::fs::remove_file(file_path)?;

    info!(
        rotalog.event = "log_compressed",
        original_file = %file_path.display(),
        compressed_file = %compressed_path.display(),
        "Log file compressed"
    );

    Ok(compressed_path)
}

/// `<path>.gz`
pub fn archive_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.as_os_str().to_owned();
    name.push(".");
    name.push(crate::rotation::ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

/// Post-rotation housekeeping for one superseded file
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    pub superseded: PathBuf,
    pub base_dir: PathBuf,
    pub base_name: String,
    pub now: NaiveDateTime,
    pub retention: RetentionConfig,
}

/// What a housekeeping run did
#[derive(Debug, Default)]
pub struct HousekeepingReport {
    pub archived: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl ArchiveJob {
    /// Compress the superseded file, then sweep expired files. Never fails;
    /// problems are logged.
    pub fn run(self) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();

        if self.retention.compress_rotated && self.superseded.exists() {
            match compress_file(&self.superseded) {
                Ok(path) => report.archived = Some(path),
                Err(e) => {
                    warn!(
                        rotalog.event = "compression_failed",
                        file = %self.superseded.display(),
                        error = %e,
                        "Failed to compress rotated log file"
                    );
                }
            }
        }

        if self.retention.sweep_on_rotate {
            report.removed = sweep_expired(
                &self.base_dir,
                &self.base_name,
                self.now,
                self.retention.max_age_days,
            );
        }

        debug!(
            rotalog.event = "housekeeping_completed",
            archived = report.archived.is_some(),
            removed = report.removed.len(),
            "Rotation housekeeping completed"
        );

        report
    }
}

/// Run `job` detached from the caller.
///
/// Uses the blocking pool of the current tokio runtime when there is one and
/// a dedicated thread otherwise. There is no ordering guarantee relative to
/// writes made after this call returns.
pub fn spawn_housekeeping<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn_blocking(job);
        return;
    }

    if let Err(e) = std::thread::Builder::new()
        .name("rotalog-housekeeping".to_string())
        .spawn(job)
    {
        warn!(
            rotalog.event = "housekeeping_spawn_failed",
            error = %e,
            "Failed to start housekeeping thread"
        );
    }
}
