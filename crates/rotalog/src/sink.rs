//! Hourly rotating file sink

use crate::{
    clock::Clock,
    config::RetentionConfig,
    retention::{spawn_housekeeping, ArchiveJob},
    rotation::{next_file_name, should_rotate},
};
use chrono::{DateTime, Local, Utc};
use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::MakeWriter;

/// How many times opening a new log file is attempted before giving up
pub const MAX_OPEN_ATTEMPTS: usize = 10;

/// Failure notices kept until the logger drains them
const MAX_PENDING_NOTICES: usize = 8;

thread_local! {
    // Set while this thread holds a sink lock
    static SINK_HELD: Cell<bool> = const { Cell::new(false) };
}

/// Where rotated files are created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub dir: PathBuf,
    pub base_name: String,
}

struct ActiveFile {
    path: PathBuf,
    file: File,
}

/// Owns the active log file and rotates it lazily, on the first write after
/// the rotation interval has elapsed.
///
/// Without a target every write is discarded and reported as successful; the
/// logger sends lines to the console in that case. I/O faults while rotating
/// are logged and degrade to dropping output, never to an error.
pub struct FileSink {
    target: Option<FileTarget>,
    active: Option<ActiveFile>,
    last_rotation: i64,
    rotations: u64,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
    notices: Vec<String>,
}

impl FileSink {
    pub fn new(clock: Arc<dyn Clock>, retention: RetentionConfig) -> Self {
        Self {
            target: None,
            active: None,
            last_rotation: 0,
            rotations: 0,
            clock,
            retention,
            notices: Vec::new(),
        }
    }

    /// Point the sink at `dir/base_name` and open the file for the current
    /// hour right away. Returns the opened path, if opening succeeded.
    pub fn configure(&mut self, dir: PathBuf, base_name: String) -> Option<PathBuf> {
        self.target = Some(FileTarget { dir, base_name });
        let now = self.clock.now();
        self.rotate(now);
        self.active_path().map(Path::to_path_buf)
    }

    /// Close the active file and stop writing to files
    pub fn clear(&mut self) {
        self.close();
        self.target = None;
    }

    /// Flush and close the active file. The target is kept, so the next write
    /// once the interval has elapsed reopens a file.
    pub fn close(&mut self) {
        if let Some(previous) = self.active.take() {
            retire(previous);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&FileTarget> {
        self.target.as_ref()
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Unix time, in seconds, of the last rotation attempt
    pub fn last_rotation(&self) -> i64 {
        self.last_rotation
    }

    pub fn set_last_rotation(&mut self, epoch_seconds: i64) {
        self.last_rotation = epoch_seconds;
    }

    /// Number of times a new file handle has been swapped in
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn set_retention(&mut self, retention: RetentionConfig) {
        self.retention = retention;
    }

    /// Take the one-line descriptions of rotation failures recorded since the
    /// last call
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn notice(&mut self, message: String) {
        if self.notices.len() < MAX_PENDING_NOTICES {
            self.notices.push(message);
        }
    }

    /// Append `buf` to the active file, rotating first if due.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.target.is_none() {
            return Ok(buf.len());
        }

        let now = self.clock.now();
        if should_rotate(now.timestamp(), self.last_rotation) {
            self.rotate(now);
        }

        match self.active.as_mut() {
            Some(active) => {
                active.file.write_all(buf)?;
                Ok(buf.len())
            }
            None => Ok(buf.len()),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(active) = self.active.as_mut() {
            active.file.flush()?;
        }
        Ok(())
    }

    /// Swap in the file for the hour containing `now`.
    ///
    /// `last_rotation` moves to `now` even when this fails, so a broken
    /// directory is retried once per interval rather than on every write.
    fn rotate(&mut self, now: DateTime<Utc>) {
        self.last_rotation = now.timestamp();

        let Some(target) = self.target.clone() else {
            return;
        };

        let local_now = now.with_timezone(&Local).naive_local();
        let path = next_file_name(&target.dir, &target.base_name, local_now);

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!(
                    rotalog.event = "log_dir_create_failed",
                    dir = %parent.display(),
                    error = %e,
                    "Failed to create log directory; keeping the current file"
                );
                self.notice(format!(
                    "cannot create log directory {}: {}",
                    parent.display(),
                    e
                ));
                return;
            }
        }

        let Some(file) = open_with_retry(&path) else {
            self.notice(format!(
                "cannot open log file {}; output is dropped until the next rotation",
                path.display()
            ));
            if let Some(previous) = self.active.take() {
                retire(previous);
            }
            return;
        };

        let previous = self.active.replace(ActiveFile {
            path: path.clone(),
            file,
        });
        self.rotations += 1;

        let superseded = previous.map(retire);

        info!(
            rotalog.event = "log_rotated",
            old_file = ?superseded,
            new_file = %path.display(),
            "Log file rotated"
        );

        if let Some(superseded) = superseded.filter(|p| *p != path) {
            let job = ArchiveJob {
                superseded,
                base_dir: target.dir,
                base_name: target.base_name,
                now: local_now,
                retention: self.retention.clone(),
            };
            spawn_housekeeping(move || {
                job.run();
            });
        }
    }
}

fn open_with_retry(path: &Path) -> Option<File> {
    let mut last_error = None;

    for attempt in 1..=MAX_OPEN_ATTEMPTS {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                debug!(
                    rotalog.event = "log_file_opened",
                    file_path = %path.display(),
                    attempt,
                    "Log file opened"
                );
                return Some(file);
            }
            Err(e) => last_error = Some(e),
        }
    }

    error!(
        rotalog.event = "log_file_open_failed",
        file_path = %path.display(),
        attempts = MAX_OPEN_ATTEMPTS,
        error = ?last_error,
        "Giving up on log file; output will be dropped"
    );
    None
}

/// Flush, sync and close a superseded file, returning its path
fn retire(active: ActiveFile) -> PathBuf {
    let ActiveFile { path, mut file } = active;

    if let Err(e) = file.flush().and_then(|_| file.sync_all()) {
        warn!(
            rotalog.event = "log_file_sync_failed",
            file_path = %path.display(),
            error = %e,
            "Failed to sync log file before closing"
        );
    }
    drop(file);

    path
}

/// A [`FileSink`] behind a mutex, shareable across threads.
///
/// Every call to [`io::Write::write`] holds the lock for the full
/// check-rotate-append sequence, so concurrent writers never interleave
/// within a buffer and never both rotate.
///
/// The sink reports rotation through `tracing` while locked. A write arriving
/// on the thread that holds the lock, e.g. from a fmt layer backed by this
/// sink, is discarded instead of waiting on the lock.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<FileSink>>,
}

impl SharedSink {
    pub fn new(sink: FileSink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Lock the sink. A poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> SinkGuard<'_> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let was_held = SINK_HELD.with(|held| held.replace(true));
        SinkGuard { guard, was_held }
    }

    /// Whether the calling thread is inside a locked sink section
    pub fn held_by_current_thread() -> bool {
        SINK_HELD.with(Cell::get)
    }
}

/// Exclusive access to a [`FileSink`], see [`SharedSink::lock`]
pub struct SinkGuard<'a> {
    guard: MutexGuard<'a, FileSink>,
    was_held: bool,
}

impl Deref for SinkGuard<'_> {
    type Target = FileSink;

    fn deref(&self) -> &FileSink {
        &self.guard
    }
}

impl DerefMut for SinkGuard<'_> {
    fn deref_mut(&mut self) -> &mut FileSink {
        &mut self.guard
    }
}

impl Drop for SinkGuard<'_> {
    fn drop(&mut self) {
        let was_held = self.was_held;
        SINK_HELD.with(|held| held.set(was_held));
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if Self::held_by_current_thread() {
            return Ok(buf.len());
        }
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if Self::held_by_current_thread() {
            return Ok(());
        }
        self.lock().flush()
    }
}

// Lets the rotating file back a tracing-subscriber fmt layer
impl<'a> MakeWriter<'a> for SharedSink {
    type Writer = SharedSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
