//! The leveled logger and its process-wide instance

use crate::{
    clock::{Clock, SystemClock},
    config::{validate_file_name, LoggerConfig, RetentionConfig},
    format::{format_prefix, short_file},
    level::{admit, Severity},
    sink::{FileSink, SharedSink},
    Error, Result,
};
use chrono::Local;
use std::fmt;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// Source location of a logging call, captured by the logging macros
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", short_file(self.file), self.line)
    }
}

/// The five leveled entry points.
///
/// Implementors only provide [`enabled`](LevelLogger::enabled) and
/// [`log`](LevelLogger::log). None of the methods report errors to the caller.
pub trait LevelLogger {
    /// Whether a line at `level` would be emitted
    fn enabled(&self, level: Severity) -> bool;

    /// Emit `body` at `level`
    fn log(&self, level: Severity, site: Option<CallSite>, body: &str);

    fn debug(&self, site: Option<CallSite>, body: &str) {
        self.log(Severity::Debug, site, body)
    }

    fn info(&self, site: Option<CallSite>, body: &str) {
        self.log(Severity::Info, site, body)
    }

    fn warn(&self, site: Option<CallSite>, body: &str) {
        self.log(Severity::Warn, site, body)
    }

    fn error(&self, site: Option<CallSite>, body: &str) {
        self.log(Severity::Error, site, body)
    }

    fn fatal(&self, site: Option<CallSite>, body: &str) {
        self.log(Severity::Fatal, site, body)
    }
}

/// Logger statistics
#[derive(Debug, Clone, Default)]
pub struct LoggerStats {
    pub lines_written: u64,
    pub lines_suppressed: u64,
    pub write_errors: u64,
    pub rotations: u64,
    pub active_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    suppressed: AtomicU64,
    write_errors: AtomicU64,
}

/// Leveled logger writing to the console or to an hourly rotating file.
///
/// Configuration is read on every call and may be changed at any time from
/// any thread. File output goes through a single [`SharedSink`] lock, held for
/// the rotation check and the append of one whole line.
pub struct Logger {
    config: RwLock<LoggerConfig>,
    sink: SharedSink,
    console: Mutex<Box<dyn Write + Send>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

/// Tears down the global logger when dropped: flushes and closes the active
/// file and falls back to console output.
pub struct LoggerGuard {
    logger: &'static Logger,
}

impl LoggerGuard {
    pub fn logger(&self) -> &'static Logger {
        self.logger
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        self.logger.shutdown();
    }
}

impl Logger {
    /// Create a logger using wall-clock time. If the config names a log file,
    /// it is opened immediately.
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LoggerConfig, clock: Arc<dyn Clock>) -> Self {
        let sink = SharedSink::new(FileSink::new(clock.clone(), config.retention.clone()));
        let output = config
            .log_file_name
            .clone()
            .filter(|name| !name.is_empty())
            .map(|name| (config.resolved_log_dir(), name));

        let logger = Self {
            config: RwLock::new(config),
            sink,
            console: Mutex::new(Box::new(io::stderr())),
            clock,
            counters: Counters::default(),
        };

        if let Some((dir, name)) = output {
            let notices = {
                let mut sink = logger.sink.lock();
                sink.configure(dir, name);
                sink.take_notices()
            };
            logger.report_notices(notices);
        }

        logger
    }

    /// Replace the console destination (stderr by default)
    pub fn with_console<W>(self, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        *self.console.lock().unwrap_or_else(|e| e.into_inner()) = Box::new(writer);
        self
    }

    /// The process-wide logger, created on first use from the default
    /// configuration plus environment overrides.
    pub fn global() -> &'static Logger {
        GLOBAL.get_or_init(|| {
            let mut config = LoggerConfig::default();
            config.load_env_overrides();
            Logger::new(config)
        })
    }

    /// Install the process-wide logger with `config`.
    ///
    /// Fails if the global logger already exists, including when an earlier
    /// logging call created it with defaults.
    pub fn init_global(config: LoggerConfig) -> Result<LoggerGuard> {
        config.validate()?;

        let mut installed = false;
        let logger = GLOBAL.get_or_init(|| {
            installed = true;
            Logger::new(config)
        });

        if !installed {
            return Err(Error::System {
                message: "Global logger is already initialized".to_string(),
            });
        }

        debug!(
            rotalog.event = "global_logger_initialized",
            version = env!("CARGO_PKG_VERSION"),
            "Global logger initialized"
        );

        Ok(LoggerGuard { logger })
    }

    fn read_config(&self) -> RwLockReadGuard<'_, LoggerConfig> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, LoggerConfig> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> LoggerConfig {
        self.read_config().clone()
    }

    pub fn set_level(&self, level: Severity) {
        self.write_config().level = level;
    }

    pub fn level(&self) -> Severity {
        self.read_config().level
    }

    pub fn set_color_enabled(&self, enabled: bool) {
        self.write_config().color_enabled = enabled;
    }

    pub fn color_enabled(&self) -> bool {
        self.read_config().color_enabled
    }

    pub fn set_include_location(&self, include: bool) {
        self.write_config().include_location = include;
    }

    pub fn set_retention(&self, retention: RetentionConfig) {
        self.write_config().retention = retention.clone();
        self.sink.lock().set_retention(retention);
    }

    /// Send output to hourly files named after `name` inside `dir`, opening
    /// the file for the current hour right away.
    ///
    /// An empty `dir` means the default log directory; an empty `name` means
    /// console output. Colors are switched off, since escape codes do not
    /// belong in files; call [`set_color_enabled`](Self::set_color_enabled)
    /// afterwards to keep them. Returns the opened file, or `None` if it could
    /// not be opened (output is then dropped until the next rotation succeeds).
    ///
    /// A name that would leave `dir` (absolute, or containing `..`) is
    /// rejected and the current output is kept.
    pub fn set_output_file(&self, dir: impl AsRef<Path>, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            self.clear_output_file();
            return None;
        }

        if let Err(e) = validate_file_name(name) {
            warn!(
                rotalog.event = "output_file_rejected",
                name = name,
                error = %e,
                "Rejected log file name"
            );
            self.report_notices(vec![e.to_string()]);
            return None;
        }

        let dir = dir.as_ref();
        let dir = if dir.as_os_str().is_empty() {
            LoggerConfig::default_log_dir()
        } else {
            dir.to_path_buf()
        };

        {
            let mut config = self.write_config();
            config.log_dir = Some(dir.clone());
            config.log_file_name = Some(name.to_string());
            config.color_enabled = false;
        }

        let (opened, notices) = {
            let mut sink = self.sink.lock();
            let opened = sink.configure(dir, name.to_string());
            (opened, sink.take_notices())
        };
        self.report_notices(notices);
        opened
    }

    /// Close the log file and go back to console output
    pub fn clear_output_file(&self) {
        self.write_config().log_file_name = None;
        self.sink.lock().clear();
    }

    /// Path of the file currently written to
    pub fn active_file(&self) -> Option<PathBuf> {
        self.sink.lock().active_path().map(Path::to_path_buf)
    }

    /// Handle to the underlying rotating sink, e.g. to back a
    /// `tracing_subscriber` fmt layer with the same files
    pub fn sink(&self) -> SharedSink {
        self.sink.clone()
    }

    pub fn flush(&self) {
        let result = self.sink.lock().flush();
        if let Err(e) = result {
            debug!(rotalog.event = "flush_failed", error = %e, "Failed to flush log file");
        }
        let _ = self.console.lock().unwrap_or_else(|e| e.into_inner()).flush();
    }

    /// Flush, close the log file and return to console output
    pub fn shutdown(&self) {
        self.flush();
        self.clear_output_file();
    }

    pub fn stats(&self) -> LoggerStats {
        let sink = self.sink.lock();
        LoggerStats {
            lines_written: self.counters.written.load(Ordering::Relaxed),
            lines_suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            rotations: sink.rotations(),
            active_file: sink.active_path().map(Path::to_path_buf),
        }
    }

    fn render_line(&self, level: Severity, site: Option<CallSite>, body: &str) -> Option<String> {
        let (color_enabled, include_location) = {
            let config = self.read_config();
            if !admit(level, config.level) {
                return None;
            }
            (config.color_enabled, config.include_location)
        };

        let now = self.clock.now().with_timezone(&Local).naive_local();
        let mut line = format_prefix(level.tag(), level, color_enabled, now);
        if include_location {
            if let Some(site) = site {
                let _ = write!(line, "{}: ", site);
            }
        }
        line.push_str(body);
        line.push('\n');
        Some(line)
    }

    /// Write rotation failure notices to the console, which stays usable when
    /// the log file is not
    fn report_notices(&self, notices: Vec<String>) {
        if notices.is_empty() {
            return;
        }

        let color_enabled = self.color_enabled();
        let now = self.clock.now().with_timezone(&Local).naive_local();
        let mut console = self.console.lock().unwrap_or_else(|e| e.into_inner());
        for notice in notices {
            let mut line = format_prefix(Severity::Error.tag(), Severity::Error, color_enabled, now);
            line.push_str("rotalog: ");
            line.push_str(&notice);
            line.push('\n');
            let _ = console.write_all(line.as_bytes());
        }
    }

    fn emit(&self, bytes: &[u8]) -> io::Result<usize> {
        let (to_file, notices) = {
            let mut sink = self.sink.lock();
            if sink.is_configured() {
                let result = sink.write(bytes);
                (Some(result), sink.take_notices())
            } else {
                (None, Vec::new())
            }
        };
        self.report_notices(notices);

        match to_file {
            Some(result) => result,
            None => {
                let mut console = self.console.lock().unwrap_or_else(|e| e.into_inner());
                console.write_all(bytes).map(|_| bytes.len())
            }
        }
    }
}

impl LevelLogger for Logger {
    fn enabled(&self, level: Severity) -> bool {
        admit(level, self.level())
    }

    fn log(&self, level: Severity, site: Option<CallSite>, body: &str) {
        let Some(line) = self.render_line(level, site, body) else {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match self.emit(line.as_bytes()) {
            Ok(_) => {
                self.counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                debug!(
                    rotalog.event = "write_failed",
                    level = %level,
                    error = %e,
                    "Failed to write log line"
                );
            }
        }
    }
}
