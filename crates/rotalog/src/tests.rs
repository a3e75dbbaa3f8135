//! End-to-end tests for the logger, its file sink and the global instance

#[cfg(test)]
mod integration_tests {
    use crate::{
        clock::ManualClock,
        config::{LoggerConfig, RetentionConfig},
        filters::ExcludeSelf,
        level::Severity,
        logger::Logger,
        retention::archive_path,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serial_test::serial;
    use std::io::{self, Write};
    use std::path::PathBuf;
    use std::sync::{Arc, Barrier, Mutex};
    use tempfile::TempDir;
    use tracing_subscriber::{layer::SubscriberExt, Layer};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 15, 0).unwrap()
    }

    fn files_in(dir: &std::path::Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_threshold_filters_console_output() {
        let console = Capture::default();
        let logger = Logger::with_clock(
            LoggerConfig::default(),
            Arc::new(ManualClock::new(start())),
        )
        .with_console(console.clone());
        logger.set_color_enabled(false);
        logger.set_level(Severity::Warn);

        crate::debug!(logger: &logger, "cache miss", "key-1");
        crate::info!(logger: &logger, "request served", 200);
        crate::warn!(logger: &logger, "slow response", 1530);
        crate::error!(logger: &logger, "upstream failed", "db", 3);

        let lines = console.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[WARN] "));
        assert!(lines[0].ends_with("slow response 1530"));
        assert!(lines[1].contains("[ERROR] "));
        assert!(lines[1].ends_with("upstream failed \"db\" 3"));
        assert!(lines[1].contains("tests.rs:"));
    }

    #[test]
    fn test_colored_console_tags() {
        let console = Capture::default();
        let logger = Logger::with_clock(
            LoggerConfig::default(),
            Arc::new(ManualClock::new(start())),
        )
        .with_console(console.clone());

        crate::error!(logger: &logger, "magenta");
        crate::fatal!(logger: &logger, "red");

        let lines = console.lines();
        assert!(lines[0].contains("\x1b[95m[ERROR]\x1b[0m"));
        assert!(lines[1].contains("\x1b[91m[FATAL]\x1b[0m"));
    }

    #[test]
    fn test_unserializable_argument_is_skipped() {
        struct Opaque;
        impl serde::Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("opaque"))
            }
        }

        let console = Capture::default();
        let logger = Logger::with_clock(
            LoggerConfig::default(),
            Arc::new(ManualClock::new(start())),
        )
        .with_console(console.clone());
        logger.set_include_location(false);

        crate::info!(logger: &logger, "mixed", 1, Opaque, "two");

        assert!(console.lines()[0].ends_with("mixed 1 \"two\""));
    }

    #[test]
    fn test_single_byte_in_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::with_clock(
            LoggerConfig::default(),
            Arc::new(ManualClock::new(start())),
        );

        let path = logger.set_output_file(temp_dir.path(), "app.log").unwrap();
        let mut sink = logger.sink();
        sink.write_all(b"x").unwrap();
        logger.flush();

        assert_eq!(files_in(temp_dir.path()), vec![path.clone()]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1);
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("app_2024"));
    }

    #[test]
    fn test_rotation_archives_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let logger = Logger::with_clock(LoggerConfig::default(), clock.clone());

        let first = logger.set_output_file(temp_dir.path(), "app.log").unwrap();
        crate::info!(logger: &logger, "before rotation");

        clock.advance(Duration::seconds(3601));
        crate::info!(logger: &logger, "after rotation");
        logger.flush();

        let second = logger.active_file().unwrap();
        assert_ne!(first, second);
        assert!(first.exists() || archive_path(&first).exists());
        assert!(std::fs::read_to_string(&second)
            .unwrap()
            .contains("after rotation"));
    }

    #[test]
    fn test_forced_rotation_within_hour_keeps_path() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::with_clock(
            LoggerConfig::default(),
            Arc::new(ManualClock::new(start())),
        );
        let first = logger.set_output_file(temp_dir.path(), "app.log").unwrap();

        logger.sink().lock().set_last_rotation(start().timestamp() - 3601);
        crate::warn!(logger: &logger, "forced");
        logger.flush();

        assert_eq!(logger.active_file(), Some(first.clone()));
        assert_eq!(logger.stats().rotations, 2);
        assert!(!archive_path(&first).exists());
    }

    #[test]
    fn test_concurrent_burst_rotates_once() {
        const THREADS: usize = 8;
        const PER_PHASE: usize = 100;

        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let logger = Arc::new(Logger::with_clock(LoggerConfig::default(), clock.clone()));
        logger.set_retention(RetentionConfig {
            compress_rotated: false,
            ..RetentionConfig::default()
        });
        logger.set_include_location(false);
        logger.set_output_file(temp_dir.path(), "app.log").unwrap();

        let phase_done = Arc::new(Barrier::new(THREADS + 1));
        let clock_moved = Arc::new(Barrier::new(THREADS + 1));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = logger.clone();
                let phase_done = phase_done.clone();
                let clock_moved = clock_moved.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_PHASE {
                        crate::info!(logger: &logger, "burst", t, i);
                    }
                    phase_done.wait();
                    clock_moved.wait();
                    for i in PER_PHASE..2 * PER_PHASE {
                        crate::info!(logger: &logger, "burst", t, i);
                    }
                })
            })
            .collect();

        phase_done.wait();
        clock.advance(Duration::seconds(3601));
        clock_moved.wait();

        for handle in handles {
            handle.join().unwrap();
        }
        logger.flush();

        // One rotation for the initial open, one for the hour change
        assert_eq!(logger.stats().rotations, 2);

        let files = files_in(temp_dir.path());
        assert_eq!(files.len(), 2);

        let mut total = 0;
        for file in &files {
            let content = std::fs::read_to_string(file).unwrap();
            for line in content.lines() {
                assert!(line.contains("[INFO] burst "), "torn line: {line}");
                total += 1;
            }
        }
        assert_eq!(total, THREADS * PER_PHASE * 2);
        assert_eq!(logger.stats().lines_written, (THREADS * PER_PHASE * 2) as u64);
    }

    #[test]
    fn test_tracing_events_share_the_sink() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::with_clock(
            LoggerConfig::default(),
            Arc::new(ManualClock::new(start())),
        );
        let path = logger.set_output_file(temp_dir.path(), "app.log").unwrap();

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(logger.sink())
            .with_ansi(false)
            .with_filter(ExcludeSelf::new());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(job = "reindex", "bridged event");
            crate::warn!(logger: &logger, "direct line");
        });
        logger.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("bridged event"));
        assert!(content.contains("[WARN] "));
        assert!(!content.contains("log_file_opened"));
    }

    #[test]
    fn test_unfiltered_tracing_layer_survives_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let logger = Arc::new(Logger::with_clock(LoggerConfig::default(), clock.clone()));
        logger.set_retention(RetentionConfig {
            compress_rotated: false,
            ..RetentionConfig::default()
        });

        let (tx, rx) = std::sync::mpsc::channel();
        let worker = {
            let logger = logger.clone();
            let temp_dir = temp_dir.path().to_path_buf();
            std::thread::spawn(move || {
                // rotalog's own rotation events reach this layer too
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(logger.sink())
                    .with_ansi(false);
                let subscriber = tracing_subscriber::registry().with(layer);

                tracing::subscriber::with_default(subscriber, || {
                    logger.set_output_file(&temp_dir, "app.log");
                    crate::info!(logger: &logger, "first hour");
                    clock.advance(Duration::seconds(3601));
                    crate::info!(logger: &logger, "second hour");
                    tracing::info!("host event");
                    logger.flush();
                });
                let _ = tx.send(());
            })
        };

        assert!(
            rx.recv_timeout(std::time::Duration::from_secs(10)).is_ok(),
            "logging thread blocked on the sink"
        );
        worker.join().unwrap();

        let active = logger.active_file().unwrap();
        let content = std::fs::read_to_string(active).unwrap();
        assert!(content.contains("second hour"));
        assert!(content.contains("host event"));
        assert_eq!(logger.stats().rotations, 2);
    }

    #[test]
    #[serial]
    fn test_global_logger_is_a_singleton() {
        let first = Logger::global();
        let second = Logger::global();
        assert!(std::ptr::eq(first, second));

        crate::debug!("global logger reached", 1);

        assert!(Logger::init_global(LoggerConfig::default()).is_err());
    }
}
