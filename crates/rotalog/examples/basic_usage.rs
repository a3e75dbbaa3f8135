//! Basic rotalog usage example
//!
//! Logs to the console, then switches to hourly files under ./example_logs and
//! routes `tracing` events from the rest of the program into the same file.
//!
//! Run with: cargo run --example basic_usage

use rotalog::{filters::ExcludeSelf, Logger, LoggerConfig, RetentionConfig, Severity};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Serialize)]
struct Request<'a> {
    method: &'a str,
    path: &'a str,
    status: u16,
}

fn main() -> anyhow::Result<()> {
    let mut config = LoggerConfig::default();
    config.level = Severity::Info;
    config.retention = RetentionConfig {
        max_age_days: 7,
        ..RetentionConfig::default()
    };

    let guard = Logger::init_global(config)?;
    let logger = guard.logger();

    // Console output, colored
    rotalog::debug!("not shown at INFO");
    rotalog::info!("starting example", "v1", 3);
    rotalog::warn!("disk usage high", 91.5);

    // Switch to files; colors are turned off for file output
    let opened = logger.set_output_file("./example_logs", "example.log");
    println!("Writing to {:?}", opened);

    rotalog::info!(
        "request",
        Request {
            method: "GET",
            path: "/health",
            status: 200
        }
    );
    rotalog::error!("upstream timeout", "billing", 30_000);
    rotalog::fatal!("fatal lines do not stop the process");

    // Library code using `tracing` lands in the same rotating file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(logger.sink())
                .with_ansi(false)
                .with_filter(ExcludeSelf::new()),
        )
        .init();
    tracing::info!(component = "example", "tracing event routed to the log file");

    let stats = logger.stats();
    println!(
        "written={} suppressed={} rotations={} file={:?}",
        stats.lines_written, stats.lines_suppressed, stats.rotations, stats.active_file
    );

    // Dropping the guard flushes and closes the file
    drop(guard);
    Ok(())
}
