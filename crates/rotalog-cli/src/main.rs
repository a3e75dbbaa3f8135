use anyhow::Result;
use clap::{Parser, Subcommand};
use rotalog::{retention::sweep_expired, Logger, LoggerConfig, Severity};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n  ROTALOG_PROJECT_PATH    Project root; logs default to <root>/logs\n  ROTALOG_LOG_LEVEL       Minimum severity (debug, info, warn, error, fatal)\n  ROTALOG_LOG_DIR         Log directory\n  ROTALOG_LOG_FILE        Base log file name\n  ROTALOG_RETENTION_DAYS  Days to keep rotated files\n  RUST_LOG                Filter for rotalog's own diagnostics"
)]
struct Cli {
    /// Configuration file path
    #[arg(long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    /// Minimum severity to emit
    #[arg(long, help = "Set log level (debug, info, warn, error, fatal)")]
    log_level: Option<Severity>,

    /// Directory for log files
    #[arg(long, help = "Directory for log files")]
    log_dir: Option<PathBuf>,

    /// Base log file name; omit to log to the console
    #[arg(long, help = "Base file name, e.g. app.log")]
    log_file: Option<String>,

    /// Disable ANSI colors
    #[arg(long, help = "Disable colored level tags")]
    no_color: bool,

    /// Days to keep rotated files
    #[arg(long, help = "Retention horizon in days")]
    retention_days: Option<u32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit one line at every severity
    Emit {
        /// Message body
        #[arg(default_value = "sample message")]
        message: String,
    },
    /// Write lines from several threads at once
    Burst {
        #[arg(long, default_value_t = 4)]
        threads: usize,
        #[arg(long, default_value_t = 100)]
        lines: usize,
    },
    /// Delete expired rotated files now
    Sweep,
    /// Print the effective configuration as TOML
    ShowConfig,
}

/// Build the logger configuration from file, environment and CLI flags
async fn create_logger_config(cli: &Cli) -> Result<LoggerConfig> {
    let mut config = LoggerConfig::load(cli.config.as_deref()).await?;
    apply_cli_overrides(&mut config, cli);
    config.validate()?;

    info!(
        rotalog.event = "logger_config_created",
        level = %config.level,
        color = config.color_enabled,
        log_dir = %config.resolved_log_dir().display(),
        log_file = ?config.log_file_name,
        retention_days = config.retention.max_age_days,
        "Logger configuration created"
    );

    Ok(config)
}

fn apply_cli_overrides(config: &mut LoggerConfig, cli: &Cli) {
    if let Some(level) = cli.log_level {
        config.level = level;
    }
    if cli.no_color {
        config.color_enabled = false;
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    if let Some(name) = &cli.log_file {
        config.log_file_name = Some(name.clone()).filter(|n| !n.is_empty());
    }
    if let Some(days) = cli.retention_days {
        config.retention.max_age_days = days;
    }
}

fn emit_all(message: &str) {
    rotalog::debug!(message, "debug");
    rotalog::info!(message, "info");
    rotalog::warn!(message, "warn");
    rotalog::error!(message, "error");
    rotalog::fatal!(message, "fatal");
}

fn burst(threads: usize, lines: usize) {
    let logger = Logger::global();
    let done = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|thread| {
            let done = done.clone();
            std::thread::spawn(move || {
                for line in 0..lines {
                    rotalog::info!(logger: logger, "burst", thread, line);
                }
                done.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            warn!("A burst thread panicked");
        }
    }

    info!(
        threads = done.load(std::sync::atomic::Ordering::Relaxed),
        lines_per_thread = lines,
        "Burst finished"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before parsing configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Diagnostics from rotalog itself go to stderr, filtered by RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = create_logger_config(&cli).await.map_err(|e| {
        eprintln!("Failed to load logger configuration: {}", e);
        anyhow::anyhow!("Configuration failed: {}", e)
    })?;

    match cli.command.unwrap_or(Command::Emit {
        message: "sample message".to_string(),
    }) {
        Command::ShowConfig => {
            println!("{}", config.to_toml_string()?);
        }
        Command::Sweep => {
            let Some(name) = config.log_file_name.as_deref() else {
                anyhow::bail!("No log file name configured; pass --log-file");
            };
            let now = chrono::Local::now().naive_local();
            let removed = sweep_expired(
                &config.resolved_log_dir(),
                name,
                now,
                config.retention.max_age_days,
            );
            for path in &removed {
                println!("removed {}", path.display());
            }
        }
        Command::Emit { message } => {
            let _guard = Logger::init_global(config)?;
            emit_all(&message);
        }
        Command::Burst { threads, lines } => {
            let guard = Logger::init_global(config)?;
            burst(threads, lines);
            let stats = guard.logger().stats();
            println!(
                "written={} suppressed={} errors={} rotations={}",
                stats.lines_written, stats.lines_suppressed, stats.write_errors, stats.rotations
            );
        }
    }

    Ok(())
}
