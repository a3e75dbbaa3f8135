//! Benchmarks for the per-line cost of the logger
//!
//! Covers the level gate, prefix formatting, suppressed calls and appends to
//! a rotating file.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rotalog::{
    format::format_prefix, level::admit, Logger, LoggerConfig, RetentionConfig, Severity,
};
use tempfile::TempDir;

fn bench_level_gate(c: &mut Criterion) {
    c.bench_function("admit", |b| {
        b.iter(|| {
            for level in Severity::ALL {
                black_box(admit(black_box(level), Severity::Warn));
            }
        })
    });
}

fn bench_prefix(c: &mut Criterion) {
    let now = NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|d| d.and_hms_micro_opt(9, 15, 0, 123_456))
        .unwrap();

    let mut group = c.benchmark_group("format_prefix");
    for color in [false, true] {
        group.bench_with_input(BenchmarkId::new("color", color), &color, |b, &color| {
            b.iter(|| black_box(format_prefix("[INFO]", Severity::Info, color, black_box(now))))
        });
    }
    group.finish();
}

fn bench_suppressed(c: &mut Criterion) {
    let logger = Logger::new(LoggerConfig::default());
    logger.set_level(Severity::Error);

    c.bench_function("suppressed_debug", |b| {
        b.iter(|| rotalog::debug!(logger: &logger, "never rendered", black_box(42), "arg"))
    });
}

fn bench_file_append(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new(LoggerConfig::default());
    logger.set_retention(RetentionConfig {
        compress_rotated: false,
        ..RetentionConfig::default()
    });
    logger.set_output_file(temp_dir.path(), "bench.log");

    let mut group = c.benchmark_group("file_append");
    for args in [0usize, 4] {
        group.bench_with_input(BenchmarkId::new("args", args), &args, |b, &args| {
            b.iter(|| {
                if args == 0 {
                    rotalog::info!(logger: &logger, "request served");
                } else {
                    rotalog::info!(logger: &logger, "request served", 200, "GET", "/health", 1.5);
                }
            })
        });
    }
    group.finish();

    logger.shutdown();
}

criterion_group!(
    benches,
    bench_level_gate,
    bench_prefix,
    bench_suppressed,
    bench_file_append
);
criterion_main!(benches);
