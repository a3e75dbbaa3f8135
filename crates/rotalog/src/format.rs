//! Line prefix formatting

use crate::level::Severity;
use chrono::NaiveDateTime;

/// Timestamp layout of every line prefix, microsecond precision
pub const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S%.6f]";

/// ANSI foreground colors used for level tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Red = 91,
    Green = 92,
    Yellow = 93,
    Blue = 94,
    Magenta = 95,
}

impl Color {
    pub fn for_level(level: Severity) -> Self {
        match level {
            Severity::Debug => Color::Green,
            Severity::Info => Color::Blue,
            Severity::Warn => Color::Yellow,
            Severity::Error => Color::Magenta,
            Severity::Fatal => Color::Red,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Wrap `text` in this color's escape sequence
    pub fn paint(self, text: &str) -> String {
        format!("\x1b[{}m{}\x1b[0m", self.code(), text)
    }
}

/// Build `"[YYYY-MM-DD HH:MM:SS.ffffff] <tag> "`, coloring the tag when
/// `color_enabled` is set.
pub fn format_prefix(tag: &str, level: Severity, color_enabled: bool, now: NaiveDateTime) -> String {
    let tag = if color_enabled {
        Color::for_level(level).paint(tag)
    } else {
        tag.to_string()
    };
    format!("{} {} ", now.format(TIMESTAMP_FORMAT), tag)
}

/// Strip the directory part of a source path, e.g. `src/main.rs` -> `main.rs`
pub fn short_file(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
