//! Message body construction from a message and loosely typed arguments

use serde::Serialize;

/// Serialize one argument to JSON text. Returns `None` when the value cannot
/// be serialized, in which case the argument is left out of the line.
pub fn render_arg<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::trace!(
                rotalog.event = "argument_dropped",
                error = %e,
                "Log argument could not be serialized"
            );
            None
        }
    }
}

/// Join `message` with the rendered arguments, separated by single spaces.
/// Trailing newlines are stripped; the line terminator is added by the logger.
pub fn compose<I>(message: &str, args: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut body = message.to_string();
    for arg in args.into_iter().flatten() {
        body.push(' ');
        body.push_str(&arg);
    }
    let trimmed = body.trim_end_matches(['\n', '\r']).len();
    body.truncate(trimmed);
    body
}
