//! Filters for routing `tracing` events into a rotating sink

use crate::level::{admit, Severity};
use tracing::{Metadata, Subscriber};
use tracing_subscriber::{
    filter::FilterFn,
    layer::{Context, Filter},
};

/// Filter that keeps rotalog's own diagnostics out of a layer that writes to a
/// [`SharedSink`](crate::SharedSink).
///
/// Those diagnostics are emitted while the sink lock is held, so the sink
/// discards them anyway; filtering them out saves the formatting work.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExcludeSelf;

impl ExcludeSelf {
    pub fn new() -> Self {
        Self
    }
}

fn is_own_target(target: &str) -> bool {
    target == "rotalog" || target.starts_with("rotalog::")
}

impl<S> Filter<S> for ExcludeSelf
where
    S: Subscriber,
{
    fn enabled(&self, meta: &Metadata<'_>, _ctx: &Context<'_, S>) -> bool {
        !is_own_target(meta.target())
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> tracing::subscriber::Interest {
        if is_own_target(meta.target()) {
            tracing::subscriber::Interest::never()
        } else {
            tracing::subscriber::Interest::sometimes()
        }
    }
}

/// Create a filter that admits events at least as urgent as `threshold`,
/// using the same rule as the logger's level gate.
pub fn create_severity_filter<S>(threshold: Severity) -> impl Filter<S>
where
    S: Subscriber,
{
    FilterFn::new(move |metadata: &Metadata<'_>| {
        !is_own_target(metadata.target()) && admit(Severity::from(*metadata.level()), threshold)
    })
}
