//! Log output setup
//!
//! Every line is prefixed with `[seconds since start][seconds since the
//! previous line]`, which makes stalls between notifications easy to spot.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fmt;
use std::time::Instant;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Monotonic timestamp plus delta since the previous log line
#[derive(Debug)]
pub(crate) struct DeltaTimer {
    start: Instant,
    last: Mutex<Instant>,
}

impl DeltaTimer {
    pub(crate) fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: Mutex::new(now),
        }
    }

    fn stamp(&self, now: Instant) -> (f64, f64) {
        let mut last = self.last.lock();
        let delta = now.saturating_duration_since(*last);
        *last = now;
        (
            now.saturating_duration_since(self.start).as_secs_f64(),
            delta.as_secs_f64(),
        )
    }
}

impl FormatTime for DeltaTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let (since_start, delta) = self.stamp(Instant::now());
        write!(w, "[{since_start:.6}][{delta:.6}]")
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `level` when set.
pub(crate) fn init(level: &str) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(directive),
        _ => EnvFilter::try_new(level),
    }
    .with_context(|| format!("invalid log filter {level:?}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(DeltaTimer::new())
                .with_target(false),
        )
        .try_init()
        .context("failed to install tracing subscriber")
}
