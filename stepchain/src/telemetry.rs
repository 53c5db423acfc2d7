//! Telemetry for sequence execution using the `tracing` ecosystem.
//!
//! The engine emits spans and events through `tracing` and never installs a
//! subscriber itself. Pick one in the host application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .init();
//! ```
//!
//! [`RunMetrics`] is the lightweight counterpart returned to callers after a
//! run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Span, debug_span, info_span};

/// Counters collected across one [`Orchestrator::run`](crate::Orchestrator::run)
/// call, sequence re-runs included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Sequence-level attempts started.
    pub sequence_attempts: u32,
    /// Step bodies invoked, retries included.
    pub step_invocations: u32,
    /// Step-level retries scheduled.
    pub step_retries: u32,
    /// Hooks that failed and were turned into breaks.
    pub hook_failures: u32,
    /// Breaks recorded.
    pub breaks: u32,
    /// Wall-clock duration of the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl RunMetrics {
    /// Record the start of a sequence attempt.
    pub const fn record_sequence_attempt(&mut self) {
        self.sequence_attempts += 1;
    }

    /// Record a step body invocation.
    pub const fn record_invocation(&mut self) {
        self.step_invocations += 1;
    }

    /// Record a scheduled step retry.
    pub const fn record_retry(&mut self) {
        self.step_retries += 1;
    }

    /// Record a hook failure.
    pub const fn record_hook_failure(&mut self) {
        self.hook_failures += 1;
    }

    /// Record a break.
    pub const fn record_break(&mut self) {
        self.breaks += 1;
    }

    /// Complete the run with its final duration.
    pub const fn complete(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }
}

impl std::fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sequence Run Metrics")?;
        writeln!(f, "  Attempts:    {}", self.sequence_attempts)?;
        writeln!(f, "  Invocations: {}", self.step_invocations)?;
        writeln!(f, "  Retries:     {}", self.step_retries)?;
        writeln!(f, "  Hook errors: {}", self.hook_failures)?;
        writeln!(f, "  Breaks:      {}", self.breaks)?;
        if let Some(d) = self.duration {
            writeln!(f, "  Duration:    {:.3}s", d.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Span wrapping a whole sequence run.
#[must_use]
pub fn sequence_span(name: &str) -> Span {
    info_span!("sequence", name = %name)
}

/// Span wrapping one step's retry loop.
#[must_use]
pub fn step_span(name: &str, max_attempts: u32) -> Span {
    debug_span!("step", name = %name, max_attempts)
}
