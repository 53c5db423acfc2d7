//! Shared state handed to every step body and hook during one run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::{SharedError, StepError};
use crate::signal::{BreakReason, BreakSignal};
use crate::store::ResultStore;
use crate::telemetry::RunMetrics;

#[derive(Debug, Default)]
struct ContextState {
    sequence_name: String,
    results: ResultStore,
    current_attempt: u32,
    current_step: String,
    sequence_attempt: u32,
    break_reason: Option<BreakReason>,
    metrics: RunMetrics,
}

/// Mutable state shared by every step of one
/// [`Orchestrator::run`](crate::Orchestrator::run) call.
///
/// `RunContext` is a cheap handle: clones refer to the same state. One context
/// is created per run and is kept across sequence-level retries, so values
/// written during a failed attempt are still visible to the next one. Bodies
/// and hooks must not keep their clone once they have returned.
///
/// The context also owns the run's break state. [`halt`](Self::halt) is the
/// only way to abort the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    inner: Arc<Mutex<ContextState>>,
}

impl RunContext {
    /// Create a fresh context. The orchestrator creates one per run; build
    /// one yourself only to drive a [`Step`](crate::Step) in isolation.
    #[must_use]
    pub fn new(sequence_name: impl Into<String>) -> Self {
        let state = ContextState {
            sequence_name: sequence_name.into(),
            ..ContextState::default()
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the sequence this context belongs to.
    #[must_use]
    pub fn sequence_name(&self) -> String {
        self.state().sequence_name.clone()
    }

    /// Latest value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.state().results.get(name).cloned()
    }

    /// Value stored at `index`, in write order.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<Value> {
        self.state().results.get_index(index).cloned()
    }

    /// Returns `true` if any value was stored under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state().results.contains(name)
    }

    /// Store a value. Step results are stored the same way by the
    /// orchestrator once a step succeeds.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.state().results.insert(name, value.into());
    }

    /// Snapshot of everything stored so far.
    #[must_use]
    pub fn results(&self) -> ResultStore {
        self.state().results.clone()
    }

    /// Attempt number of the step currently executing, starting at 1.
    #[must_use]
    pub fn current_attempt(&self) -> u32 {
        self.state().current_attempt
    }

    /// Name of the step currently executing.
    #[must_use]
    pub fn current_step(&self) -> String {
        self.state().current_step.clone()
    }

    /// Sequence-level attempt number, starting at 1.
    #[must_use]
    pub fn sequence_attempt(&self) -> u32 {
        self.state().sequence_attempt
    }

    /// Break the run.
    ///
    /// Records `reason` as the run's break reason, replacing any earlier one,
    /// and returns the [`StepError::Break`] to propagate from the body or
    /// hook:
    ///
    /// ```rust,ignore
    /// if quote.slippage > limit {
    ///     return Err(ctx.halt("slippage above limit"));
    /// }
    /// ```
    #[must_use = "the break only takes effect once the returned error is propagated"]
    pub fn halt(&self, reason: impl Into<BreakReason>) -> StepError {
        StepError::Break(self.record_break(reason.into()))
    }

    /// Returns `true` once a break has been recorded.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.state().break_reason.is_some()
    }

    /// The most recently recorded break reason.
    #[must_use]
    pub fn break_reason(&self) -> Option<BreakReason> {
        self.state().break_reason.clone()
    }

    /// Snapshot of the run's metrics.
    #[must_use]
    pub fn metrics(&self) -> RunMetrics {
        self.state().metrics
    }

    pub(crate) fn record_break(&self, reason: BreakReason) -> BreakSignal {
        let mut state = self.state();
        state.metrics.record_break();
        state.break_reason = Some(reason.clone());
        BreakSignal::new(reason)
    }

    /// Turn a failed hook into a break. A hook that already broke keeps the
    /// reason it recorded.
    pub(crate) fn settle_hook(
        &self,
        hook: &'static str,
        outcome: Result<(), StepError>,
    ) -> Result<(), BreakSignal> {
        match outcome {
            Ok(()) => Ok(()),
            Err(StepError::Break(signal)) => Err(signal),
            Err(StepError::Failed(err)) => Err(self.hook_failed(hook, err)),
        }
    }

    pub(crate) fn hook_failed(&self, hook: &'static str, err: SharedError) -> BreakSignal {
        warn!(hook, error = %err, "hook failed, breaking run");
        self.state().metrics.record_hook_failure();
        self.record_break(BreakReason::Error(err))
    }

    pub(crate) fn begin_sequence_attempt(&self, attempt: u32) {
        let mut state = self.state();
        state.sequence_attempt = attempt;
        state.metrics.record_sequence_attempt();
    }

    pub(crate) fn enter_step(&self, name: &str) {
        name.clone_into(&mut self.state().current_step);
    }

    pub(crate) fn begin_attempt(&self, attempt: u32) {
        let mut state = self.state();
        state.current_attempt = attempt;
        state.metrics.record_invocation();
    }

    pub(crate) fn record_retry(&self) {
        self.state().metrics.record_retry();
    }

    pub(crate) fn complete(&self, duration: Duration) -> RunMetrics {
        let mut state = self.state();
        state.metrics.complete(duration);
        state.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_state() {
        let ctx = RunContext::new("swap");
        let handle = ctx.clone();
        handle.set("quote", json!({ "out": "1000" }));

        assert_eq!(ctx.sequence_name(), "swap");
        assert_eq!(ctx.get("quote"), Some(json!({ "out": "1000" })));
        assert!(ctx.contains("quote"));
        assert_eq!(ctx.get_index(0), Some(json!({ "out": "1000" })));
        assert_eq!(ctx.results().len(), 1);
    }

    #[test]
    fn test_attempt_tracking() {
        let ctx = RunContext::new("swap");
        ctx.begin_sequence_attempt(2);
        ctx.enter_step("approve");
        ctx.begin_attempt(3);

        assert_eq!(ctx.sequence_attempt(), 2);
        assert_eq!(ctx.current_step(), "approve");
        assert_eq!(ctx.current_attempt(), 3);
        assert_eq!(ctx.metrics().step_invocations, 1);
        assert_eq!(ctx.metrics().sequence_attempts, 1);
    }

    #[test]
    fn test_halt_records_last_reason() {
        let ctx = RunContext::new("swap");
        assert!(!ctx.is_broken());

        let first = ctx.halt("first");
        assert!(first.is_break());
        let _second = ctx.halt("second");

        assert!(ctx.is_broken());
        assert_eq!(ctx.break_reason().unwrap().as_str(), Some("second"));
        assert_eq!(ctx.metrics().breaks, 2);
    }

    #[test]
    fn test_failed_hook_becomes_break() {
        let ctx = RunContext::new("swap");
        let signal = ctx
            .settle_hook("on_retry", Err(StepError::msg("notifier offline")))
            .unwrap_err();

        assert!(signal.reason().is_error());
        assert_eq!(signal.reason().to_string(), "notifier offline");
        assert!(ctx.break_reason().unwrap().is_error());
        assert_eq!(ctx.metrics().hook_failures, 1);
    }

    #[test]
    fn test_breaking_hook_keeps_recorded_reason() {
        let ctx = RunContext::new("swap");
        let outcome = Err(ctx.halt("user cancelled"));
        let signal = ctx.settle_hook("on_success", outcome).unwrap_err();

        assert_eq!(signal.reason().as_str(), Some("user cancelled"));
        assert_eq!(ctx.break_reason().unwrap().as_str(), Some("user cancelled"));
        assert_eq!(ctx.metrics().hook_failures, 0);
        assert!(ctx.settle_hook("on_success", Ok(())).is_ok());
    }
}
