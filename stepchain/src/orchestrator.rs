//! Sequential step runner with step-level and sequence-level retries.
//!
//! The [`Orchestrator`] drives its [`Step`]s strictly in registration order:
//!
//! 1. Create one [`RunContext`] for the whole call
//! 2. Start a sequence attempt with a fresh [`RunResult`]
//! 3. Execute each step, which retries on its own budget
//! 4. On an ordinary step failure, re-run the whole sequence from the first
//!    step until the sequence budget is spent
//! 5. On a break, stop at once, fire `on_break` and surface the break reason
//!
//! The context survives sequence re-runs; the result does not. A step can
//! therefore see what a failed attempt left behind, while the caller only
//! sees what the successful attempt produced.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use tracing::{Instrument, error, info, warn};

use crate::config::{RetryDelay, SequenceConfig};
use crate::context::RunContext;
use crate::error::{Error, Result, SharedError, StepError};
use crate::hook::{self, BreakHook, HookResult, SequenceErrorHook, SequenceHook};
use crate::result::RunResult;
use crate::signal::BreakReason;
use crate::step::Step;
use crate::telemetry::{self, RunMetrics};

/// Lifecycle of an [`Orchestrator`] across its last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Never run.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The last run finished successfully.
    Succeeded,
    /// The last run was broken.
    Broken,
    /// The last run ran out of attempts.
    Failed,
}

/// Owner of an ordered list of steps, run sequentially with a sequence-level
/// retry layer on top of each step's own.
///
/// # Examples
///
/// ```rust,ignore
/// use stepchain::{Orchestrator, Step};
/// use serde_json::json;
///
/// let mut swap = Orchestrator::new("swap")
///     .max_attempts(3)
///     .add_step(Step::new("approve", |_ctx| async { Ok(json!("0xapprove")) }))
///     .add_step(Step::new("swap", |_ctx| async { Ok(json!("0xswap")) }))
///     .on_break(|reason, _ctx| async move {
///         tracing::warn!(%reason, "swap aborted");
///         Ok(())
///     });
///
/// let result = swap.run().await?;
/// assert_eq!(result.get_result("swap"), Some(&json!("0xswap")));
/// ```
pub struct Orchestrator {
    name: String,
    steps: Vec<Step>,
    max_attempts: u32,
    retry_delay: RetryDelay,
    on_retry: Option<SequenceErrorHook>,
    on_success: Option<SequenceHook>,
    on_failure: Option<SequenceErrorHook>,
    on_break: Option<BreakHook>,
    state: RunState,
    last_break: Option<BreakReason>,
    last_metrics: RunMetrics,
}

impl Orchestrator {
    /// Create an empty sequence with a single attempt and no delay.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(SequenceConfig {
            name: name.into(),
            ..SequenceConfig::default()
        })
    }

    /// Create an empty sequence from configuration.
    #[must_use]
    pub fn from_config(config: SequenceConfig) -> Self {
        Self {
            retry_delay: config.retry_delay(),
            max_attempts: config.max_attempts,
            name: config.name,
            steps: Vec::new(),
            on_retry: None,
            on_success: None,
            on_failure: None,
            on_break: None,
            state: RunState::Idle,
            last_break: None,
            last_metrics: RunMetrics::default(),
        }
    }

    /// Append a step. Steps run in the order they are added.
    #[must_use]
    pub fn add_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a step through a mutable reference.
    pub fn push_step(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Set the number of full sequence attempts. Must be at least 1 by the
    /// time the sequence runs.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay between sequence attempts.
    #[must_use]
    pub fn retry_delay(mut self, delay: impl Into<RetryDelay>) -> Self {
        self.retry_delay = delay.into();
        self
    }

    /// Set the delay between sequence attempts in milliseconds. Negative
    /// values skip waiting entirely.
    #[must_use]
    pub const fn retry_delay_ms(mut self, ms: i64) -> Self {
        self.retry_delay = RetryDelay::from_millis(ms);
        self
    }

    /// Called with `(error, ctx)` before the sequence is re-run.
    #[must_use]
    pub fn on_retry<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SharedError, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_retry = Some(hook::sequence_error_hook(hook));
        self
    }

    /// Called with `(ctx)` once every step has succeeded.
    #[must_use]
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_success = Some(hook::sequence_hook(hook));
        self
    }

    /// Called with `(error, ctx)` once every sequence attempt has failed.
    #[must_use]
    pub fn on_failure<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SharedError, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_failure = Some(hook::sequence_error_hook(hook));
        self
    }

    /// Called with `(reason, ctx)` when the run is broken. The hook may break
    /// again or fail, which replaces the reason the run ends with.
    #[must_use]
    pub fn on_break<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BreakReason, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_break = Some(hook::break_hook(hook));
        self
    }

    /// The sequence name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered step names, in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Where the orchestrator stands after its last run.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Returns `true` if the last run was broken.
    #[must_use]
    pub const fn was_broken(&self) -> bool {
        self.last_break.is_some()
    }

    /// The reason the last run was broken with.
    #[must_use]
    pub const fn break_reason(&self) -> Option<&BreakReason> {
        self.last_break.as_ref()
    }

    /// Metrics of the last run, whatever its outcome.
    #[must_use]
    pub const fn last_metrics(&self) -> &RunMetrics {
        &self.last_metrics
    }

    /// Run every step in order, retrying the whole sequence on failure.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the sequence or a step allows zero
    ///   attempts; nothing runs in that case.
    /// - [`Error::Step`] with the last step error once every sequence attempt
    ///   has failed.
    /// - [`Error::Broken`] if the run was broken with an error-like reason,
    ///   or [`Error::Interrupted`] for any other reason.
    ///
    /// The previous run's break state is cleared before validation, so a
    /// rejected run never reports an older break. Dropping the returned
    /// future mid-run leaves [`state`](Self::state) at
    /// [`RunState::Running`] until the next call.
    pub async fn run(&mut self) -> Result<RunResult> {
        self.last_break = None;
        self.validate()?;

        let ctx = RunContext::new(&self.name);
        self.state = RunState::Running;

        let started = Instant::now();
        let span = telemetry::sequence_span(&self.name);
        let outcome = self.drive(&ctx).instrument(span).await;
        self.last_metrics = ctx.complete(started.elapsed());

        match outcome {
            Ok(mut result) => {
                self.state = RunState::Succeeded;
                result.set_metrics(self.last_metrics);
                Ok(result)
            }
            Err(err) if err.is_break() => {
                self.state = RunState::Broken;
                self.last_break = ctx.break_reason();
                Err(err)
            }
            Err(err) => {
                self.state = RunState::Failed;
                Err(err)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        SequenceConfig {
            name: self.name.clone(),
            max_attempts: self.max_attempts,
            retry_delay_ms: 0,
        }
        .validate()?;
        self.steps.iter().try_for_each(Step::validate)
    }

    async fn drive(&mut self, ctx: &RunContext) -> Result<RunResult> {
        let err = match self.attempt_loop(ctx).await {
            Ok(result) => return Ok(result),
            Err(StepError::Break(_)) => return Err(self.finish_break(ctx).await),
            Err(StepError::Failed(err)) => err,
        };

        error!(
            attempts = self.max_attempts,
            error = %err,
            "sequence failed"
        );
        if let Some(hook) = &self.on_failure {
            let outcome = hook(err.clone(), ctx.clone()).await;
            if ctx.settle_hook("sequence.on_failure", outcome).is_err() {
                return Err(self.finish_break(ctx).await);
            }
        }
        Err(Error::Step(err))
    }

    async fn attempt_loop(&mut self, ctx: &RunContext) -> std::result::Result<RunResult, StepError> {
        let mut attempt = 1;
        loop {
            ctx.begin_sequence_attempt(attempt);
            let mut result = RunResult::new();

            let err = match self.run_steps(ctx, &mut result).await {
                Ok(()) => {
                    if let Some(hook) = &self.on_success {
                        let outcome = hook(ctx.clone()).await;
                        ctx.settle_hook("sequence.on_success", outcome)
                            .map_err(StepError::Break)?;
                    }
                    info!(attempt, steps = result.len(), "sequence succeeded");
                    return Ok(result);
                }
                Err(StepError::Break(signal)) => return Err(StepError::Break(signal)),
                Err(StepError::Failed(err)) => err,
            };

            if attempt >= self.max_attempts {
                return Err(StepError::Failed(err));
            }

            warn!(
                attempt,
                max_attempts = self.max_attempts,
                step = %ctx.current_step(),
                error = %err,
                "sequence attempt failed, re-running from the first step"
            );
            if let Some(hook) = &self.on_retry {
                let outcome = hook(err, ctx.clone()).await;
                ctx.settle_hook("sequence.on_retry", outcome)
                    .map_err(StepError::Break)?;
            }
            self.retry_delay.wait().await;
            attempt += 1;
        }
    }

    async fn run_steps(
        &mut self,
        ctx: &RunContext,
        result: &mut RunResult,
    ) -> std::result::Result<(), StepError> {
        for step in &mut self.steps {
            ctx.enter_step(step.name());
            let value = step.execute(ctx).await?;
            result.insert(step.name(), value.clone());
            ctx.set(step.name(), value);
        }
        Ok(())
    }

    /// Fire `on_break` and resolve the error the run ends with. Whatever the
    /// hook does, the last recorded reason wins.
    async fn finish_break(&self, ctx: &RunContext) -> Error {
        let reason = ctx.break_reason().unwrap_or_default();
        warn!(step = %ctx.current_step(), %reason, "sequence broken");

        if let Some(hook) = &self.on_break {
            match hook(reason, ctx.clone()).await {
                Ok(()) | Err(StepError::Break(_)) => {}
                Err(StepError::Failed(err)) => {
                    let _ = ctx.hook_failed("sequence.on_break", err);
                }
            }
        }

        ctx.break_reason().unwrap_or_default().into_error()
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
