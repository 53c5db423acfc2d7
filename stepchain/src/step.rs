//! A named, independently retryable unit of work.
//!
//! A [`Step`] wraps one async body together with its attempt budget, the
//! delay between attempts and optional `on_retry` / `on_success` /
//! `on_failure` hooks.
//!
//! # Examples
//!
//! ```rust,ignore
//! use stepchain::{Step, StepError};
//! use serde_json::json;
//!
//! let approve = Step::new("approve", |ctx| async move {
//!     let tx = sender.send_approval(&ctx).await.map_err(StepError::msg)?;
//!     Ok(json!({ "hash": tx }))
//! })
//! .max_attempts(3)
//! .retry_delay_ms(500)
//! .on_retry(|attempt, err, _ctx| async move {
//!     tracing::info!(attempt, %err, "approval failed, retrying");
//!     Ok(())
//! });
//! ```

use std::fmt;
use std::future::Future;

use serde_json::Value;
use tracing::{Instrument, debug, warn};

use crate::config::{RetryDelay, StepConfig};
use crate::context::RunContext;
use crate::error::{Result, SharedError, StepError};
use crate::hook::{self, BodyFn, HookResult, StepErrorHook, StepResult, StepSuccessHook};
use crate::telemetry;

/// One named unit of work in a sequence.
pub struct Step {
    name: String,
    max_attempts: u32,
    retry_delay: RetryDelay,
    body: BodyFn,
    on_retry: Option<StepErrorHook>,
    on_success: Option<StepSuccessHook>,
    on_failure: Option<StepErrorHook>,
    current_attempt: u32,
}

impl Step {
    /// Create a step with a single attempt and no delay.
    ///
    /// Names need not be unique; duplicates are kept side by side in the
    /// results.
    #[must_use]
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        let defaults = StepConfig::default();
        Self {
            name: name.into(),
            max_attempts: defaults.max_attempts,
            retry_delay: defaults.retry_delay(),
            body: hook::body(body),
            on_retry: None,
            on_success: None,
            on_failure: None,
            current_attempt: 0,
        }
    }

    /// Apply an attempt budget and delay loaded from configuration.
    #[must_use]
    pub const fn with_config(mut self, config: StepConfig) -> Self {
        self.max_attempts = config.max_attempts;
        self.retry_delay = config.retry_delay();
        self
    }

    /// Set the number of attempts. Must be at least 1 by the time the
    /// sequence runs.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub fn retry_delay(mut self, delay: impl Into<RetryDelay>) -> Self {
        self.retry_delay = delay.into();
        self
    }

    /// Set the delay between attempts in milliseconds. Negative values skip
    /// waiting entirely.
    #[must_use]
    pub const fn retry_delay_ms(mut self, ms: i64) -> Self {
        self.retry_delay = RetryDelay::from_millis(ms);
        self
    }

    /// Called with `(attempt, error, ctx)` after a failed attempt that will be
    /// retried.
    #[must_use]
    pub fn on_retry<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(u32, SharedError, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_retry = Some(hook::step_error_hook(hook));
        self
    }

    /// Called with `(attempt, value, ctx)` after a successful attempt.
    #[must_use]
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(u32, Value, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_success = Some(hook::step_success_hook(hook));
        self
    }

    /// Called with `(attempt, error, ctx)` once every attempt has failed.
    #[must_use]
    pub fn on_failure<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(u32, SharedError, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_failure = Some(hook::step_error_hook(hook));
        self
    }

    /// The step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured attempt budget.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The attempt the last [`execute`](Self::execute) call reached. Restarts
    /// at 1 on every call.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub(crate) fn validate(&self) -> Result<()> {
        StepConfig {
            max_attempts: self.max_attempts,
            retry_delay_ms: 0,
        }
        .validate(&self.name)
    }

    /// Run the body until it succeeds or the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the last ordinary error once every attempt has failed, without
    /// wrapping it. A break raised by the body or any hook is returned
    /// immediately and never consumes an attempt. A hook that fails with an
    /// ordinary error is turned into a break.
    pub async fn execute(&mut self, ctx: &RunContext) -> StepResult {
        let span = telemetry::step_span(&self.name, self.max_attempts);
        self.attempt_loop(ctx).instrument(span).await
    }

    async fn attempt_loop(&mut self, ctx: &RunContext) -> StepResult {
        let mut attempt = 1;
        loop {
            self.current_attempt = attempt;
            ctx.begin_attempt(attempt);
            debug!(attempt, "attempt started");

            let err = match (self.body)(ctx.clone()).await {
                Ok(value) => {
                    if let Some(hook) = &self.on_success {
                        let outcome = hook(attempt, value.clone(), ctx.clone()).await;
                        ctx.settle_hook("step.on_success", outcome)
                            .map_err(StepError::Break)?;
                    }
                    debug!(attempt, "attempt succeeded");
                    return Ok(value);
                }
                Err(StepError::Break(signal)) => return Err(StepError::Break(signal)),
                Err(StepError::Failed(err)) => err,
            };

            warn!(attempt, max_attempts = self.max_attempts, error = %err, "attempt failed");

            if attempt >= self.max_attempts {
                if let Some(hook) = &self.on_failure {
                    let outcome = hook(attempt, err.clone(), ctx.clone()).await;
                    ctx.settle_hook("step.on_failure", outcome)
                        .map_err(StepError::Break)?;
                }
                return Err(StepError::Failed(err));
            }

            ctx.record_retry();
            if let Some(hook) = &self.on_retry {
                let outcome = hook(attempt, err, ctx.clone()).await;
                ctx.settle_hook("step.on_retry", outcome)
                    .map_err(StepError::Break)?;
            }
            self.retry_delay.wait().await;
            attempt += 1;
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("on_retry", &self.on_retry.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> Step {
        Step::new("flaky", move |ctx| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(StepError::msg(format!("failure {n}")))
                } else {
                    Ok(json!({ "attempt": ctx.current_attempt() }))
                }
            }
        })
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let retries = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&retries);

        let mut step = flaky(2, Arc::clone(&calls))
            .max_attempts(3)
            .on_retry(move |_attempt, _err, _ctx| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        let ctx = RunContext::new("test");
        let value = step.execute(&ctx).await.unwrap();

        assert_eq!(value, json!({ "attempt": 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
        assert_eq!(step.current_attempt(), 3);
        assert_eq!(ctx.metrics().step_retries, 2);
    }

    #[tokio::test]
    async fn test_single_attempt_calls_body_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut step = flaky(u32::MAX, Arc::clone(&calls));

        let err = step.execute(&RunContext::new("test")).await.unwrap_err();
        assert_eq!(err.to_string(), "failure 1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error_and_calls_on_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let failures = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&failures);

        let mut step = flaky(u32::MAX, Arc::clone(&calls))
            .max_attempts(2)
            .retry_delay_ms(-1)
            .on_failure(move |attempt, err, _ctx| {
                let seen = Arc::clone(&seen);
                async move {
                    assert_eq!(attempt, 2);
                    assert_eq!(err.to_string(), "failure 2");
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        let err = step.execute(&RunContext::new("test")).await.unwrap_err();
        assert_eq!(err.to_string(), "failure 2");
        assert!(!err.is_break());
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_break_skips_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut step = Step::new("halting", move |ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ctx.halt("stop"))
            }
        })
        .max_attempts(5);

        let ctx = RunContext::new("test");
        let err = step.execute(&ctx).await.unwrap_err();
        assert!(err.is_break());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.break_reason().unwrap().as_str(), Some("stop"));
    }

    #[tokio::test]
    async fn test_failing_success_hook_breaks_with_hook_error() {
        let mut step = Step::new("quote", |_ctx| async { Ok(json!(1)) })
            .on_success(|_attempt, _value, _ctx| async {
                Err(StepError::msg("notifier unavailable"))
            });

        let ctx = RunContext::new("test");
        let err = step.execute(&ctx).await.unwrap_err();
        assert!(err.is_break());
        let reason = ctx.break_reason().unwrap();
        assert!(reason.is_error());
        assert_eq!(reason.to_string(), "notifier unavailable");
    }

    #[tokio::test]
    async fn test_failing_retry_hook_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut step = flaky(u32::MAX, Arc::clone(&calls))
            .max_attempts(4)
            .on_retry(|_attempt, _err, _ctx| async { Err(StepError::msg("hook exploded")) });

        let ctx = RunContext::new("test");
        let err = step.execute(&ctx).await.unwrap_err();
        assert!(err.is_break());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.metrics().hook_failures, 1);
    }

    #[tokio::test]
    async fn test_retry_hook_halt_keeps_its_reason() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut step = flaky(u32::MAX, Arc::clone(&calls))
            .max_attempts(4)
            .on_retry(|attempt, _err, ctx| async move {
                Err(ctx.halt(json!({ "gave_up_after": attempt })))
            });

        let ctx = RunContext::new("test");
        let err = step.execute(&ctx).await.unwrap_err();

        assert!(err.is_break());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            ctx.break_reason().unwrap().as_value(),
            Some(&json!({ "gave_up_after": 1 }))
        );
        assert_eq!(ctx.metrics().hook_failures, 0);
    }

    #[tokio::test]
    async fn test_counter_restarts_each_execute() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut step = flaky(1, Arc::clone(&calls)).max_attempts(2);
        let ctx = RunContext::new("test");

        tokio_test::assert_ok!(step.execute(&ctx).await);
        assert_eq!(step.current_attempt(), 2);
        tokio_test::assert_ok!(step.execute(&ctx).await);
        assert_eq!(step.current_attempt(), 1);
    }

    #[test]
    fn test_zero_attempts_invalid() {
        let step = Step::new("noop", |_ctx| async { Ok(Value::Null) }).max_attempts(0);
        assert!(step.validate().is_err());
        assert!(format!("{step:?}").contains("noop"));
    }
}
