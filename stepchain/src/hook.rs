//! Boxed callback types for step bodies and lifecycle hooks.
//!
//! Callers hand the builders plain async closures; they are boxed here into
//! `'static` futures so a [`Step`](crate::Step) or
//! [`Orchestrator`](crate::Orchestrator) can store any number of them. Every
//! callback receives its own [`RunContext`] handle.
//!
//! A hook that returns an ordinary error never fails quietly: the engine
//! turns it into a break whose reason is that error.

use std::future::Future;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{SharedError, StepError};
use crate::signal::BreakReason;

/// Outcome of a step body.
pub type StepResult = Result<Value, StepError>;

/// Outcome of a lifecycle hook.
pub type HookResult = Result<(), StepError>;

pub(crate) type BodyFn = Box<dyn Fn(RunContext) -> BoxFuture<'static, StepResult> + Send + Sync>;

/// `(attempt, error, ctx)` for step `on_retry` and `on_failure`.
pub(crate) type StepErrorHook =
    Box<dyn Fn(u32, SharedError, RunContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// `(attempt, value, ctx)` for step `on_success`.
pub(crate) type StepSuccessHook =
    Box<dyn Fn(u32, Value, RunContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// `(ctx)` for sequence `on_success`.
pub(crate) type SequenceHook =
    Box<dyn Fn(RunContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// `(error, ctx)` for sequence `on_retry` and `on_failure`.
pub(crate) type SequenceErrorHook =
    Box<dyn Fn(SharedError, RunContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// `(reason, ctx)` for sequence `on_break`.
pub(crate) type BreakHook =
    Box<dyn Fn(BreakReason, RunContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

pub(crate) fn body<F, Fut>(f: F) -> BodyFn
where
    F: Fn(RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    Box::new(move |ctx: RunContext| -> BoxFuture<'static, StepResult> { Box::pin(f(ctx)) })
}

pub(crate) fn step_error_hook<F, Fut>(f: F) -> StepErrorHook
where
    F: Fn(u32, SharedError, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Box::new(
        move |attempt: u32, err: SharedError, ctx: RunContext| -> BoxFuture<'static, HookResult> {
            Box::pin(f(attempt, err, ctx))
        },
    )
}

pub(crate) fn step_success_hook<F, Fut>(f: F) -> StepSuccessHook
where
    F: Fn(u32, Value, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Box::new(
        move |attempt: u32, value: Value, ctx: RunContext| -> BoxFuture<'static, HookResult> {
            Box::pin(f(attempt, value, ctx))
        },
    )
}

pub(crate) fn sequence_hook<F, Fut>(f: F) -> SequenceHook
where
    F: Fn(RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Box::new(move |ctx: RunContext| -> BoxFuture<'static, HookResult> { Box::pin(f(ctx)) })
}

pub(crate) fn sequence_error_hook<F, Fut>(f: F) -> SequenceErrorHook
where
    F: Fn(SharedError, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Box::new(
        move |err: SharedError, ctx: RunContext| -> BoxFuture<'static, HookResult> {
            Box::pin(f(err, ctx))
        },
    )
}

pub(crate) fn break_hook<F, Fut>(f: F) -> BreakHook
where
    F: Fn(BreakReason, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Box::new(
        move |reason: BreakReason, ctx: RunContext| -> BoxFuture<'static, HookResult> {
            Box::pin(f(reason, ctx))
        },
    )
}
