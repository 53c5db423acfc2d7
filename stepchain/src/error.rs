//! Error types for sequence execution.
//!
//! Two layers of errors flow through the engine:
//!
//! - [`StepError`] is the tagged outcome returned by step bodies and hooks. It
//!   is either an ordinary failure, which the retry loops may consume, or a
//!   [`BreakSignal`] that bypasses every retry loop.
//! - [`Error`] is what [`Orchestrator::run`](crate::Orchestrator::run) hands
//!   back to the caller once the run is over.
//!
//! Neither layer wraps or renames the underlying failure: the value a step
//! body produced is the value the caller receives.

use std::fmt;
use std::sync::Arc;

use crate::signal::BreakSignal;

/// Reference-counted, type-erased error shared between the engine, hooks and
/// the caller.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error returned by [`Orchestrator::run`](crate::Orchestrator::run).
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A step kept failing until the sequence ran out of attempts.
    ///
    /// Displays exactly as the original step error.
    #[error("{0}")]
    Step(SharedError),

    /// The run was broken with an error-like reason.
    ///
    /// Displays exactly as the break reason.
    #[error("{0}")]
    Broken(SharedError),

    /// The run was broken with a reason that is not an error.
    #[error("execution interrupted")]
    Interrupted,

    /// The sequence or one of its steps is misconfigured.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// The underlying error for [`Step`](Self::Step) and
    /// [`Broken`](Self::Broken) variants.
    #[must_use]
    pub fn inner(&self) -> Option<&SharedError> {
        match self {
            Self::Step(err) | Self::Broken(err) => Some(err),
            Self::Interrupted | Self::InvalidConfig(_) => None,
        }
    }

    /// Returns `true` if the run ended because of a break.
    #[must_use]
    pub const fn is_break(&self) -> bool {
        matches!(self, Self::Broken(_) | Self::Interrupted)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Outcome of a failed step body or hook.
///
/// Any `std::error::Error` converts into [`StepError::Failed`], so `?` works
/// inside step bodies. A [`StepError::Break`] can only be obtained from
/// [`RunContext::halt`](crate::RunContext::halt), which records the break
/// reason at the same time.
///
/// Like `anyhow::Error`, this type deliberately does not implement
/// `std::error::Error` itself.
#[derive(Debug, Clone)]
pub enum StepError {
    /// Ordinary failure; eligible for retry.
    Failed(SharedError),
    /// Non-retryable abort of the whole run.
    Break(BreakSignal),
}

impl StepError {
    /// Create a failure carrying a plain message.
    #[must_use]
    pub fn msg(message: impl fmt::Display) -> Self {
        let boxed: Box<dyn std::error::Error + Send + Sync> = message.to_string().into();
        Self::Failed(Arc::from(boxed))
    }

    /// Create a failure from an already shared error.
    #[must_use]
    pub const fn shared(err: SharedError) -> Self {
        Self::Failed(err)
    }

    /// Returns `true` if this is a break signal.
    #[must_use]
    pub const fn is_break(&self) -> bool {
        matches!(self, Self::Break(_))
    }

    /// The ordinary failure, if this is not a break.
    #[must_use]
    pub const fn as_failure(&self) -> Option<&SharedError> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Break(_) => None,
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "{err}"),
            Self::Break(signal) => write!(f, "{signal}"),
        }
    }
}

impl<E> From<E> for StepError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::Failed(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::BreakReason;

    #[test]
    fn test_step_error_msg_keeps_message() {
        let err = StepError::msg("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_break());
        assert_eq!(err.as_failure().map(ToString::to_string).as_deref(), Some("boom"));
    }

    #[test]
    fn test_question_mark_conversion() {
        fn parse(raw: &str) -> std::result::Result<u64, StepError> {
            Ok(raw.parse::<u64>()?)
        }

        let err = parse("not-a-number").unwrap_err();
        assert!(matches!(err, StepError::Failed(_)));
        assert_eq!(err.to_string(), "invalid digit found in string");
    }

    #[test]
    fn test_error_display_is_transparent() {
        let err = Error::Step(Arc::new(std::io::Error::other("rpc unreachable")));
        assert_eq!(err.to_string(), "rpc unreachable");
        assert!(!err.is_break());
        assert!(err.inner().is_some());

        let broken = BreakReason::error(std::io::Error::other("nonce too low")).into_error();
        assert_eq!(broken.to_string(), "nonce too low");
        assert!(broken.is_break());

        assert_eq!(Error::Interrupted.to_string(), "execution interrupted");
        assert!(Error::Interrupted.inner().is_none());
    }

    #[test]
    fn test_invalid_config_from_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
