//! The break signal and the reasons it carries.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, SharedError};

/// Why a run was broken.
///
/// A reason may be an error, in which case the run fails with that error, or
/// any other value, in which case the run fails with
/// [`Error::Interrupted`].
#[derive(Debug, Clone, Default)]
pub enum BreakReason {
    /// No reason was given.
    #[default]
    Empty,
    /// A plain value such as a string or a JSON document.
    Value(Value),
    /// An error-like reason, surfaced as the final error of the run.
    Error(SharedError),
}

impl BreakReason {
    /// Create an error-like reason.
    #[must_use]
    pub fn error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Error(Arc::new(err))
    }

    /// Returns `true` if the reason is error-like.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The reason as a string slice, if it is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(value) => value.as_str(),
            Self::Empty | Self::Error(_) => None,
        }
    }

    /// The reason as a JSON value, if it is not an error.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Empty | Self::Error(_) => None,
        }
    }

    /// The error, if the reason is error-like.
    #[must_use]
    pub const fn as_error(&self) -> Option<&SharedError> {
        match self {
            Self::Error(err) => Some(err),
            Self::Empty | Self::Value(_) => None,
        }
    }

    /// Convert into the error the run finally fails with.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Self::Error(err) => Error::Broken(err),
            Self::Empty | Self::Value(_) => Error::Interrupted,
        }
    }
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "<none>"),
            Self::Value(Value::String(s)) => write!(f, "{s}"),
            Self::Value(value) => write!(f, "{value}"),
            Self::Error(err) => write!(f, "{err}"),
        }
    }
}

impl From<()> for BreakReason {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<&str> for BreakReason {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_owned()))
    }
}

impl From<String> for BreakReason {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

impl From<Value> for BreakReason {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<SharedError> for BreakReason {
    fn from(err: SharedError) -> Self {
        Self::Error(err)
    }
}

/// Control-flow marker that aborts every retry loop.
///
/// A break signal is not a failure: retry loops re-raise it unchanged instead
/// of consuming an attempt. It is created by
/// [`RunContext::halt`](crate::RunContext::halt) only.
#[derive(Debug, Clone)]
pub struct BreakSignal {
    reason: BreakReason,
}

impl BreakSignal {
    pub(crate) const fn new(reason: BreakReason) -> Self {
        Self { reason }
    }

    /// The reason recorded when this signal was raised.
    #[must_use]
    pub const fn reason(&self) -> &BreakReason {
        &self.reason
    }
}

impl fmt::Display for BreakSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution interrupted: {}", self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_reason_is_not_error_like() {
        let reason = BreakReason::from("stop");
        assert!(!reason.is_error());
        assert_eq!(reason.as_str(), Some("stop"));
        assert!(matches!(reason.into_error(), Error::Interrupted));
    }

    #[test]
    fn test_structured_reason() {
        let reason = BreakReason::from(json!({ "code": 4001, "message": "user rejected" }));
        assert_eq!(reason.as_value().and_then(|v| v["code"].as_i64()), Some(4001));
        assert!(reason.as_str().is_none());
        assert!(matches!(reason.into_error(), Error::Interrupted));
    }

    #[test]
    fn test_error_reason_surfaces_error() {
        let reason = BreakReason::error(std::io::Error::other("insufficient funds"));
        assert!(reason.is_error());
        let err = reason.into_error();
        assert!(matches!(err, Error::Broken(_)));
        assert_eq!(err.to_string(), "insufficient funds");
    }

    #[test]
    fn test_signal_display() {
        let signal = BreakSignal::new(BreakReason::from("stop"));
        assert_eq!(signal.to_string(), "execution interrupted: stop");
        assert_eq!(signal.reason().as_str(), Some("stop"));
        assert!(matches!(BreakReason::from(()), BreakReason::Empty));
    }
}
