//! Configuration types for steps and sequences.
//!
//! Both structs deserialize with every field optional, so an integration can
//! keep its retry budgets in a JSON document:
//!
//! ```rust,ignore
//! let config = SequenceConfig::from_json(r#"{ "name": "swap", "max_attempts": 3 }"#)?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Retry budget for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Attempts before the step gives up. Must be at least 1.
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds. Negative skips waiting.
    pub retry_delay_ms: i64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_delay_ms: 0,
        }
    }
}

impl StepConfig {
    /// Check the configuration for the step called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_attempts` is zero.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_config(format!(
                "step '{name}' must allow at least one attempt"
            )));
        }
        Ok(())
    }

    /// The resolved delay between attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> RetryDelay {
        RetryDelay::from_millis(self.retry_delay_ms)
    }
}

/// Retry budget and identity of a whole sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Name used in logs and spans.
    pub name: String,
    /// Full re-runs of the sequence before giving up. Must be at least 1.
    pub max_attempts: u32,
    /// Delay between sequence attempts in milliseconds. Negative skips waiting.
    pub retry_delay_ms: i64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            name: "sequence".to_owned(),
            max_attempts: 1,
            retry_delay_ms: 0,
        }
    }
}

impl SequenceConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the document is malformed or
    /// `max_attempts` is zero.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_config(format!(
                "sequence '{}' must allow at least one attempt",
                self.name
            )));
        }
        Ok(())
    }

    /// The resolved delay between sequence attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> RetryDelay {
        RetryDelay::from_millis(self.retry_delay_ms)
    }
}

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryDelay {
    /// Retry immediately without yielding.
    Skip,
    /// Yield to the scheduler once, without a timer.
    #[default]
    Yield,
    /// Sleep on a real timer.
    Sleep(Duration),
}

impl RetryDelay {
    /// Map a signed millisecond value: negative skips, zero yields, positive
    /// sleeps.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_millis(ms: i64) -> Self {
        match ms {
            i64::MIN..=-1 => Self::Skip,
            0 => Self::Yield,
            ms => Self::Sleep(Duration::from_millis(ms as u64)),
        }
    }

    /// Wait according to this delay.
    pub async fn wait(self) {
        match self {
            Self::Skip => {}
            Self::Yield => tokio::task::yield_now().await,
            Self::Sleep(duration) => tokio::time::sleep(duration).await,
        }
    }
}

impl From<Duration> for RetryDelay {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Yield
        } else {
            Self::Sleep(duration)
        }
    }
}
