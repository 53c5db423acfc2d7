//! Commonly used types, for glob import.
//!
//! ```rust,ignore
//! use stepchain::prelude::*;
//! ```

pub use crate::config::{RetryDelay, SequenceConfig, StepConfig};
pub use crate::context::RunContext;
pub use crate::error::{Error, SharedError, StepError};
pub use crate::hook::{HookResult, StepResult};
pub use crate::orchestrator::{Orchestrator, RunState};
pub use crate::result::{FailureLedger, RunResult};
pub use crate::signal::BreakReason;
pub use crate::step::Step;
