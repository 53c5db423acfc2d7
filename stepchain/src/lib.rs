#![cfg_attr(docsrs, feature(doc_cfg))]
//! Stepchain is a retryable step-orchestration engine for Web3 agent
//! integrations.
//!
//! An integration exposes a blockchain operation (approve then swap, wrap then
//! bridge, sign then submit) as an ordered [`Orchestrator`] of named
//! [`Step`]s. Each step retries on its own budget; the whole sequence re-runs
//! from the first step when a step gives up; any step or hook can
//! [`halt`](RunContext::halt) the run, which skips every pending retry.
//!
//! Transaction construction, signing and network access stay with the
//! integration: step bodies are opaque async closures and the engine only
//! looks at whether they succeed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stepchain::prelude::*;
//! use serde_json::json;
//!
//! let mut flow = Orchestrator::new("approve-and-swap")
//!     .max_attempts(2)
//!     .add_step(Step::new("approve", |_ctx| async { Ok(json!("0xapprove")) }).max_attempts(3))
//!     .add_step(Step::new("swap", |ctx| async move {
//!         if ctx.get("approve").is_none() {
//!             return Err(ctx.halt("approval missing"));
//!         }
//!         Ok(json!("0xswap"))
//!     }));
//!
//! let result = flow.run().await?;
//! assert_eq!(result.get_result("swap"), Some(&json!("0xswap")));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod hook;
pub mod orchestrator;
pub mod prelude;
pub mod result;
pub mod signal;
pub mod step;
pub mod store;
pub mod telemetry;

pub use config::{RetryDelay, SequenceConfig, StepConfig};
pub use context::RunContext;
pub use error::{Error, Result, SharedError, StepError};
pub use hook::{HookResult, StepResult};
pub use orchestrator::{Orchestrator, RunState};
pub use result::{FailureLedger, RunResult};
pub use signal::{BreakReason, BreakSignal};
pub use step::Step;
pub use store::ResultStore;
pub use telemetry::RunMetrics;
