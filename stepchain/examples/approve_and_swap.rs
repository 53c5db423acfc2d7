//! Approve-then-swap flow driven by the step orchestrator.
//!
//! The transaction sender is a mock that drops the first approval to show
//! step-level retries, and the quote step breaks the run when slippage is
//! too high.
//!
//! ```bash
//! RUST_LOG=stepchain=debug cargo run --example approve_and_swap
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::json;
use stepchain::prelude::*;
use tracing_subscriber::EnvFilter;

/// Stand-in for the host's injected `sendTransactions` capability.
#[derive(Debug, Default)]
struct MockSender {
    sent: AtomicU32,
}

#[derive(Debug, thiserror::Error)]
#[error("rpc timeout while sending {0}")]
struct RpcTimeout(&'static str);

impl MockSender {
    async fn send(&self, label: &'static str) -> std::result::Result<String, RpcTimeout> {
        tokio::task::yield_now().await;
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            return Err(RpcTimeout(label));
        }
        Ok(format!("0x{n:064x}"))
    }
}

fn swap_flow(sender: &Arc<MockSender>, slippage_bps: u64) -> Orchestrator {
    let approve_sender = Arc::clone(sender);
    let swap_sender = Arc::clone(sender);

    Orchestrator::new("approve-and-swap")
        .max_attempts(2)
        .retry_delay_ms(100)
        .add_step(Step::new("quote", move |ctx| async move {
            if slippage_bps > 100 {
                return Err(ctx.halt(json!({ "reason": "slippage", "bps": slippage_bps })));
            }
            Ok(json!({ "amount_out": "1000000", "slippage_bps": slippage_bps }))
        }))
        .add_step(
            Step::new("approve", move |ctx| {
                let sender = Arc::clone(&approve_sender);
                async move {
                    if let Some(hash) = ctx.get("approve") {
                        return Ok(hash);
                    }
                    let hash = sender.send("approve").await?;
                    Ok(json!(hash))
                }
            })
            .max_attempts(3)
            .retry_delay_ms(50)
            .on_retry(|attempt, err, _ctx| async move {
                tracing::info!(attempt, %err, "approval not mined yet");
                Ok(())
            }),
        )
        .add_step(Step::new("swap", move |_ctx| {
            let sender = Arc::clone(&swap_sender);
            async move {
                let hash = sender.send("swap").await?;
                Ok(json!(hash))
            }
        }))
        .on_break(|reason, ctx| async move {
            tracing::warn!(%reason, step = %ctx.current_step(), "swap aborted");
            Ok(())
        })
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let sender = Arc::new(MockSender::default());

    let mut flow = swap_flow(&sender, 30);
    let result = flow.run().await?;
    println!("approve: {}", result.get_result("approve").unwrap_or(&json!(null)));
    println!("swap:    {}", result.get_result("swap").unwrap_or(&json!(null)));
    println!("\n{}", result.metrics());

    let mut risky = swap_flow(&sender, 250);
    match risky.run().await {
        Ok(_) => println!("unexpected success"),
        Err(err) => println!("risky swap stopped: {err} (state: {:?})", risky.state()),
    }

    Ok(())
}
