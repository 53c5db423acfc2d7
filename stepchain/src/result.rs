//! The value handed back by a successful run.
//!
//! A [`RunResult`] only holds what the final, successful sequence attempt
//! produced. Values written during earlier failed attempts stay visible to
//! steps through the [`RunContext`](crate::RunContext) but are not reported
//! here.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::store::ResultStore;
use crate::telemetry::RunMetrics;

/// Results of one successful sequence attempt.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    results: ResultStore,
    failures: FailureLedger,
    metrics: RunMetrics,
}

impl RunResult {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.results.insert(name, value);
    }

    pub(crate) const fn set_metrics(&mut self, metrics: RunMetrics) {
        self.metrics = metrics;
    }

    /// The result of the last step registered under `name`.
    #[must_use]
    pub fn get_result(&self, name: &str) -> Option<&Value> {
        self.results.get(name)
    }

    /// The result at `index`, in registration order.
    #[must_use]
    pub fn get_result_at(&self, index: usize) -> Option<&Value> {
        self.results.get_index(index)
    }

    /// Every result, in registration order, duplicates included.
    pub fn results_by_index(&self) -> impl Iterator<Item = &Value> {
        self.results.values()
    }

    /// The latest result per step name.
    #[must_use]
    pub fn results_by_name(&self) -> HashMap<&str, &Value> {
        self.results.by_name()
    }

    /// The underlying store.
    #[must_use]
    pub const fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Number of results, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if the sequence had no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The failure ledger.
    #[must_use]
    pub const fn failures(&self) -> &FailureLedger {
        &self.failures
    }

    /// Mutable access to the failure ledger.
    pub const fn failures_mut(&mut self) -> &mut FailureLedger {
        &mut self.failures
    }

    /// Metrics for the whole run, failed attempts included.
    #[must_use]
    pub const fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }
}

/// Failure reasons keyed by step name and attempt number.
///
/// The engine does not fill the ledger on its own; integrations record into
/// it through [`RunResult::failures_mut`] when they want a per-attempt audit
/// trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLedger {
    by_step: HashMap<String, BTreeMap<u32, String>>,
}

impl FailureLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record why `step` failed on `attempt`, replacing any earlier entry
    /// for the same attempt.
    pub fn record_failure(&mut self, step: impl Into<String>, attempt: u32, reason: impl Into<String>) {
        self.by_step
            .entry(step.into())
            .or_default()
            .insert(attempt, reason.into());
    }

    /// Returns `true` if `step` failed on any attempt.
    #[must_use]
    pub fn has_failure(&self, step: &str) -> bool {
        self.by_step.get(step).is_some_and(|attempts| !attempts.is_empty())
    }

    /// Returns `true` if `step` failed on `attempt`.
    #[must_use]
    pub fn has_failure_at(&self, step: &str, attempt: u32) -> bool {
        self.failure(step, attempt).is_some()
    }

    /// Why `step` failed on `attempt`.
    #[must_use]
    pub fn failure(&self, step: &str, attempt: u32) -> Option<&str> {
        self.by_step
            .get(step)
            .and_then(|attempts| attempts.get(&attempt))
            .map(String::as_str)
    }

    /// Attempts on which `step` failed, ascending.
    #[must_use]
    pub fn failure_attempts(&self, step: &str) -> Vec<u32> {
        self.by_step
            .get(step)
            .map(|attempts| attempts.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every step with at least one failure, sorted by name.
    #[must_use]
    pub fn failed_steps(&self) -> Vec<&str> {
        let mut steps: Vec<&str> = self
            .by_step
            .iter()
            .filter(|(_, attempts)| !attempts.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        steps.sort_unstable();
        steps
    }

    /// Every step that failed with exactly `reason` on some attempt, sorted
    /// by name.
    #[must_use]
    pub fn steps_failed_with_reason(&self, reason: &str) -> Vec<&str> {
        let mut steps: Vec<&str> = self
            .by_step
            .iter()
            .filter(|(_, attempts)| attempts.values().any(|r| r == reason))
            .map(|(name, _)| name.as_str())
            .collect();
        steps.sort_unstable();
        steps
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_step.values().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_accessors() {
        let mut result = RunResult::new();
        result.insert("approve", json!("0x01"));
        result.insert("swap", json!("0x02"));
        result.insert("approve", json!("0x03"));

        assert_eq!(result.len(), 3);
        assert_eq!(result.results_by_name().len(), 2);
        assert_eq!(result.get_result("approve"), Some(&json!("0x03")));
        assert_eq!(result.get_result_at(0), Some(&json!("0x01")));
        assert_eq!(result.results_by_index().count(), 3);
        assert!(result.failures().is_empty());
    }

    #[test]
    fn test_failure_ledger_queries() {
        let mut ledger = FailureLedger::new();
        ledger.record_failure("swap", 2, "slippage");
        ledger.record_failure("swap", 1, "nonce too low");
        ledger.record_failure("approve", 1, "slippage");

        assert!(ledger.has_failure("swap"));
        assert!(ledger.has_failure_at("swap", 2));
        assert!(!ledger.has_failure_at("swap", 3));
        assert!(!ledger.has_failure("bridge"));
        assert_eq!(ledger.failure("swap", 1), Some("nonce too low"));
        assert_eq!(ledger.failure_attempts("swap"), [1, 2]);
        assert!(ledger.failure_attempts("bridge").is_empty());
        assert_eq!(ledger.failed_steps(), ["approve", "swap"]);
        assert_eq!(ledger.steps_failed_with_reason("slippage"), ["approve", "swap"]);
        assert_eq!(ledger.steps_failed_with_reason("nonce too low"), ["swap"]);
        assert!(!ledger.is_empty());
    }

    #[test]
    fn test_ledger_through_result() {
        let mut result = RunResult::new();
        result.failures_mut().record_failure("bridge", 1, "timeout");
        assert_eq!(result.failures().failed_steps(), ["bridge"]);
    }
}
