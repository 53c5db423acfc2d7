//! Ordered, duplicate-permitting store of named step results.
//!
//! Every write is kept by position, while lookups by name see the most recent
//! write for that name. Registering two steps with the same name therefore
//! yields two positional entries but a single named one.

use std::collections::HashMap;

use serde_json::Value;

/// Dual-indexed store of `(name, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    entries: Vec<(String, Value)>,
    latest: HashMap<String, usize>,
}

impl ResultStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. A later write for the same name shadows earlier ones
    /// in named lookups but never removes them from positional access.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.latest.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
    }

    /// The latest value written under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.latest.get(name).map(|&index| &self.entries[index].1)
    }

    /// The value written at `index`, in write order.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, value)| value)
    }

    /// Returns `true` if anything was written under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.latest.contains_key(name)
    }

    /// Number of writes, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct names.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.latest.len()
    }

    /// All values in write order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// All `(name, value)` pairs in write order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Snapshot of the latest value per name.
    #[must_use]
    pub fn by_name(&self) -> HashMap<&str, &Value> {
        self.latest
            .iter()
            .map(|(name, &index)| (name.as_str(), &self.entries[index].1))
            .collect()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_names_keep_every_write() {
        let mut store = ResultStore::new();
        store.insert("quote", json!(1));
        store.insert("approve", json!("0xabc"));
        store.insert("quote", json!(2));

        assert_eq!(store.len(), 3);
        assert_eq!(store.name_count(), 2);
        assert_eq!(store.get("quote"), Some(&json!(2)));
        assert_eq!(store.get_index(0), Some(&json!(1)));
        assert_eq!(store.get_index(2), Some(&json!(2)));
        assert_eq!(store.by_name().get("quote"), Some(&&json!(2)));
    }

    #[test]
    fn test_iteration_order() {
        let mut store = ResultStore::new();
        store.insert("a", json!("first"));
        store.insert("b", json!("second"));

        let names: Vec<&str> = store.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["a", "b"]);
        let values: Vec<&Value> = store.values().collect();
        assert_eq!(values, [&json!("first"), &json!("second")]);
    }

    #[test]
    fn test_missing_and_clear() {
        let mut store = ResultStore::new();
        assert!(store.is_empty());
        assert!(store.get("missing").is_none());
        assert!(store.get_index(0).is_none());

        store.insert("a", Value::Null);
        assert!(store.contains("a"));
        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains("a"));
    }
}
