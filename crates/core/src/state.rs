//! Shared session state: the mapping every agent reads from and writes to.
//!
//! Keys are stable string identifiers; the last write to a key wins. The
//! state also remembers which keys were written since it was created or
//! forked, so a parallel composite can merge exactly what each child wrote.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Key/value state threaded through a workflow invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedState {
    values: BTreeMap<String, Value>,
    written: BTreeSet<String>,
}

impl SharedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state pre-populated with `values`. Seeded keys do not count
    /// as writes.
    pub fn seeded<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            written: BTreeSet::new(),
        }
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read a value as text, if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Render a value the way instruction templates see it: strings verbatim,
    /// everything else as compact JSON.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Whether `key` has a value.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Write a value, unconditionally replacing any previous one.
    /// Returns the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        self.written.insert(key.clone());
        self.values.insert(key, value.into())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// An independent copy of the current values with an empty write set.
    pub fn fork(&self) -> Self {
        Self {
            values: self.values.clone(),
            written: BTreeSet::new(),
        }
    }

    /// The keys written since creation or fork, with their current values.
    pub fn delta(&self) -> BTreeMap<String, Value> {
        self.written
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Apply a set of writes, in key order. Each applied key counts as a write.
    pub fn apply(&mut self, delta: BTreeMap<String, Value>) {
        for (key, value) in delta {
            self.set(key, value);
        }
    }
}
