//! Per-device persistent key/value store
//!
//! Bindings live across rounds until explicitly removed. `commit` is the
//! only operation guaranteed to make writes durable across a round
//! boundary; an implementation may buffer `put` and flush in `commit`, or
//! apply immediately. Cross-device isolation is total: each device owns its
//! own environment.

use std::collections::HashMap;

use crate::interpreter::value::Value;

/// Contract for the device-scoped store.
pub trait ExecutionEnvironment {
    /// One-time initialization, called before the first round.
    fn setup(&mut self) {}

    /// Flush buffered mutation so it is visible to the next round. Called
    /// once at the end of each round.
    fn commit(&mut self) {}

    fn has(&self, id: &str) -> bool;

    fn get(&self, id: &str) -> Option<Value>;

    /// Read with a default; never absent.
    fn get_or(&self, id: &str, default: Value) -> Value {
        self.get(id).unwrap_or(default)
    }

    /// Write a binding; returns whether the write was accepted.
    fn put(&mut self, id: &str, value: Value) -> bool;

    /// Remove a binding, returning the previous value if any.
    fn remove(&mut self, id: &str) -> Option<Value>;
}

/// Map-backed environment applying writes immediately; `commit` and `setup`
/// have nothing to do, which trivially satisfies round-boundary visibility.
#[derive(Debug, Default)]
pub struct SimpleExecutionEnvironment {
    bindings: HashMap<String, Value>,
}

impl SimpleExecutionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionEnvironment for SimpleExecutionEnvironment {
    fn has(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<Value> {
        self.bindings.get(id).cloned()
    }

    fn put(&mut self, id: &str, value: Value) -> bool {
        self.bindings.insert(id.to_string(), value);
        true
    }

    fn remove(&mut self, id: &str) -> Option<Value> {
        self.bindings.remove(id)
    }
}
