//! Join strategies for matching related rows to their parents.
//!
//! This module provides two algorithms for associating child rows with
//! parent rows on a key:
//! - NestedLoop: Simple O(N*M) approach for small batches
//! - HashJoin: O(N+M) approach using hash table lookups

use std::collections::HashMap;

use relq_proto::{Row, Value};

/// Parent and child batch sizes above which hash joins are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinThreshold {
    /// Parent rows in the batch.
    pub parent_count: usize,
    /// Child rows in the batch.
    pub child_count: usize,
}

impl Default for JoinThreshold {
    fn default() -> Self {
        Self {
            parent_count: 100,
            child_count: 1000,
        }
    }
}

/// Join strategy selection for relation resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Nested loop join - O(N*M), best for small batches.
    NestedLoop,
    /// Hash join - O(N+M), best for larger batches.
    HashJoin,
}

impl JoinStrategy {
    /// Select the join strategy based on batch sizes.
    ///
    /// Uses hash join when either side exceeds its threshold, otherwise
    /// nested loop for lower overhead on small sets.
    pub fn select(parent_count: usize, child_count: usize, threshold: &JoinThreshold) -> Self {
        if parent_count > threshold.parent_count || child_count > threshold.child_count {
            JoinStrategy::HashJoin
        } else {
            JoinStrategy::NestedLoop
        }
    }
}

/// A hashable normalization of a join value.
///
/// Two non-null values share a key exactly when [`Value::matches`] holds
/// between them, so hash joins and nested loops agree. Integers of both
/// widths and integral floats share integer keys, other floats key on their
/// bit pattern, and a UUID keys on its lowercase hex text. Null and NaN
/// never join.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
}

impl JoinKey {
    /// Normalize a value, `None` for values that match nothing else.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(i) = value.as_exact_i64() {
            return Some(JoinKey::Int(i));
        }
        let key = match value {
            Value::Null => return None,
            Value::Float64(v) if v.is_nan() => return None,
            Value::Float64(v) => JoinKey::Float(v.to_bits()),
            Value::Bool(b) => JoinKey::Bool(*b),
            Value::String(s) => JoinKey::Text(s.clone()),
            Value::Bytes(b) => JoinKey::Bytes(b.clone()),
            Value::Timestamp(t) => JoinKey::Timestamp(*t),
            Value::Uuid(u) => JoinKey::Text(hex::encode(u)),
            Value::Int32(_) | Value::Int64(_) => return None,
        };
        Some(key)
    }
}

/// For each parent key, the indices of `children` whose `child_field` matches it.
///
/// Child indices are returned in child order. A `None` parent key matches nothing.
pub fn match_children(
    strategy: JoinStrategy,
    parent_keys: &[Option<Value>],
    children: &[Row],
    child_field: &str,
) -> Vec<Vec<usize>> {
    match strategy {
        JoinStrategy::NestedLoop => nested_loop(parent_keys, children, child_field),
        JoinStrategy::HashJoin => hash_join(parent_keys, children, child_field),
    }
}

/// For each child, check every parent key.
fn nested_loop(parent_keys: &[Option<Value>], children: &[Row], child_field: &str) -> Vec<Vec<usize>> {
    parent_keys
        .iter()
        .map(|key| match key {
            Some(key) if !key.is_null() => children
                .iter()
                .enumerate()
                .filter(|(_, child)| child.get(child_field).is_some_and(|v| v.matches(key)))
                .map(|(idx, _)| idx)
                .collect(),
            _ => Vec::new(),
        })
        .collect()
}

/// Build phase over children keyed on `child_field`, then probe per parent.
fn hash_join(parent_keys: &[Option<Value>], children: &[Row], child_field: &str) -> Vec<Vec<usize>> {
    let mut by_key: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (idx, child) in children.iter().enumerate() {
        if let Some(key) = child.get(child_field).and_then(JoinKey::from_value) {
            by_key.entry(key).or_default().push(idx);
        }
    }

    parent_keys
        .iter()
        .map(|key| {
            key.as_ref()
                .and_then(JoinKey::from_value)
                .and_then(|k| by_key.get(&k).cloned())
                .unwrap_or_default()
        })
        .collect()
}
