//! Key-value backend abstraction
//!
//! The indexing core only needs three kinds of values, modelled after Redis:
//!
//! - **strings**: `get` / `set` / `del`
//! - **sets**: `sadd` / `srem` / `smembers` / `scard`
//! - **sorted sets**: `zadd` / `zrem` / range by rank / range by score
//!
//! Reads go through [`Backend::read`]; every mutation goes through
//! [`Backend::transaction`], which either commits all writes made by the
//! closure or none of them.
//!
//! Collections that become empty are dropped, so an empty set and a missing
//! key are indistinguishable.

use crate::storage::StorageResult;
use std::collections::BTreeSet;

/// Read operations available to queries and inside transactions
pub trait KvRead {
    /// Get a string value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// All members of a set (empty if the key is missing)
    fn smembers(&self, key: &str) -> StorageResult<BTreeSet<String>>;

    /// Number of members in a set
    fn scard(&self, key: &str) -> StorageResult<usize>;

    fn sismember(&self, key: &str, member: &str) -> StorageResult<bool>;

    /// Number of members in a sorted set
    fn zcard(&self, key: &str) -> StorageResult<usize>;

    fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>>;

    /// Members by descending score, ranks `[start, stop)`.
    ///
    /// `stop = None` reads to the end. Equal scores are ordered by member,
    /// descending.
    fn zrevrange(&self, key: &str, start: usize, stop: Option<usize>) -> StorageResult<Vec<String>>;

    /// Members with `min <= score < max`, by descending score
    fn zrevrange_by_score(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>>;
}

/// Write operations, only reachable inside [`Backend::transaction`]
pub trait KvWrite: KvRead {
    /// Set a string value, replacing any previous one
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a key of any kind. Returns whether it existed.
    fn del(&mut self, key: &str) -> StorageResult<bool>;

    /// Add a member to a set. Returns whether it was newly added.
    fn sadd(&mut self, key: &str, member: &str) -> StorageResult<bool>;

    /// Remove a member from a set. Returns whether it was present.
    fn srem(&mut self, key: &str, member: &str) -> StorageResult<bool>;

    /// Add or re-score a sorted set member. Returns whether it was newly added.
    fn zadd(&mut self, key: &str, member: &str, score: f64) -> StorageResult<bool>;

    /// Remove a sorted set member. Returns whether it was present.
    fn zrem(&mut self, key: &str, member: &str) -> StorageResult<bool>;
}

/// A shared key-value store handle
///
/// Implementations must make [`Backend::transaction`] atomic: if the closure
/// returns an error (or the backend fails while committing) no write made by
/// the closure is visible afterwards.
pub trait Backend: Send + Sync {
    /// Run read-only operations against a committed state
    fn read<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn KvRead) -> StorageResult<T>;

    /// Run reads and writes as one atomic unit
    fn transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut dyn KvWrite) -> StorageResult<T>;
}
