//! In-memory backend
//!
//! Keeps the whole keyspace in a `HashMap` behind an `RwLock`. A transaction
//! holds the write lock for its whole duration and records the previous value
//! of every key it touches. Unless the transaction commits, the journal is
//! replayed when the transaction is dropped, which also covers a closure that
//! panics. The keyspace is therefore consistent after a poisoned lock and the
//! poison is ignored.

use crate::storage::backend::{Backend, KvRead, KvWrite};
use crate::storage::{StorageError, StorageResult};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Total order over scores so they can live in a `BTreeSet`
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Sorted set: member → score, plus (score, member) ordering
#[derive(Debug, Clone, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) -> bool {
        let previous = self.scores.insert(member.to_string(), score);
        if let Some(old) = previous {
            self.order.remove(&(Score(old), member.to_string()));
        }
        self.order.insert((Score(score), member.to_string()));
        previous.is_none()
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.order.remove(&(Score(score), member.to_string()));
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    ZSet(SortedSet),
}

fn wrong_kind(key: &str, expected: &'static str) -> StorageError {
    StorageError::WrongKind {
        key: key.to_string(),
        expected,
    }
}

/// The raw keyspace
#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<String, Value>,
}

impl Keyspace {
    fn set_at(&self, key: &str) -> StorageResult<Option<&BTreeSet<String>>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_kind(key, "set")),
        }
    }

    fn zset_at(&self, key: &str) -> StorageResult<Option<&SortedSet>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::ZSet(zset)) => Ok(Some(zset)),
            Some(_) => Err(wrong_kind(key, "sorted set")),
        }
    }
}

impl KvRead for Keyspace {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_kind(key, "string")),
        }
    }

    fn smembers(&self, key: &str) -> StorageResult<BTreeSet<String>> {
        Ok(self.set_at(key)?.cloned().unwrap_or_default())
    }

    fn scard(&self, key: &str) -> StorageResult<usize> {
        Ok(self.set_at(key)?.map(|s| s.len()).unwrap_or(0))
    }

    fn sismember(&self, key: &str, member: &str) -> StorageResult<bool> {
        Ok(self.set_at(key)?.map(|s| s.contains(member)).unwrap_or(false))
    }

    fn zcard(&self, key: &str) -> StorageResult<usize> {
        Ok(self.zset_at(key)?.map(|z| z.len()).unwrap_or(0))
    }

    fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>> {
        Ok(self
            .zset_at(key)?
            .and_then(|z| z.scores.get(member).copied()))
    }

    fn zrevrange(&self, key: &str, start: usize, stop: Option<usize>) -> StorageResult<Vec<String>> {
        let Some(zset) = self.zset_at(key)? else {
            return Ok(Vec::new());
        };
        let take = match stop {
            Some(stop) => stop.saturating_sub(start),
            None => usize::MAX,
        };
        Ok(zset
            .order
            .iter()
            .rev()
            .skip(start)
            .take(take)
            .map(|(_, member)| member.clone())
            .collect())
    }

    fn zrevrange_by_score(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        let Some(zset) = self.zset_at(key)? else {
            return Ok(Vec::new());
        };
        if Score(min) >= Score(max) {
            return Ok(Vec::new());
        }
        // (score, "") is the smallest tuple for a given score
        let lower = (Score(min), String::new());
        let upper = (Score(max), String::new());
        Ok(zset
            .order
            .range(lower..upper)
            .rev()
            .map(|(_, member)| member.clone())
            .collect())
    }
}

/// A write transaction over the locked keyspace with an undo journal
///
/// Dropping an uncommitted transaction rolls it back.
struct MemoryTxn<'a> {
    space: &'a mut Keyspace,
    undo: HashMap<String, Option<Value>>,
}

impl<'a> MemoryTxn<'a> {
    fn new(space: &'a mut Keyspace) -> Self {
        Self {
            space,
            undo: HashMap::new(),
        }
    }

    /// Remember the value of `key` before its first modification
    fn touch(&mut self, key: &str) {
        if !self.undo.contains_key(key) {
            let before = self.space.values.get(key).cloned();
            self.undo.insert(key.to_string(), before);
        }
    }

    /// Keep every write; the journal is discarded
    fn commit(mut self) {
        self.undo.clear();
    }

    fn rollback(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        let count = self.undo.len();
        for (key, before) in self.undo.drain() {
            match before {
                Some(value) => {
                    self.space.values.insert(key, value);
                }
                None => {
                    self.space.values.remove(&key);
                }
            }
        }
        tracing::debug!("Rolled back memory transaction touching {} keys", count);
    }

    fn set_mut(&mut self, key: &str) -> StorageResult<&mut BTreeSet<String>> {
        let value = self
            .space
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        match value {
            Value::Set(set) => Ok(set),
            _ => Err(wrong_kind(key, "set")),
        }
    }

    fn zset_mut(&mut self, key: &str) -> StorageResult<&mut SortedSet> {
        let value = self
            .space
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::ZSet(SortedSet::default()));
        match value {
            Value::ZSet(zset) => Ok(zset),
            _ => Err(wrong_kind(key, "sorted set")),
        }
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl KvRead for MemoryTxn<'_> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.space.get(key)
    }

    fn smembers(&self, key: &str) -> StorageResult<BTreeSet<String>> {
        self.space.smembers(key)
    }

    fn scard(&self, key: &str) -> StorageResult<usize> {
        self.space.scard(key)
    }

    fn sismember(&self, key: &str, member: &str) -> StorageResult<bool> {
        self.space.sismember(key, member)
    }

    fn zcard(&self, key: &str) -> StorageResult<usize> {
        self.space.zcard(key)
    }

    fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>> {
        self.space.zscore(key, member)
    }

    fn zrevrange(&self, key: &str, start: usize, stop: Option<usize>) -> StorageResult<Vec<String>> {
        self.space.zrevrange(key, start, stop)
    }

    fn zrevrange_by_score(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        self.space.zrevrange_by_score(key, min, max)
    }
}

impl KvWrite for MemoryTxn<'_> {
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(existing) = self.space.values.get(key) {
            if !matches!(existing, Value::Str(_)) {
                return Err(wrong_kind(key, "string"));
            }
        }
        self.touch(key);
        self.space
            .values
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    fn del(&mut self, key: &str) -> StorageResult<bool> {
        if !self.space.values.contains_key(key) {
            return Ok(false);
        }
        self.touch(key);
        Ok(self.space.values.remove(key).is_some())
    }

    fn sadd(&mut self, key: &str, member: &str) -> StorageResult<bool> {
        self.space.set_at(key)?;
        self.touch(key);
        Ok(self.set_mut(key)?.insert(member.to_string()))
    }

    fn srem(&mut self, key: &str, member: &str) -> StorageResult<bool> {
        if !self.space.sismember(key, member)? {
            return Ok(false);
        }
        self.touch(key);
        let set = self.set_mut(key)?;
        set.remove(member);
        if set.is_empty() {
            self.space.values.remove(key);
        }
        Ok(true)
    }

    fn zadd(&mut self, key: &str, member: &str, score: f64) -> StorageResult<bool> {
        self.space.zset_at(key)?;
        self.touch(key);
        Ok(self.zset_mut(key)?.insert(member, score))
    }

    fn zrem(&mut self, key: &str, member: &str) -> StorageResult<bool> {
        if self.space.zscore(key, member)?.is_none() {
            return Ok(false);
        }
        self.touch(key);
        let zset = self.zset_mut(key)?;
        zset.remove(member);
        if zset.is_empty() {
            self.space.values.remove(key);
        }
        Ok(true)
    }
}

/// In-process backend, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryBackend {
    space: RwLock<Keyspace>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn key_count(&self) -> StorageResult<usize> {
        Ok(self.read_space().values.len())
    }

    fn read_space(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.space.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_space(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.space.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Backend for MemoryBackend {
    fn read<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn KvRead) -> StorageResult<T>,
    {
        let space = self.read_space();
        f(&*space)
    }

    fn transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut dyn KvWrite) -> StorageResult<T>,
    {
        let mut space = self.write_space();
        let mut txn = MemoryTxn::new(&mut space);

        let value = f(&mut txn)?;
        txn.commit();
        Ok(value)
    }
}
