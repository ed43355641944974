//! Index Manager - Writes entries and keeps every index consistent
//!
//! Each mutation runs in a single backend transaction, so a failure part-way
//! leaves no partially-applied index state.
//!
//! # Reference counting
//!
//! ```text
//! remove(E1) where E1.tags = {a, b}, E2.tags = {b, c}
//!
//! 1. srem tag:a E1 → tag:a is empty → del tag:a, srem tag_index a
//! 2. srem tag:b E1 → tag:b = {E2}    → keep
//! 3. same for domain:<E1.domain>
//! 4. zrem entry_index E1, del entry:E1
//! ```
//!
//! Emptiness is always checked after the id has left the set.
//!
//! # Re-adding a URL
//!
//! The id is a hash of the URL, so adding the same URL again overwrites the
//! body and re-scores the time index. Memberships derived from the previous
//! version's tags or domain are not removed.

use crate::entry::{decode, derive_at, encode, validate, Entry, EntryId, RawEntry};
use crate::error::BookmarkResult;
use crate::index::{domain_key, entry_key, tag_key, DOMAIN_INDEX, ENTRY_INDEX, TAG_INDEX};
use crate::storage::{Backend, KvWrite, StorageResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Owns all writes to entry bodies and index keys
pub struct IndexManager<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> IndexManager<B> {
    /// Create a new index manager over a shared backend
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    // ==================== Write Methods ====================

    /// Validate, derive and store an entry created now
    pub fn add(&self, raw: &RawEntry) -> BookmarkResult<EntryId> {
        self.add_at(raw, Utc::now())
    }

    /// Validate, derive and store an entry with an explicit creation instant
    ///
    /// Validation happens before the transaction starts; a rejected entry
    /// never touches the backend.
    pub fn add_at(&self, raw: &RawEntry, created_at: DateTime<Utc>) -> BookmarkResult<EntryId> {
        let validated = validate(raw)?;
        let entry = derive_at(validated, created_at);
        self.insert(&entry)?;
        Ok(entry.id)
    }

    /// Write an already-derived entry and all its index memberships
    pub fn insert(&self, entry: &Entry) -> StorageResult<()> {
        let body = encode(entry)?;

        self.backend.transaction(|kv| {
            if kv.zscore(ENTRY_INDEX, entry.id.as_str())?.is_some() {
                tracing::warn!(
                    "Entry {} already exists; overwriting body, stale memberships are kept",
                    entry.id
                );
            }

            // 1. Entry body
            kv.set(&entry_key(&entry.id), &body)?;

            // 2. Time index
            kv.zadd(ENTRY_INDEX, entry.id.as_str(), entry.score())?;

            // 3. Tags
            for tag in &entry.tags {
                kv.sadd(&tag_key(tag), entry.id.as_str())?;
                kv.sadd(TAG_INDEX, tag)?;
            }

            // 4. Domain ("" for URLs without a host)
            kv.sadd(&domain_key(&entry.domain), entry.id.as_str())?;
            kv.sadd(DOMAIN_INDEX, &entry.domain)?;

            Ok(())
        })?;

        tracing::debug!(
            "Added entry {} ({} tags, domain {:?})",
            entry.id,
            entry.tags.len(),
            entry.domain
        );
        Ok(())
    }

    /// Remove an entry and clean up tags/domains left without entries
    ///
    /// Returns `false` (and changes nothing) if no entry has this id.
    pub fn remove(&self, id: &EntryId) -> StorageResult<bool> {
        let removed = self.backend.transaction(|kv| {
            let key = entry_key(id);
            let Some(body) = kv.get(&key)? else {
                return Ok(false);
            };

            match decode(Some(body.as_str())) {
                Some(entry) => {
                    for tag in &entry.tags {
                        release(kv, &tag_key(tag), TAG_INDEX, tag, id)?;
                    }
                    release(kv, &domain_key(&entry.domain), DOMAIN_INDEX, &entry.domain, id)?;
                }
                None => {
                    tracing::warn!(
                        "Entry {} has an unreadable body; its tag and domain memberships are left in place",
                        id
                    );
                }
            }

            kv.zrem(ENTRY_INDEX, id.as_str())?;
            kv.del(&key)?;
            Ok(true)
        })?;

        if removed {
            tracing::debug!("Removed entry {}", id);
        }
        Ok(removed)
    }
}

/// Drop `id` from a membership set; if the set is now empty, delete it and
/// take `name` out of its catalog.
fn release(
    kv: &mut dyn KvWrite,
    members_key: &str,
    catalog: &str,
    name: &str,
    id: &EntryId,
) -> StorageResult<()> {
    kv.srem(members_key, id.as_str())?;

    if kv.scard(members_key)? == 0 {
        kv.del(members_key)?;
        kv.srem(catalog, name)?;
        tracing::debug!("Dropped {} from {}", name, catalog);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvRead, MemoryBackend, SqliteBackend, StorageError};
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawEntry {
        value.as_object().cloned().unwrap()
    }

    fn bookmark(url: &str, tags: &[&str]) -> RawEntry {
        raw(json!({"url": url, "title": format!("Title of {}", url), "tags": tags}))
    }

    fn create_test_manager() -> IndexManager<MemoryBackend> {
        IndexManager::new(Arc::new(MemoryBackend::new()))
    }

    fn snapshot<B: Backend>(manager: &IndexManager<B>, keys: &[&str]) -> Vec<String> {
        manager
            .backend()
            .read(|kv| {
                let mut out = Vec::new();
                for key in keys {
                    out.push(format!("{}={:?}", key, kv.smembers(key)?));
                }
                out.push(format!("zcard={}", kv.zcard(ENTRY_INDEX)?));
                Ok(out)
            })
            .unwrap()
    }

    #[test]
    fn test_add_writes_all_indexes() {
        let manager = create_test_manager();
        let id = manager
            .add(&bookmark("https://example.com/a", &["rust", "db"]))
            .unwrap();

        manager
            .backend()
            .read(|kv: &dyn KvRead| {
                assert!(kv.get(&entry_key(&id))?.is_some());
                assert!(kv.zscore(ENTRY_INDEX, id.as_str())?.is_some());
                assert!(kv.sismember(&tag_key("rust"), id.as_str())?);
                assert!(kv.sismember(&tag_key("db"), id.as_str())?);
                assert!(kv.sismember(TAG_INDEX, "rust")?);
                assert!(kv.sismember(&domain_key("example.com"), id.as_str())?);
                assert!(kv.sismember(DOMAIN_INDEX, "example.com")?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_add_returns_url_hash() {
        let manager = create_test_manager();
        let id = manager.add(&bookmark("https://example.com/a", &[])).unwrap();
        assert_eq!(id, EntryId::for_url("https://example.com/a"));
    }

    #[test]
    fn test_validation_failure_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = IndexManager::new(Arc::clone(&backend));

        let err = manager
            .add(&raw(json!({"title": "x", "tags": []})))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.key_count().unwrap(), 0);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let manager = create_test_manager();
        manager.add(&bookmark("https://example.com/a", &["a"])).unwrap();
        let before = snapshot(&manager, &[TAG_INDEX, DOMAIN_INDEX]);

        let removed = manager.remove(&EntryId::from("does-not-exist")).unwrap();
        assert!(!removed);
        assert_eq!(snapshot(&manager, &[TAG_INDEX, DOMAIN_INDEX]), before);
    }

    #[test]
    fn test_remove_reference_counts_tags() {
        let manager = create_test_manager();
        let e1 = manager.add(&bookmark("https://x.com/1", &["a", "b"])).unwrap();
        let e2 = manager.add(&bookmark("https://x.com/2", &["b", "c"])).unwrap();

        assert!(manager.remove(&e1).unwrap());
        manager
            .backend()
            .read(|kv| {
                assert!(!kv.sismember(TAG_INDEX, "a")?);
                assert_eq!(kv.scard(&tag_key("a"))?, 0);
                assert!(kv.sismember(TAG_INDEX, "b")?);
                assert_eq!(kv.scard(&tag_key("b"))?, 1);
                assert!(kv.sismember(DOMAIN_INDEX, "x.com")?);
                Ok(())
            })
            .unwrap();

        assert!(manager.remove(&e2).unwrap());
        manager
            .backend()
            .read(|kv| {
                assert_eq!(kv.scard(TAG_INDEX)?, 0);
                assert_eq!(kv.scard(DOMAIN_INDEX)?, 0);
                assert_eq!(kv.zcard(ENTRY_INDEX)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_remove_twice() {
        let manager = create_test_manager();
        let id = manager.add(&bookmark("https://x.com/1", &["a"])).unwrap();
        assert!(manager.remove(&id).unwrap());
        assert!(!manager.remove(&id).unwrap());
    }

    #[test]
    fn test_readd_keeps_stale_memberships() {
        let manager = create_test_manager();
        let first = manager.add(&bookmark("https://x.com/1", &["old"])).unwrap();
        let second = manager.add(&bookmark("https://x.com/1", &["new"])).unwrap();
        assert_eq!(first, second);

        manager.remove(&second).unwrap();
        manager
            .backend()
            .read(|kv| {
                // "new" was cleaned up with the current body, "old" leaks
                assert!(!kv.sismember(TAG_INDEX, "new")?);
                assert!(kv.sismember(TAG_INDEX, "old")?);
                assert!(kv.sismember(&tag_key("old"), second.as_str())?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_entry_without_host_is_indexed_under_empty_domain() {
        let manager = create_test_manager();
        let id = manager.add(&bookmark("no-scheme/path", &["a"])).unwrap();
        let other = manager.add(&bookmark("not a url", &[])).unwrap();
        manager
            .backend()
            .read(|kv| {
                assert!(kv.sismember(DOMAIN_INDEX, "")?);
                assert_eq!(kv.scard(&domain_key(""))?, 2);
                assert_eq!(domain_key(""), "domain:");
                Ok(())
            })
            .unwrap();

        assert!(manager.remove(&id).unwrap());
        assert!(manager.remove(&other).unwrap());
        manager
            .backend()
            .read(|kv| {
                assert_eq!(kv.scard(DOMAIN_INDEX)?, 0);
                assert_eq!(kv.scard(&domain_key(""))?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_remove_with_unreadable_body() {
        let manager = create_test_manager();
        let id = EntryId::from("broken");
        manager
            .backend()
            .transaction(|kv| {
                kv.set(&entry_key(&id), "{not json")?;
                kv.zadd(ENTRY_INDEX, id.as_str(), 1.0)?;
                Ok(())
            })
            .unwrap();

        assert!(manager.remove(&id).unwrap());
        manager
            .backend()
            .read(|kv| {
                assert!(kv.get(&entry_key(&id))?.is_none());
                assert_eq!(kv.zcard(ENTRY_INDEX)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_sqlite_backend() {
        let manager = IndexManager::new(Arc::new(SqliteBackend::in_memory().unwrap()));
        let id = manager.add(&bookmark("https://x.com/1", &["a"])).unwrap();
        assert!(manager.remove(&id).unwrap());
        manager
            .backend()
            .read(|kv| {
                assert_eq!(kv.scard(TAG_INDEX)?, 0);
                assert_eq!(kv.scard(DOMAIN_INDEX)?, 0);
                Ok(())
            })
            .unwrap();
    }

    /// Backend whose transactions always fail after running the closure
    struct FailingBackend {
        inner: MemoryBackend,
    }

    impl Backend for FailingBackend {
        fn read<T, F>(&self, f: F) -> StorageResult<T>
        where
            F: FnOnce(&dyn KvRead) -> StorageResult<T>,
        {
            self.inner.read(f)
        }

        fn transaction<T, F>(&self, f: F) -> StorageResult<T>
        where
            F: FnOnce(&mut dyn KvWrite) -> StorageResult<T>,
        {
            self.inner.transaction(|kv| -> StorageResult<T> {
                f(kv)?;
                Err(StorageError::Unavailable("connection lost".to_string()))
            })
        }
    }

    #[test]
    fn test_backend_failure_surfaces_and_leaves_no_partial_state() {
        let backend = Arc::new(FailingBackend {
            inner: MemoryBackend::new(),
        });
        let manager = IndexManager::new(Arc::clone(&backend));

        let err = manager
            .add(&bookmark("https://x.com/1", &["a", "b"]))
            .unwrap_err();
        assert!(!err.is_validation());
        assert_eq!(backend.inner.key_count().unwrap(), 0);
    }
}
