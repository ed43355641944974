//! Bookmark Store
//!
//! The public entry point: one handle that owns the backend and routes
//! writes to the [`IndexManager`] and reads to the [`QueryEngine`].
//!
//! ```text
//! add_entry / remove_entry        → IndexManager → Backend::transaction
//! get_* / group_by_domain / stats → QueryEngine  → Backend::read
//! ```

use crate::config::StorageConfig;
use crate::entry::{Entry, EntryId, RawEntry};
use crate::error::BookmarkResult;
use crate::index::{IndexManager, IndexStats, Violation};
use crate::query::{DomainGroup, Pager, QueryEngine};
use crate::storage::{Backend, MemoryBackend, SqliteBackend, StorageResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Bookmark storage over a key-value backend
pub struct BookmarkStore<B: Backend> {
    indexes: IndexManager<B>,
    queries: QueryEngine<B>,
}

impl BookmarkStore<SqliteBackend> {
    /// Open (or create) the SQLite database named by the configuration
    pub fn open_sqlite(config: &StorageConfig) -> StorageResult<Self> {
        let path = config.db_path();
        tracing::info!("Opening bookmark store at {:?}", path);
        Ok(Self::new(Arc::new(SqliteBackend::open(&path)?)))
    }
}

impl BookmarkStore<MemoryBackend> {
    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }
}

impl<B: Backend> BookmarkStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            indexes: IndexManager::new(Arc::clone(&backend)),
            queries: QueryEngine::new(backend),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        self.indexes.backend()
    }

    // ==================== Writes ====================

    /// Validate, store and index an entry. Returns its id.
    pub fn add_entry(&self, raw: &RawEntry) -> BookmarkResult<EntryId> {
        self.indexes.add(raw)
    }

    /// Like [`add_entry`](Self::add_entry) with an explicit creation instant
    pub fn add_entry_at(&self, raw: &RawEntry, created_at: DateTime<Utc>) -> BookmarkResult<EntryId> {
        self.indexes.add_at(raw, created_at)
    }

    /// Remove an entry and its index memberships. `false` if it was absent.
    pub fn remove_entry(&self, id: &EntryId) -> StorageResult<bool> {
        self.indexes.remove(id)
    }

    // ==================== Entries ====================

    pub fn get_entry(&self, id: &EntryId) -> StorageResult<Option<Entry>> {
        self.queries.get(id)
    }

    pub fn get_entries(&self, ids: &[EntryId]) -> StorageResult<Vec<Option<Entry>>> {
        self.queries.get_many(ids)
    }

    /// Ids by creation time, newest first, ranks `[start, end)`.
    ///
    /// `end = None` reads to the oldest entry.
    pub fn get_all_entries(&self, start: usize, end: Option<usize>) -> StorageResult<Vec<EntryId>> {
        self.queries
            .list_by_rank(start, end.map(|end| end.saturating_sub(start)))
    }

    /// Page cursor starting at `page_index`
    pub fn get_paged_entries(&self, page_index: usize, page_size: usize) -> Pager<'_, B> {
        self.queries.paged(page_index, page_size)
    }

    /// Ids created on the UTC day `days_ago` days before today
    pub fn get_page_by_day(&self, days_ago: u32) -> StorageResult<Vec<EntryId>> {
        self.queries.list_by_day(days_ago)
    }

    pub fn get_page_by_day_at(&self, days_ago: u32, now: DateTime<Utc>) -> StorageResult<Vec<EntryId>> {
        self.queries.list_by_day_at(days_ago, now)
    }

    pub fn group_by_domain(&self, ids: &[EntryId]) -> StorageResult<Vec<DomainGroup>> {
        self.queries.group_by_domain(ids)
    }

    // ==================== Tags & Domains ====================

    pub fn get_all_tags(&self) -> StorageResult<BTreeSet<String>> {
        self.queries.tags()
    }

    pub fn get_all_domains(&self) -> StorageResult<BTreeSet<String>> {
        self.queries.domains()
    }

    pub fn get_entries_for_tag(&self, tag: &str) -> StorageResult<BTreeSet<EntryId>> {
        self.queries.entries_for_tag(tag)
    }

    pub fn get_entries_for_domain(&self, domain: &str) -> StorageResult<BTreeSet<EntryId>> {
        self.queries.entries_for_domain(domain)
    }

    pub fn get_entries_with_all_tags(&self, tags: &[&str]) -> StorageResult<BTreeSet<EntryId>> {
        self.queries.entries_with_all_tags(tags)
    }

    pub fn get_entries_with_any_tag(&self, tags: &[&str]) -> StorageResult<BTreeSet<EntryId>> {
        self.queries.entries_with_any_tag(tags)
    }

    // ==================== Maintenance ====================

    pub fn stats(&self) -> StorageResult<IndexStats> {
        self.queries.stats()
    }

    /// Cross-check entries against the indexes
    pub fn validate(&self) -> StorageResult<Vec<Violation>> {
        self.indexes.validate()
    }
}
