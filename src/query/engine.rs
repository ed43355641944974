//! Query Engine
//!
//! Read-only access to entries and indexes. Queries take no write lock and
//! see whatever state the backend has committed when they run.
//!
//! # Query paths
//!
//! ```text
//! rank   → entry_index (zrevrange)           → ids, newest first
//! day    → entry_index (zrevrange_by_score)  → ids, newest first
//! tag    → tag:<name>                        → id set
//! domain → domain:<name>                     → id set
//! ids    → entry:<id>                        → decoded entries
//! ```

use crate::entry::{decode, Entry, EntryId};
use crate::index::{
    domain_key, entry_key, tag_key, IndexStats, DOMAIN_INDEX, ENTRY_INDEX, TAG_INDEX,
};
use crate::query::{group_entries, DayRange, DomainGroup, Pager};
use crate::storage::{Backend, KvRead, StorageResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Read-only queries over a shared backend
pub struct QueryEngine<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> QueryEngine<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    // ==================== Time Index ====================

    /// Ids ordered by creation time, newest first, ranks `[offset, offset + limit)`.
    ///
    /// `limit = None` reads to the end.
    pub fn list_by_rank(&self, offset: usize, limit: Option<usize>) -> StorageResult<Vec<EntryId>> {
        let stop = limit.map(|l| offset.saturating_add(l));
        let ids = self
            .backend
            .read(|kv| kv.zrevrange(ENTRY_INDEX, offset, stop))?;
        Ok(ids.into_iter().map(EntryId::from).collect())
    }

    /// Start a page cursor at `page_index`
    pub fn paged(&self, page_index: usize, page_size: usize) -> Pager<'_, B> {
        Pager::new(self, page_index, page_size)
    }

    /// Ids created on the UTC day `days_ago` days before today, newest first
    pub fn list_by_day(&self, days_ago: u32) -> StorageResult<Vec<EntryId>> {
        self.list_by_day_at(days_ago, Utc::now())
    }

    /// Like [`list_by_day`](Self::list_by_day) with an explicit "now"
    pub fn list_by_day_at(&self, days_ago: u32, now: DateTime<Utc>) -> StorageResult<Vec<EntryId>> {
        let Some(range) = DayRange::days_ago(days_ago, now) else {
            return Ok(Vec::new());
        };

        let ids = self.backend.read(|kv| {
            kv.zrevrange_by_score(ENTRY_INDEX, range.start_score(), range.end_score())
        })?;
        Ok(ids.into_iter().map(EntryId::from).collect())
    }

    // ==================== Entries ====================

    /// Look up one entry
    pub fn get(&self, id: &EntryId) -> StorageResult<Option<Entry>> {
        self.backend.read(|kv| load(kv, id))
    }

    /// Look up several entries, preserving input order
    pub fn get_many(&self, ids: &[EntryId]) -> StorageResult<Vec<Option<Entry>>> {
        self.backend
            .read(|kv| ids.iter().map(|id| load(kv, id)).collect())
    }

    /// Decode `ids` and group them by domain
    ///
    /// Ids without a readable entry are skipped.
    pub fn group_by_domain(&self, ids: &[EntryId]) -> StorageResult<Vec<DomainGroup>> {
        let entries = self.get_many(ids)?;
        Ok(group_entries(entries.into_iter().flatten()))
    }

    // ==================== Tags & Domains ====================

    /// All tags referenced by at least one entry
    pub fn tags(&self) -> StorageResult<BTreeSet<String>> {
        self.backend.read(|kv| kv.smembers(TAG_INDEX))
    }

    /// Ids of entries carrying `tag`
    pub fn entries_for_tag(&self, tag: &str) -> StorageResult<BTreeSet<EntryId>> {
        self.members(&tag_key(tag))
    }

    /// All domains referenced by at least one entry
    pub fn domains(&self) -> StorageResult<BTreeSet<String>> {
        self.backend.read(|kv| kv.smembers(DOMAIN_INDEX))
    }

    /// Ids of entries whose URL is on `domain`
    pub fn entries_for_domain(&self, domain: &str) -> StorageResult<BTreeSet<EntryId>> {
        self.members(&domain_key(domain))
    }

    /// Ids carrying every one of `tags` (intersection)
    ///
    /// An empty tag list matches nothing.
    pub fn entries_with_all_tags(&self, tags: &[&str]) -> StorageResult<BTreeSet<EntryId>> {
        if tags.is_empty() {
            return Ok(BTreeSet::new());
        }

        self.backend.read(|kv| {
            let mut result: Option<BTreeSet<String>> = None;

            for tag in tags {
                let members = kv.smembers(&tag_key(tag))?;
                result = Some(match result {
                    Some(existing) => existing.intersection(&members).cloned().collect(),
                    None => members,
                });
                if result.as_ref().map(|r| r.is_empty()).unwrap_or(false) {
                    break;
                }
            }

            Ok(result
                .unwrap_or_default()
                .into_iter()
                .map(EntryId::from)
                .collect())
        })
    }

    /// Ids carrying at least one of `tags` (union)
    pub fn entries_with_any_tag(&self, tags: &[&str]) -> StorageResult<BTreeSet<EntryId>> {
        self.backend.read(|kv| {
            let mut result = BTreeSet::new();
            for tag in tags {
                result.extend(kv.smembers(&tag_key(tag))?.into_iter().map(EntryId::from));
            }
            Ok(result)
        })
    }

    fn members(&self, key: &str) -> StorageResult<BTreeSet<EntryId>> {
        let members = self.backend.read(|kv| kv.smembers(key))?;
        Ok(members.into_iter().map(EntryId::from).collect())
    }

    // ==================== Stats ====================

    /// Sizes of the time index and both catalogs
    pub fn stats(&self) -> StorageResult<IndexStats> {
        self.backend.read(|kv| {
            Ok(IndexStats {
                entries: kv.zcard(ENTRY_INDEX)?,
                tags: kv.scard(TAG_INDEX)?,
                domains: kv.scard(DOMAIN_INDEX)?,
            })
        })
    }
}

fn load(kv: &dyn KvRead, id: &EntryId) -> StorageResult<Option<Entry>> {
    let body = kv.get(&entry_key(id))?;
    Ok(decode(body.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RawEntry;
    use crate::index::IndexManager;
    use crate::storage::{KvWrite, MemoryBackend};
    use chrono::Duration;
    use serde_json::json;

    struct Fixture {
        indexes: IndexManager<MemoryBackend>,
        queries: QueryEngine<MemoryBackend>,
    }

    fn create_fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        Fixture {
            indexes: IndexManager::new(Arc::clone(&backend)),
            queries: QueryEngine::new(backend),
        }
    }

    fn bookmark(url: &str, tags: &[&str]) -> RawEntry {
        json!({"url": url, "title": "title", "tags": tags})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    /// Add `count` entries one minute apart, oldest first
    fn add_sequence(fixture: &Fixture, count: usize) -> Vec<EntryId> {
        let base = at("2024-01-01T00:00:00Z");
        (0..count)
            .map(|i| {
                fixture
                    .indexes
                    .add_at(
                        &bookmark(&format!("https://example.com/{}", i), &[]),
                        base + Duration::minutes(i as i64),
                    )
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_list_by_rank_newest_first() {
        let fixture = create_fixture();
        let added = add_sequence(&fixture, 5);

        let ids = fixture.queries.list_by_rank(0, Some(5)).unwrap();
        let expected: Vec<EntryId> = added.iter().rev().cloned().collect();
        assert_eq!(ids, expected);

        let slice = fixture.queries.list_by_rank(1, Some(2)).unwrap();
        assert_eq!(slice, vec![added[3].clone(), added[2].clone()]);

        let to_end = fixture.queries.list_by_rank(3, None).unwrap();
        assert_eq!(to_end, vec![added[1].clone(), added[0].clone()]);

        assert!(fixture.queries.list_by_rank(10, Some(5)).unwrap().is_empty());
    }

    #[test]
    fn test_paged() {
        let fixture = create_fixture();
        let added = add_sequence(&fixture, 5);

        let pages: Vec<Vec<EntryId>> = fixture
            .queries
            .paged(0, 2)
            .collect::<StorageResult<_>>()
            .unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], vec![added[4].clone(), added[3].clone()]);
        assert_eq!(pages[2], vec![added[0].clone()]);

        // Starting later yields the remaining pages only
        let mut pager = fixture.queries.paged(1, 2);
        assert_eq!(pager.next().unwrap().unwrap().len(), 2);
        assert_eq!(pager.next_page_index(), 2);
        assert_eq!(pager.next().unwrap().unwrap().len(), 1);
        assert!(pager.next().is_none());
        assert!(pager.next().is_none());

        // Each call restarts
        assert_eq!(fixture.queries.paged(0, 2).count(), 3);
        assert_eq!(fixture.queries.paged(0, 0).count(), 0);
        assert_eq!(fixture.queries.paged(9, 2).count(), 0);
    }

    #[test]
    fn test_list_by_day() {
        let fixture = create_fixture();
        let now = at("2024-03-10T12:00:00Z");

        let today_early = fixture
            .indexes
            .add_at(&bookmark("https://a.com/1", &[]), at("2024-03-10T00:00:00Z"))
            .unwrap();
        let today_late = fixture
            .indexes
            .add_at(&bookmark("https://a.com/2", &[]), at("2024-03-10T23:59:59Z"))
            .unwrap();
        let yesterday = fixture
            .indexes
            .add_at(&bookmark("https://a.com/3", &[]), at("2024-03-09T23:59:59Z"))
            .unwrap();
        fixture
            .indexes
            .add_at(&bookmark("https://a.com/4", &[]), at("2024-03-11T00:00:00Z"))
            .unwrap();

        let today = fixture.queries.list_by_day_at(0, now).unwrap();
        assert_eq!(today, vec![today_late, today_early]);

        let previous = fixture.queries.list_by_day_at(1, now).unwrap();
        assert_eq!(previous, vec![yesterday]);

        assert!(fixture.queries.list_by_day_at(2, now).unwrap().is_empty());
    }

    #[test]
    fn test_get_and_get_many() {
        let fixture = create_fixture();
        let id = fixture
            .indexes
            .add(&bookmark("https://example.com/x", &["a", "b"]))
            .unwrap();

        let entry = fixture.queries.get(&id).unwrap().unwrap();
        assert_eq!(entry.url, "https://example.com/x");
        assert_eq!(entry.domain, "example.com");

        let missing = EntryId::from("missing");
        let many = fixture
            .queries
            .get_many(&[missing.clone(), id.clone(), missing])
            .unwrap();
        assert_eq!(many.len(), 3);
        assert!(many[0].is_none());
        assert_eq!(many[1].as_ref().map(|e| &e.id), Some(&id));
        assert!(many[2].is_none());
    }

    #[test]
    fn test_get_unreadable_body_is_not_found() {
        let fixture = create_fixture();
        let id = EntryId::from("broken");
        fixture
            .indexes
            .backend()
            .transaction(|kv: &mut dyn KvWrite| kv.set(&entry_key(&id), "garbage"))
            .unwrap();

        assert!(fixture.queries.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_tags_and_domains() {
        let fixture = create_fixture();
        let a = fixture
            .indexes
            .add(&bookmark("https://x.com/1", &["rust", "db"]))
            .unwrap();
        let b = fixture
            .indexes
            .add(&bookmark("https://y.com/1", &["rust"]))
            .unwrap();

        let tags: Vec<String> = fixture.queries.tags().unwrap().into_iter().collect();
        assert_eq!(tags, vec!["db", "rust"]);

        let rust = fixture.queries.entries_for_tag("rust").unwrap();
        assert_eq!(rust, [a.clone(), b.clone()].into_iter().collect());
        assert!(fixture.queries.entries_for_tag("missing").unwrap().is_empty());

        let domains: Vec<String> = fixture.queries.domains().unwrap().into_iter().collect();
        assert_eq!(domains, vec!["x.com", "y.com"]);
        assert_eq!(
            fixture.queries.entries_for_domain("y.com").unwrap(),
            [b.clone()].into_iter().collect()
        );

        let both = fixture.queries.entries_with_all_tags(&["rust", "db"]).unwrap();
        assert_eq!(both, [a.clone()].into_iter().collect());

        let either = fixture.queries.entries_with_any_tag(&["db", "missing"]).unwrap();
        assert_eq!(either, [a].into_iter().collect());

        assert!(fixture.queries.entries_with_all_tags(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_group_by_domain() {
        let fixture = create_fixture();
        let x1 = fixture.indexes.add(&bookmark("https://x.com/1", &[])).unwrap();
        let y1 = fixture.indexes.add(&bookmark("https://y.com/1", &[])).unwrap();
        let x2 = fixture.indexes.add(&bookmark("https://x.com/2", &[])).unwrap();

        let groups = fixture
            .queries
            .group_by_domain(&[x1.clone(), y1.clone(), EntryId::from("gone"), x2.clone()])
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].domain, "x.com");
        let x_ids: Vec<&EntryId> = groups[0].entries.iter().map(|e| &e.id).collect();
        assert_eq!(x_ids, vec![&x1, &x2]);
        assert_eq!(groups[1].domain, "y.com");
        assert_eq!(groups[1].entries[0].id, y1);
    }

    #[test]
    fn test_stats() {
        let fixture = create_fixture();
        assert_eq!(fixture.queries.stats().unwrap(), IndexStats::default());

        fixture
            .indexes
            .add(&bookmark("https://x.com/1", &["a", "b"]))
            .unwrap();
        fixture
            .indexes
            .add(&bookmark("https://y.com/1", &["b"]))
            .unwrap();

        let stats = fixture.queries.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.tags, 2);
        assert_eq!(stats.domains, 2);
    }
}
