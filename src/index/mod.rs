//! Bookmark Index Structures
//!
//! All indexes live in the key-value backend next to the entry bodies:
//!
//! - **entry_index**: sorted set id → creation time, for rank and day queries
//! - **tag:<name>** / **tag_index**: tag membership sets and the tag catalog
//! - **domain:<name>** / **domain_index**: domain membership sets and catalog
//!
//! # Architecture
//!
//! ```text
//! add(raw)
//!    ↓ validate + derive
//! entry:<id>  ←  body (JSON)
//! entry_index ←  (id, created_at)
//! tag:<t>     ←  id        tag_index    ← t      (for each tag)
//! domain:<d>  ←  id        domain_index ← d
//!
//! remove(id) reverses each step and drops tags/domains left without entries
//! ```
//!
//! Only [`IndexManager`] writes these keys.

mod manager;
mod validate;

pub use manager::IndexManager;
pub use validate::Violation;

use crate::entry::EntryId;

/// Sorted set of entry ids scored by creation time (epoch seconds)
pub const ENTRY_INDEX: &str = "entry_index";
/// Catalog of tag names referenced by at least one entry
pub const TAG_INDEX: &str = "tag_index";
/// Catalog of domains referenced by at least one entry
pub const DOMAIN_INDEX: &str = "domain_index";

/// Key of an entry body
pub fn entry_key(id: &EntryId) -> String {
    format!("entry:{}", id)
}

/// Key of a tag membership set
pub fn tag_key(tag: &str) -> String {
    format!("tag:{}", tag)
}

/// Key of a domain membership set
pub fn domain_key(domain: &str) -> String {
    format!("domain:{}", domain)
}

/// Statistics about index usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of entries in the time index
    pub entries: usize,
    /// Number of tags in the catalog
    pub tags: usize,
    /// Number of domains in the catalog
    pub domains: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries, {} tags, {} domains",
            self.entries, self.tags, self.domains
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = EntryId::from("abc");
        assert_eq!(entry_key(&id), "entry:abc");
        assert_eq!(tag_key("rust"), "tag:rust");
        assert_eq!(domain_key("example.com"), "domain:example.com");
    }
}
