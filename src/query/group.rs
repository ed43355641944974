//! Grouping of entries by domain

use crate::entry::Entry;
use serde::Serialize;
use std::collections::HashMap;

/// Entries sharing one domain, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainGroup {
    pub domain: String,
    pub entries: Vec<Entry>,
}

/// Group entries by domain.
///
/// Groups appear in the order their domain is first seen; entries keep their
/// relative input order within a group. Nothing is re-sorted by time.
pub fn group_entries(entries: impl IntoIterator<Item = Entry>) -> Vec<DomainGroup> {
    let mut groups: Vec<DomainGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        match positions.get(&entry.domain) {
            Some(&pos) => groups[pos].entries.push(entry),
            None => {
                positions.insert(entry.domain.clone(), groups.len());
                groups.push(DomainGroup {
                    domain: entry.domain.clone(),
                    entries: vec![entry],
                });
            }
        }
    }

    groups
}
