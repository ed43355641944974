//! Index consistency checks
//!
//! Walks the time index and both catalogs and reports every place where the
//! derived structures disagree with the entry bodies:
//!
//! * every id in `entry_index` has a readable body,
//! * every tag/domain of an entry lists the entry and is in its catalog,
//! * every catalog name has a non-empty membership set,
//! * every membership set member is a present entry that carries the name.
//!
//! Re-adding a URL with different tags leaves stale memberships behind; they
//! show up here as [`Violation::StaleMember`].

use crate::entry::{decode, Entry, EntryId};
use crate::index::{
    domain_key, entry_key, tag_key, IndexManager, DOMAIN_INDEX, ENTRY_INDEX, TAG_INDEX,
};
use crate::storage::{Backend, KvRead, StorageResult};
use std::collections::HashMap;
use std::fmt;

/// A single inconsistency between entries and indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Id in `entry_index` without a body
    MissingBody { id: EntryId },
    /// Body that does not decode
    UnreadableBody { id: EntryId },
    /// Entry not listed in the membership set of one of its tags/domains
    MissingMembership { catalog: &'static str, name: String, id: EntryId },
    /// Name used by an entry but absent from the catalog
    MissingFromCatalog { catalog: &'static str, name: String },
    /// Catalog name whose membership set is empty
    EmptyMembership { catalog: &'static str, name: String },
    /// Membership set member that is gone or no longer carries the name
    StaleMember { catalog: &'static str, name: String, id: EntryId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingBody { id } => write!(f, "{} is indexed but has no body", id),
            Violation::UnreadableBody { id } => write!(f, "{} has an unreadable body", id),
            Violation::MissingMembership { catalog, name, id } => {
                write!(f, "{} missing from {} member set {:?}", id, catalog, name)
            }
            Violation::MissingFromCatalog { catalog, name } => {
                write!(f, "{:?} is in use but missing from {}", name, catalog)
            }
            Violation::EmptyMembership { catalog, name } => {
                write!(f, "{:?} is in {} but has no members", name, catalog)
            }
            Violation::StaleMember { catalog, name, id } => {
                write!(f, "{} is a stale member of {} {:?}", id, catalog, name)
            }
        }
    }
}

impl<B: Backend> IndexManager<B> {
    /// Check all index invariants against the stored entries
    pub fn validate(&self) -> StorageResult<Vec<Violation>> {
        self.backend().read(|kv| {
            let mut violations = Vec::new();
            let entries = load_entries(kv, &mut violations)?;

            for entry in entries.values() {
                for tag in &entry.tags {
                    let key = tag_key(tag);
                    check_membership(kv, TAG_INDEX, &key, tag, &entry.id, &mut violations)?;
                }
                let key = domain_key(&entry.domain);
                let domain = entry.domain.as_str();
                check_membership(kv, DOMAIN_INDEX, &key, domain, &entry.id, &mut violations)?;
            }

            for tag in kv.smembers(TAG_INDEX)? {
                let key = tag_key(&tag);
                check_members(kv, TAG_INDEX, &key, &tag, &entries, &mut violations, |e, name| {
                    e.has_tag(name)
                })?;
            }
            for domain in kv.smembers(DOMAIN_INDEX)? {
                let key = domain_key(&domain);
                check_members(kv, DOMAIN_INDEX, &key, &domain, &entries, &mut violations, |e, name| {
                    e.domain == name
                })?;
            }

            Ok(violations)
        })
    }
}

fn load_entries(
    kv: &dyn KvRead,
    violations: &mut Vec<Violation>,
) -> StorageResult<HashMap<EntryId, Entry>> {
    let mut entries = HashMap::new();

    for id in kv.zrevrange(ENTRY_INDEX, 0, None)? {
        let id = EntryId::from(id);
        match kv.get(&entry_key(&id))? {
            None => violations.push(Violation::MissingBody { id }),
            Some(body) => match decode(Some(body.as_str())) {
                Some(entry) => {
                    entries.insert(id, entry);
                }
                None => violations.push(Violation::UnreadableBody { id }),
            },
        }
    }

    Ok(entries)
}

fn check_membership(
    kv: &dyn KvRead,
    catalog: &'static str,
    members_key: &str,
    name: &str,
    id: &EntryId,
    violations: &mut Vec<Violation>,
) -> StorageResult<()> {
    if !kv.sismember(members_key, id.as_str())? {
        violations.push(Violation::MissingMembership {
            catalog,
            name: name.to_string(),
            id: id.clone(),
        });
    }
    if !kv.sismember(catalog, name)? {
        let violation = Violation::MissingFromCatalog {
            catalog,
            name: name.to_string(),
        };
        if !violations.contains(&violation) {
            violations.push(violation);
        }
    }
    Ok(())
}

fn check_members(
    kv: &dyn KvRead,
    catalog: &'static str,
    members_key: &str,
    name: &str,
    entries: &HashMap<EntryId, Entry>,
    violations: &mut Vec<Violation>,
    carries: impl Fn(&Entry, &str) -> bool,
) -> StorageResult<()> {
    let members = kv.smembers(members_key)?;
    if members.is_empty() {
        violations.push(Violation::EmptyMembership {
            catalog,
            name: name.to_string(),
        });
        return Ok(());
    }

    for member in members {
        let id = EntryId::from(member);
        let current = entries.get(&id).map(|e| carries(e, name)).unwrap_or(false);
        if !current {
            violations.push(Violation::StaleMember {
                catalog,
                name: name.to_string(),
                id,
            });
        }
    }
    Ok(())
}
