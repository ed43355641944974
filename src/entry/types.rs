//! Core data types for bookmark entries
//!
//! - `EntryId`: content-derived identifier (SHA-1 of the URL)
//! - `ValidatedEntry`: caller-supplied fields that passed validation
//! - `Entry`: a stored record with derived `id`, `domain` and `created_at`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::fmt;

/// Untyped input for [`crate::entry::validate`]
pub type RawEntry = serde_json::Map<String, serde_json::Value>;

/// Identifier of an entry: lowercase hex SHA-1 digest of its URL
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Compute the identifier for a URL
    pub fn for_url(url: &str) -> Self {
        let digest = Sha1::digest(url.as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Caller-supplied fields after validation, before derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    pub url: String,
    pub title: String,
    /// Distinct, non-empty tag names
    pub tags: BTreeSet<String>,
}

/// A stored bookmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub url: String,
    pub title: String,
    pub tags: BTreeSet<String>,
    /// Authority of `url` (host, plus `:port` if explicit); empty if unparseable
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Sort key in the time index: epoch seconds with microsecond fraction
    pub fn score(&self) -> f64 {
        instant_score(self.created_at)
    }

    /// Check if this entry has a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Convert an instant to a time-index score
pub fn instant_score(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_micros() as f64 / 1_000_000.0
}
