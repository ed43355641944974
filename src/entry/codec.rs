//! Entry Codec
//!
//! Turns an untyped key/value map into a stored [`Entry`]:
//!
//! ```text
//! RawEntry ──validate──▶ ValidatedEntry ──derive──▶ Entry ──encode──▶ JSON
//!                                                     ▲
//!                                   JSON ──decode─────┘
//! ```

use crate::entry::error::ValidationError;
use crate::entry::types::{Entry, EntryId, RawEntry, ValidatedEntry};
use crate::storage::StorageResult;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use url::Url;

/// Parse a raw map into validated fields.
///
/// Keys are checked in the fixed order url, title, tags; the first missing
/// one is reported. URL syntax is not checked. Empty tag names are dropped
/// and duplicates collapse.
pub fn validate(raw: &RawEntry) -> Result<ValidatedEntry, ValidationError> {
    let url = required(raw, "url")?;
    let title = required(raw, "title")?;
    let tags = raw.get("tags").ok_or(ValidationError::MissingKey("tags"))?;

    let url = non_empty_str(url, "url")?;
    let title = non_empty_str(title, "title")?;

    let invalid_tags = ValidationError::InvalidType {
        key: "tags",
        expected: "an array of strings",
    };
    let tags = tags.as_array().ok_or_else(|| invalid_tags.clone())?;

    let mut tag_set = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_str().ok_or_else(|| invalid_tags.clone())?;
        if !tag.is_empty() {
            tag_set.insert(tag.to_string());
        }
    }

    Ok(ValidatedEntry {
        url: url.to_string(),
        title: title.to_string(),
        tags: tag_set,
    })
}

fn required<'a>(raw: &'a RawEntry, key: &'static str) -> Result<&'a Value, ValidationError> {
    raw.get(key).ok_or(ValidationError::MissingKey(key))
}

fn non_empty_str<'a>(value: &'a Value, key: &'static str) -> Result<&'a str, ValidationError> {
    let s = value.as_str().ok_or(ValidationError::InvalidType {
        key,
        expected: "a string",
    })?;
    if s.trim().is_empty() {
        return Err(ValidationError::Empty(key));
    }
    Ok(s)
}

/// Derive `id`, `domain` and `created_at` (now)
pub fn derive(validated: ValidatedEntry) -> Entry {
    derive_at(validated, Utc::now())
}

/// Derive `id`, `domain` and `created_at` with an explicit creation instant
pub fn derive_at(validated: ValidatedEntry, created_at: DateTime<Utc>) -> Entry {
    let ValidatedEntry { url, title, tags } = validated;
    Entry {
        id: EntryId::for_url(&url),
        domain: domain_of(&url),
        url,
        title,
        tags,
        created_at,
    }
}

/// Authority component of a URL: host plus explicit port.
///
/// Returns an empty string if the URL cannot be parsed or has no host.
/// Credentials are never part of the domain.
pub fn domain_of(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Serialize an entry for storage
pub fn encode(entry: &Entry) -> StorageResult<String> {
    Ok(serde_json::to_string(entry)?)
}

/// Deserialize a stored entry.
///
/// Absent or malformed data yields `None`.
pub fn decode(data: Option<&str>) -> Option<Entry> {
    let data = data?;
    match serde_json::from_str(data) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("Failed to decode stored entry: {}", e);
            None
        }
    }
}
