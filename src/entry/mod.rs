//! Bookmark Entries
//!
//! - **types**: `Entry`, `EntryId`, `ValidatedEntry`, `RawEntry`
//! - **codec**: validation, derivation of id/domain/time, JSON encoding
//! - **error**: `ValidationError`

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{decode, derive, derive_at, domain_of, encode, validate};
pub use error::ValidationError;
pub use types::{instant_score, Entry, EntryId, RawEntry, ValidatedEntry};
