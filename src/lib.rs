//! # Bookmarks
//!
//! Storage and indexing core for a personal bookmark collection. Entries are
//! kept in a key-value backend together with the indexes needed to browse
//! them by time, tag and domain.
//!
//! ## Features
//!
//! - **Content-addressed ids**: an entry's id is the SHA-1 of its URL
//! - **Time index**: newest-first ranks, fixed-size pages, calendar days
//! - **Tag & domain indexes**: reference-counted catalogs
//! - **Atomic writes**: every add/remove is one backend transaction
//! - **Backends**: in-memory and SQLite
//!
//! ## Modules
//!
//! - [`entry`]: Entry types, validation and encoding
//! - [`storage`]: Key-value backend traits and implementations
//! - [`index`]: Index maintenance and consistency checks
//! - [`query`]: Read-only queries
//! - [`store`]: The [`BookmarkStore`] facade
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bookmarks::{BookmarkStore, Config};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let store = BookmarkStore::open_sqlite(&config.storage)?;
//!
//!     let raw = json!({
//!         "url": "https://www.rust-lang.org/learn",
//!         "title": "Learn Rust",
//!         "tags": ["rust", "docs"],
//!     });
//!     let id = store.add_entry(raw.as_object().ok_or("not an object")?)?;
//!
//!     // Newest first
//!     for page in store.get_paged_entries(0, 20) {
//!         for entry in store.get_entries(&page?)?.into_iter().flatten() {
//!             println!("{} {}", entry.domain, entry.title);
//!         }
//!     }
//!
//!     store.remove_entry(&id)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod index;
pub mod query;
pub mod storage;
pub mod store;

// Re-export top-level types for convenience
pub use config::{Config, ConfigError, LoggingConfig, StorageConfig};

pub use entry::{Entry, EntryId, RawEntry, ValidationError};

pub use error::{BookmarkError, BookmarkResult};

pub use index::{IndexManager, IndexStats, Violation};

pub use query::{DayRange, DomainGroup, Pager, QueryEngine};

pub use storage::{Backend, MemoryBackend, SqliteBackend, StorageError, StorageResult};

pub use store::BookmarkStore;
