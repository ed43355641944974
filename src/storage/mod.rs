//! Key-Value Storage Backends
//!
//! The indexing core talks to storage only through the traits in
//! [`backend`]:
//!
//! - **backend**: `KvRead`, `KvWrite` and `Backend` (read + atomic transaction)
//! - **memory**: in-process backend with an undo journal
//! - **sqlite**: durable backend on a single SQLite file
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   IndexManager → Backend::transaction → [set, zadd, sadd, ...] → commit
//!
//! Read Path:
//!   QueryEngine → Backend::read → [get, smembers, zrevrange, ...]
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod sqlite;

// Re-export commonly used types
pub use backend::{Backend, KvRead, KvWrite};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
