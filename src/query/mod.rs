//! Bookmark Query Engine
//!
//! Read-side views over the indexes maintained by
//! [`IndexManager`](crate::index::IndexManager):
//!
//! - **engine**: rank, day, tag and domain lookups
//! - **pager**: fixed-size page cursor over the time index
//! - **day**: UTC calendar-day windows
//! - **group**: grouping of entries by domain
//!
//! # Examples
//!
//! ```rust,no_run
//! use bookmarks::query::QueryEngine;
//! use bookmarks::storage::MemoryBackend;
//! use std::sync::Arc;
//!
//! let queries = QueryEngine::new(Arc::new(MemoryBackend::new()));
//!
//! // Newest ten
//! let ids = queries.list_by_rank(0, Some(10))?;
//!
//! // Everything bookmarked yesterday, grouped by site
//! let yesterday = queries.list_by_day(1)?;
//! let groups = queries.group_by_domain(&yesterday)?;
//! # Ok::<(), bookmarks::storage::StorageError>(())
//! ```

mod day;
mod engine;
mod group;
mod pager;

pub use day::DayRange;
pub use engine::QueryEngine;
pub use group::{group_entries, DomainGroup};
pub use pager::Pager;
