//! Cursor over pages of the time index
//!
//! ```text
//! page n = ranks [n * size, (n + 1) * size)
//! ```
//!
//! The cursor stops at the first empty page. A backend error is yielded once
//! and ends the iteration. Each call to [`QueryEngine::paged`] starts a new
//! cursor; [`Pager::next_page_index`] tells the caller where to resume.

use crate::entry::EntryId;
use crate::query::QueryEngine;
use crate::storage::{Backend, StorageResult};
use std::iter::FusedIterator;

/// Lazy sequence of id pages, newest first
pub struct Pager<'a, B: Backend> {
    engine: &'a QueryEngine<B>,
    page_index: usize,
    page_size: usize,
    done: bool,
}

impl<'a, B: Backend> Pager<'a, B> {
    pub(crate) fn new(engine: &'a QueryEngine<B>, page_index: usize, page_size: usize) -> Self {
        Self {
            engine,
            page_index,
            page_size,
            done: page_size == 0,
        }
    }

    /// Index of the page the next call to `next` would read
    pub fn next_page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl<B: Backend> Iterator for Pager<'_, B> {
    type Item = StorageResult<Vec<EntryId>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(offset) = self.page_index.checked_mul(self.page_size) else {
            self.done = true;
            return None;
        };

        match self.engine.list_by_rank(offset, Some(self.page_size)) {
            Ok(ids) if ids.is_empty() => {
                self.done = true;
                None
            }
            Ok(ids) => {
                self.page_index += 1;
                Some(Ok(ids))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<B: Backend> FusedIterator for Pager<'_, B> {}
