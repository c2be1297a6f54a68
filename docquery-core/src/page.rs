//! Pagination over query results.
//!
//! [`PaginationParams`] turns a 1-based page number into an offset/limit window and
//! [`Page`] carries one window of rows together with the total match count.

use serde::{Deserialize, Serialize};

/// A single page of results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of matching items across all pages.
    pub count: u64,
    /// The next page number, if more items follow.
    pub next_page: Option<usize>,
    /// The previous page number, if this is not the first page.
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Assembles a page from a fetched window and the total match count.
    pub fn from_window(items: Vec<T>, count: u64, params: &PaginationParams) -> Self {
        let end = (params.offset() + items.len()) as u64;

        Self {
            next_page: (end < count && !items.is_empty()).then(|| params.page + 1),
            previous_page: (params.page > 1).then(|| params.page - 1),
            items,
            count,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Which page to retrieve and how many items per page.
///
/// Pages are 1-indexed; page 0 is treated as page 1.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page: page.max(1), per_page }
    }

    /// Number of items to skip to reach this page.
    ///
    /// ```ignore
    /// let params = PaginationParams::new(3, 20);
    /// assert_eq!(params.offset(), 40);
    /// ```
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.per_page
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}
