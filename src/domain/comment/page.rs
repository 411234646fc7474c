//! Paging types for comment listings.

use serde::{Deserialize, Serialize};

/// Default number of comments per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Sort order for comment listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentSort {
    /// Newest first.
    #[default]
    Latest,
    /// Oldest first.
    Oldest,
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: CommentSort,
}

impl PageRequest {
    pub fn new(page: u32, sort: CommentSort) -> Self {
        Self {
            page,
            size: DEFAULT_PAGE_SIZE,
            sort,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of results plus the totals needed to render paging controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = u64::from(request.size.max(1));
        let total_pages = ((total_elements + size - 1) / size) as u32;
        Self {
            items,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
            has_next: request.page + 1 < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            has_next: self.has_next,
        }
    }
}
