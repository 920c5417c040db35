//! Pagination types for list reads

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_PER_PAGE: u32 = 100;

/// Default items per page
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub items_per_page: u32,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Items per page is clamped to 1..=100
    pub fn new(page: u32, items_per_page: u32) -> Self {
        Self {
            page: page.max(1),
            items_per_page: items_per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.items_per_page)
    }

    /// Get LIMIT value.
    pub fn limit(&self) -> u32 {
        self.items_per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            items_per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of stocks plus the total across all pages
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages, computed independently of the page
    pub total_count: i64,
    /// Pagination used to fetch `items`, `None` for an unpaged read
    pub pagination: Option<PaginationParams>,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            pagination: self.pagination,
        }
    }
}

/// Wire shape of a pagination request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.items_per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

impl From<Pagination> for PaginationParams {
    fn from(page: Pagination) -> Self {
        Self {
            page: Some(page.page),
            items_per_page: Some(page.items_per_page),
        }
    }
}
