//! Pagination state for Bitbucket list endpoints.
//!
//! Bitbucket Cloud pages with `page`/`pagelen` and Bitbucket Server with
//! `start`/`limit`. Both are normalised to 1-based page numbers so that any
//! page can be re-fetched by number instead of following a continuation
//! token.

use super::error::BitbucketError;

/// Largest page size accepted by the Bitbucket APIs.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Page size used when the caller does not choose one.
pub const DEFAULT_PAGE_SIZE: u8 = 20;

/// A request for one page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u8,
}

impl PageRequest {
    /// Validates and builds a page request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidPagination`] when `page` is zero or
    /// `per_page` is outside `1..=100`.
    pub fn new(page: u32, per_page: u8) -> Result<Self, BitbucketError> {
        if page == 0 {
            return Err(BitbucketError::InvalidPagination {
                message: "page must be at least 1".to_owned(),
            });
        }

        if per_page == 0 {
            return Err(BitbucketError::InvalidPagination {
                message: "per_page must be at least 1".to_owned(),
            });
        }

        if per_page > MAX_PAGE_SIZE {
            return Err(BitbucketError::InvalidPagination {
                message: format!("per_page must not exceed {MAX_PAGE_SIZE}"),
            });
        }

        Ok(Self { page, per_page })
    }

    /// The first page with the given size.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidPagination`] for an invalid size.
    pub fn first(per_page: u8) -> Result<Self, BitbucketError> {
        Self::new(1, per_page)
    }

    /// Returns the request for the following page.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            per_page: self.per_page,
        }
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn per_page(&self) -> u8 {
        self.per_page
    }

    /// Zero-based offset of the first item, as used by Bitbucket Server.
    #[must_use]
    pub fn start(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)).saturating_mul(u64::from(self.per_page))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Current page state for paginated results.
///
/// # Example
///
/// ```
/// use bucketline::bitbucket::pagination::PageInfo;
///
/// let info = PageInfo::new(2, 50)
///     .with_total_count(Some(120))
///     .with_has_next(true);
/// assert!(!info.is_first_page());
/// assert!(!info.is_last_page());
/// assert_eq!(info.total_pages(), Some(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    current_page: u32,
    per_page: u8,
    total_count: Option<u64>,
    has_next: bool,
}

impl PageInfo {
    /// Creates a new page info instance with unknown totals and no next page.
    #[must_use]
    pub const fn new(current_page: u32, per_page: u8) -> Self {
        Self {
            current_page,
            per_page,
            total_count: None,
            has_next: false,
        }
    }

    /// Sets the total number of items across all pages.
    #[must_use]
    pub const fn with_total_count(mut self, total_count: Option<u64>) -> Self {
        self.total_count = total_count;
        self
    }

    /// Sets whether there is a next page.
    #[must_use]
    pub const fn with_has_next(mut self, has_next: bool) -> Self {
        self.has_next = has_next;
        self
    }

    /// Returns the current page number (1-based).
    #[must_use]
    pub const fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Returns the number of items per page.
    #[must_use]
    pub const fn per_page(&self) -> u8 {
        self.per_page
    }

    /// Returns the total number of items if the provider reported it.
    #[must_use]
    pub const fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Returns the total number of pages when the item total is known.
    #[must_use]
    pub fn total_pages(&self) -> Option<u64> {
        let per_page = u64::from(self.per_page);
        if per_page == 0 {
            return None;
        }
        self.total_count.map(|total| total.div_ceil(per_page))
    }

    /// Returns true if more pages exist after the current one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.has_next
    }

    /// Returns true if pages exist before the current one.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    /// Returns true if this is the first page.
    #[must_use]
    pub const fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    /// Returns true if this is the last page.
    #[must_use]
    pub const fn is_last_page(&self) -> bool {
        !self.has_next
    }
}

/// One page of mapped items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResult<T> {
    /// Items on this page, in provider order.
    pub items: Vec<T>,
    /// Pagination state.
    pub page_info: PageInfo,
}

impl<T> PagedResult<T> {
    /// Builds a page from its items and pagination state.
    #[must_use]
    pub const fn new(items: Vec<T>, page_info: PageInfo) -> Self {
        Self { items, page_info }
    }

    /// Maps every item, keeping the pagination state.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{BitbucketError, PageInfo, PageRequest};

    #[rstest]
    #[case::zero_page(0, 20)]
    #[case::zero_size(1, 0)]
    #[case::oversized(1, 101)]
    fn rejects_invalid_requests(#[case] page: u32, #[case] per_page: u8) {
        let result = PageRequest::new(page, per_page);
        assert!(
            matches!(result, Err(BitbucketError::InvalidPagination { .. })),
            "expected InvalidPagination, got {result:?}"
        );
    }

    #[rstest]
    #[case(1, 25, 0)]
    #[case(2, 25, 25)]
    #[case(4, 20, 60)]
    fn start_offset_follows_page_number(#[case] page: u32, #[case] size: u8, #[case] start: u64) {
        let request = PageRequest::new(page, size).expect("request should be valid");
        assert_eq!(request.start(), start);
    }

    #[rstest]
    fn total_pages_rounds_up() {
        let info = PageInfo::new(1, 20).with_total_count(Some(65));
        assert_eq!(info.total_pages(), Some(4));
        assert!(info.is_first_page());
        assert!(!info.has_prev());
    }

    #[rstest]
    fn unknown_total_has_no_page_count() {
        let info = PageInfo::new(3, 20).with_has_next(true);
        assert_eq!(info.total_pages(), None);
        assert!(info.has_prev());
        assert!(!info.is_last_page());
    }
}
