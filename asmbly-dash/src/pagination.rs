//! Pagination for the member risk table

/// Rows per page
pub const PAGE_SIZE: i64 = 15;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// Out-of-range pages are clamped to `[1, total_pages]`.
///
/// # Examples
/// ```
/// use asmbly_dash::pagination::calculate_pagination;
///
/// // 40 members = 3 pages (15 + 15 + 10)
/// let p = calculate_pagination(40, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 15);
///
/// let p = calculate_pagination(40, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 30);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        total_pages,
        offset,
    }
}
