//! Page/limit arithmetic for the audit query surface

/// Rows per page when the caller gives no limit
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest accepted page size
pub const MAX_PAGE_SIZE: i64 = 200;

/// Largest accepted page number; keeps the offset well inside `i64`
pub const MAX_PAGE: i64 = 1_000_000;

/// Sanitized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-indexed page number
    pub page: i64,
    pub limit: i64,
    /// Offset for SQL LIMIT/OFFSET
    pub offset: i64,
}

impl Pagination {
    /// Clamp a user-supplied page and limit into valid bounds
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self {
            page,
            limit,
            offset: (page - 1) * limit,
        }
    }

    /// Number of pages needed for `total` rows
    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Pagination::default();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_offset_and_pages() {
        let p = Pagination::new(Some(3), Some(20));
        assert_eq!(p.offset, 40);
        assert_eq!(p.total_pages(41), 3);
        assert_eq!(p.total_pages(0), 0);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let p = Pagination::new(Some(-4), Some(10_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_PAGE_SIZE);

        let p = Pagination::new(Some(2), Some(0));
        assert_eq!(p.limit, 1);
        assert_eq!(p.offset, 1);
    }

    #[test]
    fn test_huge_page_clamped() {
        let p = Pagination::new(Some(i64::MAX), Some(50));
        assert_eq!(p.page, MAX_PAGE);
        assert_eq!(p.offset, (MAX_PAGE - 1) * 50);
        assert!(p.offset >= 0);
    }
}
