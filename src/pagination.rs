//! Page-bounded views over ordered sequences.
//!
//! Pages are 1-based. A page past the end is an empty page, never an error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Page 0 is read as page 1 and a zero page size as 1.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// Wrap items already fetched for `request` out of `total`.
    pub fn from_parts(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let end = request.offset() + request.limit();
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total,
            has_next: end < total,
            has_prev: request.page() > 1,
        }
    }
}

/// `?page=` query parameter, defaulting to 1.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

impl PageQuery {
    pub fn with_size(self, page_size: u32) -> PageRequest {
        PageRequest::new(self.page, page_size)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    // 5 items in total
    #[rstest]
    #[case(1, 2, 0, true, false)]
    #[case(2, 2, 2, true, true)]
    #[case(3, 2, 4, false, true)]
    #[case(4, 2, 6, false, true)]
    #[case(1, 10, 0, false, false)]
    #[case(0, 2, 0, true, false)]
    fn bounds_of_a_page(
        #[case] page: u32,
        #[case] size: u32,
        #[case] offset: u64,
        #[case] has_next: bool,
        #[case] has_prev: bool,
    ) {
        let request = PageRequest::new(page, size);
        assert_eq!(request.offset(), offset);

        let got = Page::<i32>::from_parts(Vec::new(), request, 5);
        assert_eq!(got.page, page.max(1));
        assert_eq!(got.total, 5);
        assert_eq!(got.has_next, has_next);
        assert_eq!(got.has_prev, has_prev);
    }

    #[test]
    fn far_page_is_empty_not_an_error() {
        let request = PageRequest::new(999_999, 5);
        assert_eq!(request.offset(), 4_999_990);
        let got = Page::<&str>::from_parts(Vec::new(), request, 3);
        assert!(!got.has_next);
        assert!(got.has_prev);
        assert_eq!(got.page, 999_999);
    }

    #[test]
    fn zero_page_size_reads_as_one() {
        let request = PageRequest::new(3, 0);
        assert_eq!(request.limit(), 1);
        assert_eq!(request.offset(), 2);
    }

    #[test]
    fn missing_page_parameter_is_first_page() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.with_size(5), PageRequest::new(1, 5));
    }
}
