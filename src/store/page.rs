use serde::{Deserialize, Serialize};

/// Requested page, as received in query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

/// One page of items plus the numbers needed to render a pager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Slice `items`; `page` is 1-based, `per_page` is clamped to `1..=max_per_page`
    pub fn paginate(items: Vec<T>, request: PageRequest, default_per_page: usize, max_per_page: usize) -> Self {
        let page = request.page.unwrap_or(1).max(1);
        let per_page = request
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, max_per_page.max(1));

        let total = items.len();
        let pages = total.div_ceil(per_page);
        let skip = (page - 1).saturating_mul(per_page);

        Self {
            items: items.into_iter().skip(skip).take(per_page).collect(),
            pagination: Pagination {
                page,
                per_page,
                total,
                pages,
            },
        }
    }
}
