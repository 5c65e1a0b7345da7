use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Page sizes offered by list screens.
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [10, 25, 50, 100];

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Page 0 and limit 0 are clamped to 1.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page.max(1)) - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub limit: u32,
    pub page_count: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            page: request.page,
            limit: request.limit,
            page_count: page_count(total_count, request.limit),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    /// `(first, last)` row numbers shown in the footer.
    pub fn display_range(&self) -> (i64, i64) {
        display_range(self.page, self.limit, self.total_count)
    }
}

pub fn page_count(total: i64, limit: u32) -> u32 {
    if total <= 0 || limit == 0 {
        return 0;
    }
    let limit = i64::from(limit);
    ((total + limit - 1) / limit) as u32
}

/// `[(P-1)*S+1, min(P*S, total)]`, `(0, 0)` for an empty result.
pub fn display_range(page: u32, limit: u32, total: i64) -> (i64, i64) {
    if total <= 0 {
        return (0, 0);
    }
    let page = i64::from(page.max(1));
    let limit = i64::from(limit.max(1));
    let start = (page - 1) * limit + 1;
    let end = (page * limit).min(total);
    (start.min(total), end)
}
