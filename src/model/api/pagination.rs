use serde::{Deserialize, Serialize};

/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: u64 = 200;

/// Paging query parameters. Pages are numbered from 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromForm)]
pub struct Pagination {
    #[field(name = "pageNum")]
    #[field(default = 1)]
    #[field(validate = range(1..))]
    page_num: u64,
    #[field(name = "pageSize")]
    #[field(default = 50)]
    #[field(validate = range(1..=MAX_PAGE_SIZE as isize))]
    page_size: u64,
}

impl Pagination {
    pub fn new(page_num: u64, page_size: u64) -> Self {
        Self {
            page_num: page_num.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page_num(&self) -> u64 {
        self.page_num
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// How many items precede this page.
    pub fn skip(&self) -> u64 {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    /// Wrap up a page of results.
    pub fn wrap<T>(self, items: Vec<T>, total: u64) -> Paginated<T> {
        Paginated {
            items,
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_num: u64,
    pub page_size: u64,
    pub total: u64,
}
