//! Result pages and page arithmetic.

use crate::search::params::SearchLimit;
use serde::{Deserialize, Serialize};

/// Where a requested page falls within a result set.
///
/// [`PagePlan::locate`] is the single place page arithmetic happens: stores
/// use the plan's `offset` to fetch rows, and [`Page::from_plan`] copies the
/// resolved position into the page returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    /// Resolved page number, clamped into `1..=page_count`.
    pub page_index: u32,
    /// Total number of pages; at least 1 even for empty result sets.
    pub page_count: u32,
    /// Offset of the page's first item within the whole result set.
    pub offset: u64,
}

impl PagePlan {
    /// Resolve `requested_index` against a result set of `total_items` rows
    /// paginated by `limit`.
    ///
    /// An empty result set still has one (empty) page, and out-of-range
    /// requests clamp to the nearest valid page instead of failing.
    pub fn locate(total_items: u64, limit: SearchLimit, requested_index: u32) -> Self {
        let per_page = u64::from(limit.get());
        let page_count = total_items
            .div_ceil(per_page)
            .clamp(1, u64::from(u32::MAX)) as u32;
        let page_index = requested_index.clamp(1, page_count);
        let offset = u64::from(page_index - 1) * per_page;
        Self {
            page_index,
            page_count,
            offset,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based index of this page.
    pub page_index: u32,
    /// Total number of pages in the result set at fetch time.
    pub page_count: u32,
    /// Offset of `items[0]` within the whole result set.
    pub page_first_offset: u64,
}

impl<T> Page<T> {
    /// Assemble a page from fetched items and the plan that located them.
    pub fn from_plan(items: Vec<T>, plan: PagePlan) -> Self {
        Self {
            items,
            page_index: plan.page_index,
            page_count: plan.page_count,
            page_first_offset: plan.offset,
        }
    }

    /// Convert the item type, preserving position data.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_index: self.page_index,
            page_count: self.page_count,
            page_first_offset: self.page_first_offset,
        }
    }
}
