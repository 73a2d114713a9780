//! Offset pagination arithmetic shared by listings.

use std::num::NonZeroU32;

use serde::Serialize;

/// Zero-based page of a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageWindow {
    page: u32,
    size: NonZeroU32,
}

impl PageWindow {
    pub fn new(page: u32, size: NonZeroU32) -> Self {
        Self { page, size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> NonZeroU32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size.get())
    }

    /// Inclusive item range `[page*size, page*size+size-1]`.
    pub fn range(&self) -> (u64, u64) {
        let start = self.offset();
        (start, start + u64::from(self.size.get()) - 1)
    }
}

/// `ceil(total / size)`.
pub fn total_pages(total: u64, size: NonZeroU32) -> u64 {
    total.div_ceil(u64::from(size.get()))
}

/// Number of items that land on `page` when `total` items are split by `size`.
pub fn items_on_page(total: u64, size: NonZeroU32, page: u32) -> u64 {
    let size = u64::from(size.get());
    let start = u64::from(page) * size;
    total.saturating_sub(start).min(size)
}

/// Last page that still holds items, or the first page when there are none.
pub fn clamp_page(page: u32, total: u64, size: NonZeroU32) -> u32 {
    let pages = total_pages(total, size);
    if pages == 0 {
        return 0;
    }
    let last = u32::try_from(pages - 1).unwrap_or(u32::MAX);
    page.min(last)
}

/// Page a viewer should land on after items were removed from the listing.
pub fn page_after_removal(current_page: u32, remaining_total: u64, size: NonZeroU32) -> u32 {
    clamp_page(current_page, remaining_total, size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageSummary {
    pub fn new(window: PageWindow, total_count: u64) -> Self {
        let pages = total_pages(total_count, window.size());
        Self {
            page: window.page(),
            page_size: window.size().get(),
            total_count,
            total_pages: pages,
            has_previous: window.page() > 0,
            has_next: u64::from(window.page()) + 1 < pages,
        }
    }
}
