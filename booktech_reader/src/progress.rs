use crate::api::{BookId, ReadingProgress};

/// Keeps the page inside the book, a book has at least one page
pub fn clamp_page(page: u32, total_pages: u32) -> (u32, u32) {
    let total_pages = total_pages.max(1);
    (page.clamp(1, total_pages), total_pages)
}

/// page / total_pages in percent, rounded half up
pub fn percent(page: u32, total_pages: u32) -> u32 {
    let (page, total_pages) = clamp_page(page, total_pages);
    ((page as u64 * 200 + total_pages as u64) / (2 * total_pages as u64)) as u32
}

impl ReadingProgress {
    pub fn new(book_id: BookId, page: u32, total_pages: u32, updated_at: i64) -> Self {
        let (page, total_pages) = clamp_page(page, total_pages);
        Self {
            book_id,
            page,
            total_pages,
            percent: percent(page, total_pages),
            updated_at,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.page >= self.total_pages
    }
}
