//! Page-number pagination shared by every post listing.
//!
//! The requested page arrives as an untrusted query value. It never fails:
//! anything unusable falls back to the first page and anything past the end
//! is clamped to the last page.

use std::num::NonZeroUsize;

use anyhow::{anyhow, Result};
use serde::Serialize;

pub const DEFAULT_POSTS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: NonZeroUsize,
}

impl Paginator {
    pub fn new(per_page: usize) -> Result<Self> {
        let per_page =
            NonZeroUsize::new(per_page).ok_or_else(|| anyhow!("page size must be greater than 0"))?;
        Ok(Self { per_page })
    }

    pub fn per_page(&self) -> usize {
        self.per_page.get()
    }

    /// Resolve which page a listing of `count` items should show.
    pub fn window(&self, count: usize, requested: Option<&str>) -> PageWindow {
        let per_page = self.per_page.get();
        let num_pages = count.div_ceil(per_page).max(1);
        let number = parse_page_number(requested).min(num_pages);

        PageWindow {
            number,
            num_pages,
            count,
            per_page,
        }
    }

    /// Paginate a fully materialized sequence.
    pub fn paginate<T>(&self, items: Vec<T>, requested: Option<&str>) -> Page<T> {
        let window = self.window(items.len(), requested);
        let page_items = items
            .into_iter()
            .skip(window.offset())
            .take(window.per_page)
            .collect();
        Page::new(window, page_items)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            per_page: NonZeroUsize::MIN.saturating_add(DEFAULT_POSTS_PER_PAGE - 1),
        }
    }
}

/// Digits that overflow saturate, so huge numbers still clamp to the last page.
/// Anything else, zero included, reads as page 1.
fn parse_page_number(requested: Option<&str>) -> usize {
    let Some(raw) = requested.map(str::trim) else {
        return 1;
    };
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 1;
    }
    digits.parse::<usize>().unwrap_or(usize::MAX).max(1)
}

/// The resolved position of one page inside a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
}

impl PageWindow {
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.per_page
    }

    /// Number of items that belong on this page.
    pub fn len(&self) -> usize {
        self.count.saturating_sub(self.offset()).min(self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn limit(&self) -> i64 {
        i64::try_from(self.per_page).unwrap_or(i64::MAX)
    }

    pub fn sql_offset(&self) -> i64 {
        i64::try_from(self.offset()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
    pub start_index: usize,
    pub end_index: usize,
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, items: Vec<T>) -> Self {
        let start_index = if items.is_empty() {
            0
        } else {
            window.offset() + 1
        };
        let end_index = window.offset() + items.len();

        Self {
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            per_page: window.per_page,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
            next_page_number: window.has_next().then(|| window.number + 1),
            previous_page_number: window.has_previous().then(|| window.number - 1),
            start_index,
            end_index,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
