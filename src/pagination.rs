//! Page arithmetic for every feed.
//!
//! A feed is an ordered sequence cut into pages of `per_page` items. Page
//! numbers are 1-based. An empty sequence still has one (empty) page, and a
//! requested page outside `1..=num_pages` is clamped to the nearest end.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

/// The rows a page covers, ready for `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub number: usize,
    pub offset: usize,
    pub limit: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Paginator {
        Paginator {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    pub fn clamp(&self, requested: Option<i64>) -> usize {
        let last = self.num_pages() as i64;
        requested.unwrap_or(1).clamp(1, last) as usize
    }

    pub fn window(&self, requested: Option<i64>) -> Window {
        let number = self.clamp(requested);
        Window {
            number,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    pub fn page<T>(&self, number: usize, object_list: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        Page {
            number,
            num_pages,
            count: self.count,
            has_previous: number > 1,
            has_next: number < num_pages,
            object_list,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Page<T> {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub object_list: Vec<T>,
}

/// A `?page=` value. Anything that is not an integer means the first page.
pub fn parse_page_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
}

/// Cuts an already ordered sequence down to the requested page.
pub fn paginate<T>(items: Vec<T>, requested: Option<i64>, per_page: usize) -> Page<T> {
    let paginator = Paginator::new(items.len(), per_page);
    let window = paginator.window(requested);
    let slice = items
        .into_iter()
        .skip(window.offset)
        .take(window.limit)
        .collect();
    paginator.page(window.number, slice)
}
