use serde::Serialize;

use std::num::IntErrorKind;

/**
 * Page arithmetic over a known number of results
 */
#[derive(Clone, Copy, Debug)]
pub struct Paginator {
    count: u64,
    per_page: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageInfo {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page: u64,
    pub next_page: u64,
}

impl Paginator {
    pub fn new(count: u64, per_page: u64) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /**
     * An empty result still has one (empty) page
     */
    pub fn num_pages(&self) -> u64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /**
     * Resolve a raw `page` parameter leniently: garbage means the first page,
     * anything out of range means the last one
     */
    pub fn page(&self, raw: Option<&str>) -> PageInfo {
        let num_pages = self.num_pages();
        let number = match raw.map(str::trim).filter(|r| !r.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 && n as u64 <= num_pages => n as u64,
                Ok(_) => num_pages,
                Err(err) => match err.kind() {
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => num_pages,
                    _ => 1,
                },
            },
        };

        PageInfo {
            number,
            num_pages,
            count: self.count,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page: number.saturating_sub(1).max(1),
            next_page: (number + 1).min(num_pages),
        }
    }

    pub fn offset(&self, page: &PageInfo) -> u64 {
        (page.number - 1) * self.per_page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }
}
