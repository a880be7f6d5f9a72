use derive_more::{Display, Error};

/// Below this many pages every page number is shown.
const FULL_RANGE_BELOW: usize = 5;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[display("Listing must have at least one page")]
    NoPages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationItem {
    Page(usize),
    Gap,
}

impl std::fmt::Display for PaginationItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page(p) => write!(f, "{p}"),
            Self::Gap => f.write_str("..."),
        }
    }
}

/// Number of pages needed for `total_items`. An empty listing still has one page.
pub fn page_count(total_items: usize, per_page: usize) -> usize {
    let per_page = per_page.max(1);
    total_items.div_ceil(per_page).max(1)
}

pub fn clamp_page(requested: i64, total_pages: usize) -> usize {
    let last = total_pages.max(1) as i64;
    requested.clamp(1, last) as usize
}

/// Page numbers and gaps to render around `current` out of `total` pages.
/// `current` is clamped into `1..=total`. Output is not deduplicated.
pub fn compute_window(current: usize, total: usize) -> Result<Vec<PaginationItem>, PaginationError> {
    if total == 0 {
        return Err(PaginationError::NoPages);
    }
    if total < FULL_RANGE_BELOW {
        return Ok((1..=total).map(PaginationItem::Page).collect());
    }
    let current = current.clamp(1, total);

    let mut items = vec![PaginationItem::Page(1)];
    if current > 3 {
        items.push(PaginationItem::Gap);
    }
    if 2 < current && current < total - 1 {
        items.extend((current - 1..=current + 1).map(PaginationItem::Page));
    } else if current == 1 {
        items.push(PaginationItem::Page(2));
    } else if current == 2 {
        items.extend([PaginationItem::Page(2), PaginationItem::Page(3)]);
    } else if current == total - 1 {
        items.extend([PaginationItem::Page(current - 1), PaginationItem::Page(current)]);
    } else if current == total {
        items.push(PaginationItem::Page(current - 1));
    }
    if current + 2 < total {
        items.push(PaginationItem::Gap);
    }
    items.push(PaginationItem::Page(total));
    Ok(items)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationWindow {
    pub page: usize,
    pub total_pages: usize,
    pub items: Vec<PaginationItem>,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationWindow {
    pub fn new(requested_page: i64, total_pages: usize) -> Result<Self, PaginationError> {
        if total_pages == 0 {
            return Err(PaginationError::NoPages);
        }
        let page = clamp_page(requested_page, total_pages);
        Ok(Self {
            page,
            total_pages,
            items: compute_window(page, total_pages)?,
            has_next: page < total_pages,
            has_previous: page > 1,
        })
    }

    pub fn offset(&self, per_page: usize) -> usize {
        (self.page - 1) * per_page
    }

    pub fn next_page(&self) -> Option<usize> {
        self.has_next.then_some(self.page + 1)
    }

    pub fn previous_page(&self) -> Option<usize> {
        self.has_previous.then(|| self.page - 1)
    }
}

pub struct PageLink {
    pub label: String,
    pub url: Option<String>,
    pub current: bool,
}

/// Links for the window. `build_url` receives the target page number.
pub fn page_links(window: &PaginationWindow, build_url: impl Fn(usize) -> String) -> Vec<PageLink> {
    window
        .items
        .iter()
        .map(|item| match item {
            PaginationItem::Page(p) => PageLink {
                label: p.to_string(),
                url: Some(build_url(*p)),
                current: *p == window.page,
            },
            PaginationItem::Gap => PageLink {
                label: item.to_string(),
                url: None,
                current: false,
            },
        })
        .collect()
}
