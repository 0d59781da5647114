use crate::{
    FetcherOptions, FieldValue, FilterState, Resource, SearchMode, SortDirection, SortState,
};
use artsclub_client::CollectionPage;
use std::{cmp::Ordering, collections::BTreeSet, ops::Range};

/// Page size of the admin approvals table.
pub const APPROVALS_PAGE_SIZE: usize = 10;
/// Page size of the member portfolio grid.
pub const PORTFOLIO_PAGE_SIZE: usize = 8;
/// Most page-number buttons shown at once.
pub const PAGE_WINDOW: usize = 5;

/// Whether `item` matches `term` on any of `fields`. Case-insensitive
/// substring match; a blank term matches everything.
#[must_use]
pub fn matches_search<R: Resource>(item: &R, term: &str, fields: &[&str]) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    fields.iter().any(|key| {
        item.field(key)
            .as_ref()
            .and_then(FieldValue::as_text)
            .is_some_and(|text| text.to_lowercase().contains(&term))
    })
}

#[must_use]
pub fn search<R: Resource>(items: Vec<R>, term: &str, fields: &[&str]) -> Vec<R> {
    if term.trim().is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| matches_search(item, term, fields))
        .collect()
}

/// Stable sort by `sort.key`. Items without the field go last in either
/// direction.
pub fn sort<R: Resource>(items: &mut [R], sort: &SortState) {
    items.sort_by(|a, b| match (a.field(&sort.key), b.field(&sort.key)) {
        (Some(a), Some(b)) => {
            let ordering = a.compare(&b);
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn field_equals(value: &FieldValue, wanted: &str) -> bool {
    match value {
        FieldValue::Text(text) => text.eq_ignore_ascii_case(wanted),
        FieldValue::Bool(flag) => wanted.parse::<bool>().is_ok_and(|w| w == *flag),
        FieldValue::Number(number) => wanted.parse::<f64>().is_ok_and(|w| w == *number),
        FieldValue::Date(_) => false,
    }
}

/// Status and category filters applied locally, for collections the server
/// returns unfiltered.
fn matches_filter<R: Resource>(item: &R, filter: &FilterState) -> bool {
    let check = |param: Option<&str>, wanted: Option<&String>| match (param, wanted) {
        (Some(param), Some(wanted)) => item
            .field(param)
            .is_some_and(|value| field_equals(&value, wanted)),
        _ => true,
    };
    check(R::STATUS_PARAM, filter.status.as_ref())
        && check(R::CATEGORY_PARAM, filter.category.as_ref())
}

/// Page arithmetic over a known total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    /// 1-based, clamped to the available pages.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
}

impl Pager {
    #[must_use]
    pub fn new(page: usize, page_size: usize, total_items: usize) -> Self {
        let mut pager = Self {
            page: 1,
            page_size: page_size.max(1),
            total_items,
        };
        pager.page = page.clamp(1, pager.total_pages());
        pager
    }

    /// Never zero; an empty collection still has one (empty) page.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.page_size).max(1)
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Indices of the current page within the full collection.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(self.total_items);
        let end = (start + self.page_size).min(self.total_items);
        start..end
    }

    #[must_use]
    pub fn window(&self, max: usize) -> Vec<usize> {
        page_window(self.page, self.total_pages(), max)
    }
}

/// Up to `max` consecutive page numbers centered on `page` where the ends
/// allow it.
#[must_use]
pub fn page_window(page: usize, total_pages: usize, max: usize) -> Vec<usize> {
    if max == 0 || total_pages == 0 {
        return Vec::new();
    }
    let page = page.clamp(1, total_pages);
    let end = (page.saturating_sub(max / 2).max(1) + max - 1).min(total_pages);
    let start = (end + 1).saturating_sub(max).max(1);
    (start..=end).collect()
}

/// Checked rows for bulk actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<Id: Ord> {
    ids: BTreeSet<Id>,
}

impl<Id: Ord> Default for Selection<Id> {
    fn default() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }
}

impl<Id: Ord + Clone> Selection<Id> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: Id) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Select exactly `visible`, dropping anything selected off-screen.
    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a Id>)
    where
        Id: 'a,
    {
        self.ids = visible.into_iter().cloned().collect();
    }

    /// The header checkbox: clears when every visible row is already
    /// selected, selects the visible rows otherwise.
    pub fn toggle_all(&mut self, visible: &[Id]) {
        if self.all_selected(visible) {
            self.clear();
        } else {
            self.select_all(visible);
        }
    }

    #[must_use]
    pub fn all_selected(&self, visible: &[Id]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id))
    }

    /// Forget ids that are no longer on screen, e.g. after a reload.
    pub fn retain_visible(&mut self, visible: &[Id]) {
        self.ids.retain(|id| visible.contains(id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    #[must_use]
    pub fn is_selected(&self, id: &Id) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<Id> {
        self.ids.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Paging {
    /// The fetched page is one server page; links come from the envelope.
    #[default]
    Server,
    /// The whole collection was fetched; slice it locally.
    Client,
}

/// Presentation settings of one list or table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListView {
    pub page_size: usize,
    pub paging: Paging,
    search_mode: SearchMode,
}

impl ListView {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            paging: Paging::Server,
            search_mode: SearchMode::Server,
        }
    }

    /// Everything fetched at once; search, filter and paging happen here.
    /// Pairs with [`FetcherOptions::client_side`].
    #[must_use]
    pub fn client_side(page_size: usize) -> Self {
        Self {
            page_size,
            paging: Paging::Client,
            search_mode: SearchMode::ClientOnly,
        }
    }

    /// The view matching a fetcher's options: a fetcher that leaves search
    /// to the client fetches everything, so the view searches and pages
    /// locally.
    #[must_use]
    pub fn for_options(page_size: usize, options: &FetcherOptions) -> Self {
        match options.search_mode {
            SearchMode::Server => Self::new(page_size),
            SearchMode::ClientOnly => Self::client_side(page_size),
        }
    }

    #[must_use]
    pub fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    /// Refine the held page for display.
    #[must_use]
    pub fn render<R: Resource>(
        &self,
        page: &CollectionPage<R>,
        filter: &FilterState,
    ) -> RenderedPage<R> {
        let mut rows = page.items.clone();
        if self.search_mode == SearchMode::ClientOnly {
            rows = search(rows, &filter.search, R::SEARCH_FIELDS);
        }
        if self.paging == Paging::Client {
            rows.retain(|item| matches_filter(item, filter));
        }
        if let Some(sort_state) = &filter.sort {
            sort(&mut rows, sort_state);
        }

        match self.paging {
            Paging::Client => {
                let pager = Pager::new(filter.page, self.page_size, rows.len());
                let range = pager.range();
                RenderedPage {
                    page: pager.page,
                    total_pages: pager.total_pages(),
                    total_items: rows.len() as u64,
                    has_previous: pager.has_previous(),
                    has_next: pager.has_next(),
                    window: pager.window(PAGE_WINDOW),
                    rows: rows.drain(range).collect(),
                }
            }
            Paging::Server => {
                let total = usize::try_from(page.count).unwrap_or(usize::MAX);
                let pager = Pager::new(filter.page, self.page_size, total);
                RenderedPage {
                    page: pager.page,
                    total_pages: pager.total_pages(),
                    total_items: page.count,
                    has_previous: page.has_previous(),
                    has_next: page.has_next(),
                    window: pager.window(PAGE_WINDOW),
                    rows,
                }
            }
        }
    }
}

/// What the table draws.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage<R> {
    pub rows: Vec<R>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: u64,
    pub has_previous: bool,
    pub has_next: bool,
    /// Page-number buttons.
    pub window: Vec<usize>,
}

impl<R: Resource> RenderedPage<R> {
    #[must_use]
    pub fn visible_ids(&self) -> Vec<R::Id> {
        self.rows.iter().map(Resource::id).collect()
    }
}
