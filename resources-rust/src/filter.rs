use crate::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

impl SortState {
    #[must_use]
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Header click: the same key flips direction, a new key starts
    /// ascending.
    #[must_use]
    pub fn toggle(current: Option<&Self>, key: &str) -> Self {
        match current {
            Some(sort) if sort.key == key => Self {
                key: sort.key.clone(),
                direction: sort.direction.flip(),
            },
            _ => Self::ascending(key),
        }
    }

    /// DRF `ordering` value.
    #[must_use]
    pub fn ordering(&self) -> String {
        match self.direction {
            SortDirection::Ascending => self.key.clone(),
            SortDirection::Descending => format!("-{}", self.key),
        }
    }
}

/// Whether the search term is sent to the server or only applied to the
/// rows already fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Server,
    /// Only for small collections that fit on one page.
    ClientOnly,
}

/// Everything that decides what a list page requests and shows. Owned by
/// the view; reset on navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub search: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub sort: Option<SortState>,
    /// 1-based.
    pub page: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: None,
            status: None,
            sort: None,
            page: 1,
        }
    }
}

impl FilterState {
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self.page = 1;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn toggle_sort(&mut self, key: &str) {
        self.sort = Some(SortState::toggle(self.sort.as_ref(), key));
    }

    /// Query parameters for the list endpoint of `R`.
    #[must_use]
    pub fn to_query<R: Resource>(&self, search_mode: SearchMode) -> Vec<(String, String)> {
        let mut query = vec![("page".to_string(), self.page.max(1).to_string())];
        if search_mode == SearchMode::Server && !self.search.trim().is_empty() {
            query.push(("search".to_string(), self.search.trim().to_string()));
        }
        if let (Some(param), Some(status)) = (R::STATUS_PARAM, &self.status) {
            query.push((param.to_string(), status.clone()));
        }
        if let (Some(param), Some(category)) = (R::CATEGORY_PARAM, &self.category) {
            query.push((param.to_string(), category.clone()));
        }
        if let Some(sort) = &self.sort {
            query.push(("ordering".to_string(), sort.ordering()));
        }
        query
    }
}
