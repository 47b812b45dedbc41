use serde::{Deserialize, Serialize};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Filter and pagination criteria for listing entities of one resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListCriteria {
    /// Case-insensitive substring match on the name.
    pub name_contains: Option<String>,

    /// Only return rows in one of these status codes.
    pub statuses: Option<Vec<String>>,

    /// Include soft-deleted rows.
    pub include_deleted: bool,

    /// Maximum number of rows to return.
    pub limit: Option<usize>,

    /// Number of rows to skip.
    pub offset: Option<usize>,
}

impl ListCriteria {
    /// Creates empty criteria (first page, live rows only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by name substring.
    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    /// Filters by a single status code.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.statuses = Some(vec![status.into()]);
        self
    }

    /// Includes soft-deleted rows.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Page size after defaults and clamping (1..=MAX_PAGE_LIMIT).
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Returns true if a row with the given name, status and deleted flag
    /// passes the filters. Pagination is not applied here.
    pub fn matches(&self, name: &str, status: &str, deleted: bool) -> bool {
        if deleted && !self.include_deleted {
            return false;
        }
        if let Some(ref needle) = self.name_contains
            && !name.to_lowercase().contains(&needle.to_lowercase())
        {
            return false;
        }
        if let Some(ref statuses) = self.statuses
            && !statuses.iter().any(|s| s == status)
        {
            return false;
        }
        true
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    /// Converts every item, keeping the paging information.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Like [`Page::map`] but for fallible conversions.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        })
    }
}
