//! Query predicates, ordering, pagination and per-owner statistics.
//!
//! # Design
//! A `TodoPredicate` is a plain description of which todos match, in the
//! shape a document store understands: every populated field is ANDed,
//! `search` alone is an OR over title and description. Stores evaluate it
//! with `matches`, so the filtering rules live here and not in each backend.
//!
//! `TodoStatistics::collect` folds an owner's todos in a single pass. A
//! store that feeds it from one consistent read gets an atomic snapshot.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FieldError, ValidationError};
use crate::types::{Priority, Todo};
use crate::validate::CATEGORY_MAX;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;
pub const SEARCH_MAX: usize = 100;

/// Optional list filters supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilters {
    pub is_completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPredicate {
    pub id: Option<Uuid>,
    pub owner: Option<Uuid>,
    /// Owner or any `shared_with` user.
    pub visible_to: Option<Uuid>,
    pub is_completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    /// Lowercased needle, matched against title OR description.
    pub search: Option<String>,
}

impl TodoPredicate {
    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn visible_to(user: Uuid) -> Self {
        Self {
            visible_to: Some(user),
            ..Self::default()
        }
    }

    /// Owner must match; each present filter is ANDed in.
    pub fn for_owner(owner: Uuid, filters: TodoFilters) -> Self {
        Self {
            owner: Some(owner),
            is_completed: filters.is_completed,
            priority: filters.priority,
            category: filters.category,
            search: filters.search.map(|s| s.to_lowercase()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn completed(mut self, is_completed: bool) -> Self {
        self.is_completed = Some(is_completed);
        self
    }

    pub fn matches(&self, todo: &Todo) -> bool {
        if self.id.is_some_and(|id| id != todo.id) {
            return false;
        }
        if self.owner.is_some_and(|owner| owner != todo.owner) {
            return false;
        }
        if self.visible_to.is_some_and(|user| !todo.is_visible_to(user)) {
            return false;
        }
        if self.is_completed.is_some_and(|c| c != todo.is_completed) {
            return false;
        }
        if self.priority.is_some_and(|p| p != todo.priority) {
            return false;
        }
        if let Some(category) = &self.category {
            if *category != todo.category {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let hit = todo.title.to_lowercase().contains(needle.as_str())
                || todo.description.to_lowercase().contains(needle.as_str());
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Priority descending, then newest first.
    #[default]
    PriorityThenNewest,
}

impl SortOrder {
    pub fn compare(self, a: &Todo, b: &Todo) -> Ordering {
        match self {
            SortOrder::PriorityThenNewest => b
                .priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        }
    }
}

/// Predicate plus ordering and window, evaluated by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoQuery {
    pub predicate: TodoPredicate,
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl TodoQuery {
    pub fn new(predicate: TodoPredicate) -> Self {
        Self {
            predicate,
            ..Self::default()
        }
    }

    pub fn page(mut self, page: Page) -> Self {
        self.skip = page.skip();
        self.limit = Some(page.limit as usize);
        self
    }

    /// Filters, sorts and windows `todos`.
    pub fn apply<'a, I>(&self, todos: I) -> Vec<Todo>
    where
        I: IntoIterator<Item = &'a Todo>,
    {
        let mut hits: Vec<&Todo> = todos
            .into_iter()
            .filter(|t| self.predicate.matches(t))
            .collect();
        hits.sort_by(|a, b| self.sort.compare(a, b));
        hits.into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn skip(self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: Page, total: u64) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total.div_ceil(u64::from(page.limit)),
        }
    }
}

/// Raw list query string, every value still text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub is_completed: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    pub fn parse(self) -> Result<(TodoFilters, Page), ValidationError> {
        let mut errors = Vec::new();

        let is_completed = self.is_completed.and_then(|raw| match raw.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => {
                errors.push(FieldError::query("isCompleted", "isCompleted must be a boolean"));
                None
            }
        });
        let priority = self.priority.and_then(|raw| {
            match raw.trim().parse::<u8>().ok().map(Priority::try_from) {
                Some(Ok(priority)) => Some(priority),
                _ => {
                    errors.push(FieldError::query("priority", "Priority must be 1, 2, or 3"));
                    None
                }
            }
        });
        let category = bounded(&mut errors, "category", self.category, CATEGORY_MAX, "Category too long");
        let search = bounded(&mut errors, "search", self.search, SEARCH_MAX, "Search query too long");

        let page = match self.page {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => {
                    errors.push(FieldError::query("page", "Page must be a positive integer"));
                    DEFAULT_PAGE
                }
            },
            None => DEFAULT_PAGE,
        };
        let limit = match self.limit {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
                _ => {
                    errors.push(FieldError::query("limit", "Limit must be between 1 and 100"));
                    DEFAULT_LIMIT
                }
            },
            None => DEFAULT_LIMIT,
        };

        let filters = TodoFilters {
            is_completed,
            priority,
            category,
            search,
        };
        ValidationError::check(errors, (filters, Page { page, limit }))
    }
}

/// Trims; blank means "not supplied".
fn bounded(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<String>,
    max: usize,
    message: &str,
) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.chars().count() > max {
        errors.push(FieldError::query(field, message));
        return None;
    }
    Some(value.to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoStatistics {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub high_priority: u64,
    pub overdue: u64,
    pub completion_percentage: f64,
}

impl TodoStatistics {
    /// Single pass over `todos`. Callers pass one owner's todos.
    pub fn collect<'a, I>(todos: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a Todo>,
    {
        let mut stats = todos.into_iter().fold(Self::default(), |mut acc, todo| {
            acc.total += 1;
            if todo.is_completed {
                acc.completed += 1;
            }
            if todo.priority == Priority::High {
                acc.high_priority += 1;
            }
            if todo.is_overdue(now) {
                acc.overdue += 1;
            }
            acc
        });
        stats.pending = stats.total - stats.completed;
        stats.completion_percentage = if stats.total > 0 {
            stats.completed as f64 / stats.total as f64 * 100.0
        } else {
            0.0
        };
        stats
    }
}
