//! Core data model: queries, categories, pages of items, and request keys.
//!
//! Everything here is a plain value type. Pages are produced by the remote
//! fetcher or the response cache and flow unchanged through the repository
//! and use cases into the list controller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// ============================================================================
// Category
// ============================================================================

/// Content grouping a page request targets.
///
/// `Search` is the only category that carries query text; the others are
/// addressed by identity alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Search,
    Popular,
    TopRated,
    Upcoming,
}

impl Category {
    /// Fixed categories, in tab order.
    pub const FIXED: [Category; 3] = [Category::Popular, Category::TopRated, Category::Upcoming];

    /// Stable identifier used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Search => "search",
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
            Category::Upcoming => "upcoming",
        }
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Category::Search)
    }

    /// Parse the name of one of the [`Category::FIXED`] categories.
    ///
    /// `search` is rejected: a search needs query text, not just a name.
    pub fn parse_fixed(s: &str) -> Result<Category, UnknownCategory> {
        s.parse::<Category>()
            .ok()
            .filter(|category| Category::FIXED.contains(category))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts `snake_case`, `kebab-case`, and squashed spellings
    /// (`top_rated`, `top-rated`, `toprated`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squashed: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match squashed.as_str() {
            "search" => Ok(Category::Search),
            "popular" => Ok(Category::Popular),
            "toprated" => Ok(Category::TopRated),
            "upcoming" => Ok(Category::Upcoming),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

// ============================================================================
// Query
// ============================================================================

/// Free-text search query.
///
/// Equality and hashing use the normalized form (trimmed, lowercased), so
/// `" Batman"` and `"batman"` address the same cached pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The empty query used by fixed categories.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Text as entered by the user.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the query has no non-whitespace content.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Canonical form used for keys and comparisons.
    pub fn normalized(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Item / Page
// ============================================================================

/// One content record within a page.
///
/// `id` is unique within a single category/query result set only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub genre: Option<String>,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl Item {
    /// Minimal item with only identity and title set.
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            genre: None,
            poster_path: None,
            overview: None,
            release_date: None,
        }
    }
}

/// An ordered page of items as delivered by the server.
///
/// `page` is 1-based. `total_pages` is whatever the most recent delivery
/// reported; it may grow or shrink between fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub total_pages: u32,
    pub items: Vec<Item>,
}

impl Page {
    pub fn new(page: u32, total_pages: u32, items: Vec<Item>) -> Self {
        Self {
            page,
            total_pages,
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

// ============================================================================
// RequestKey
// ============================================================================

/// Identity of one page request, shared by the cache and the repository.
///
/// The query component is the normalized search text for `Search` and always
/// empty for fixed categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub category: Category,
    pub query: String,
    pub page: u32,
}

impl RequestKey {
    pub fn new(category: Category, query: &Query, page: u32) -> Self {
        let query = if category.is_search() {
            query.normalized()
        } else {
            String::new()
        };
        Self {
            category,
            query,
            page,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_search() {
            write!(f, "{}:{:?}#{}", self.category, self.query, self.page)
        } else {
            write!(f, "{}#{}", self.category, self.page)
        }
    }
}
