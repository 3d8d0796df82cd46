use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::NewsError;

// ============================================================================
// Enumerations
// ============================================================================

/// Identity of a news provider.
///
/// `Other` tags items that came from an ad-hoc source URL rather than one of
/// the known providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Bbc,
    Sky,
    Other,
}

impl Provider {
    /// Providers with entries in the built-in feed table, in default fetch order.
    pub const KNOWN: [Provider; 2] = [Provider::Bbc, Provider::Sky];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Bbc => "bbc",
            Provider::Sky => "sky",
            Provider::Other => "other",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bbc" => Ok(Provider::Bbc),
            "sky" => Ok(Provider::Sky),
            "other" => Ok(Provider::Other),
            other => Err(NewsError::argument(format!(
                "provider: {other} is invalid must be `sky`, `bbc`"
            ))),
        }
    }
}

/// Feed category. Every provider has a `General` feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Technology,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Technology => "technology",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "general" => Ok(Category::General),
            "technology" => Ok(Category::Technology),
            other => Err(NewsError::argument(format!(
                "category: {other} is invalid must be `general`, `technology`"
            ))),
        }
    }
}

/// Publish-date ordering of the aggregated result. Defaults to newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = NewsError;

    /// An empty string selects the default direction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("DESC") {
            Ok(SortDirection::Desc)
        } else if s.eq_ignore_ascii_case("ASC") {
            Ok(SortDirection::Asc)
        } else {
            Err(NewsError::argument(
                "please provide a valid sort by publish date ASC or DESC",
            ))
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One unit of concurrent work: a provider and the feed URL resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedWorkItem {
    pub provider: Provider,
    pub url: String,
}

/// A feed entry normalized into the common shape shared by all providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub publish_date: DateTime<Utc>,
    pub provider: Provider,
    pub provider_logo_url: String,
}

/// The merged, sorted result of one aggregation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNewsResponse {
    pub news: Vec<NewsItem>,
}

/// A single article scraped from its web page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
}
