//! Request validation and work-item resolution.
//!
//! [`ListNewsParams`] carries the caller's raw strings; [`ListNewsParams::validate`]
//! turns them into a typed [`ListNewsRequest`] or a single
//! [`NewsError::Argument`], without touching the network.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::NewsError;
use super::types::{Category, FeedWorkItem, Provider, SortDirection};
use crate::util::validate_feed_url;

// ============================================================================
// Known Feed URL Table
// ============================================================================

/// Static mapping of provider and category to feed URL.
///
/// Every provider in the table has a `general` entry, which is used when a
/// requested category is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTable {
    feeds: BTreeMap<Provider, BTreeMap<Category, String>>,
}

impl Default for FeedTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert(
            Provider::Bbc,
            Category::General,
            "http://feeds.bbci.co.uk/news/uk/rss.xml",
        );
        table.insert(
            Provider::Bbc,
            Category::Technology,
            "http://feeds.bbci.co.uk/news/technology/rss.xml",
        );
        table.insert(
            Provider::Sky,
            Category::General,
            "http://feeds.skynews.com/feeds/rss/uk.xml",
        );
        table.insert(
            Provider::Sky,
            Category::Technology,
            "http://feeds.skynews.com/feeds/rss/technology.xml",
        );
        table
    }
}

impl FeedTable {
    pub fn empty() -> Self {
        Self {
            feeds: BTreeMap::new(),
        }
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, provider: Provider, category: Category, url: impl Into<String>) {
        self.feeds
            .entry(provider)
            .or_default()
            .insert(category, url.into());
    }

    /// Removes every entry for `provider`.
    pub fn remove_provider(&mut self, provider: Provider) {
        self.feeds.remove(&provider);
    }

    /// Resolves a feed URL, falling back to the provider's `general` feed.
    pub fn feed_url(&self, provider: Provider, category: Category) -> Option<&str> {
        let feeds = self.feeds.get(&provider)?;
        feeds
            .get(&category)
            .or_else(|| feeds.get(&Category::General))
            .map(String::as_str)
    }

    /// Providers that have at least a `general` feed, in table order.
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.feeds
            .iter()
            .filter(|(_, feeds)| feeds.contains_key(&Category::General))
            .map(|(provider, _)| *provider)
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.feed_url(provider, Category::General).is_some()
    }
}

// ============================================================================
// Raw and Validated Requests
// ============================================================================

/// Aggregation parameters exactly as the caller supplied them.
///
/// Empty lists and empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNewsParams {
    pub providers: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub source_url: Option<String>,
    pub sort: Option<String>,
}

/// What to fetch for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSelection {
    /// Cross product of providers and categories from the feed table.
    Providers {
        providers: Vec<Provider>,
        categories: Vec<Category>,
    },
    /// A single ad-hoc feed, tagged [`Provider::Other`].
    SourceUrl(Url),
}

/// A validated aggregation request with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListNewsRequest {
    pub selection: FeedSelection,
    pub sort: SortDirection,
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref()
        .filter(|values| values.iter().any(|v| !v.trim().is_empty()))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses every non-blank entry, keeping first occurrences only.
fn parse_list<T>(values: &[String]) -> Result<Vec<T>, NewsError>
where
    T: std::str::FromStr<Err = NewsError> + PartialEq,
{
    let mut parsed: Vec<T> = Vec::with_capacity(values.len());
    for value in values.iter().filter(|v| !v.trim().is_empty()) {
        let item = value.parse()?;
        if !parsed.contains(&item) {
            parsed.push(item);
        }
    }
    Ok(parsed)
}

impl ListNewsParams {
    /// Checks every field and resolves defaults.
    ///
    /// With neither providers nor a source URL, every provider in `table`
    /// is selected; categories default to `general`.
    ///
    /// # Errors
    ///
    /// [`NewsError::Argument`] for an unknown sort direction, provider or
    /// category, a provider without feeds, a source URL combined with
    /// providers or categories, or an unusable source URL.
    pub fn validate(
        &self,
        table: &FeedTable,
        allow_private_hosts: bool,
    ) -> Result<ListNewsRequest, NewsError> {
        let sort = match non_blank(&self.sort) {
            Some(sort) => sort.parse()?,
            None => SortDirection::default(),
        };

        let providers = non_empty(&self.providers);
        let categories = non_empty(&self.categories);
        let source_url = non_blank(&self.source_url);

        if let Some(source_url) = source_url {
            if providers.is_some() || categories.is_some() {
                return Err(NewsError::argument(
                    "source url cannot be combined with providers or categories",
                ));
            }
            let url = validate_feed_url(source_url, allow_private_hosts)
                .map_err(|e| NewsError::argument(format!("source url: {e}")))?;
            return Ok(ListNewsRequest {
                selection: FeedSelection::SourceUrl(url),
                sort,
            });
        }

        let providers: Vec<Provider> = match providers {
            Some(values) => {
                let parsed = parse_list(values)?;
                if let Some(missing) = parsed.iter().find(|p| !table.has_provider(**p)) {
                    return Err(NewsError::argument(format!(
                        "provider: {missing} has no known feeds"
                    )));
                }
                parsed
            }
            None => table.providers().collect(),
        };

        let categories = match categories {
            Some(values) => parse_list(values)?,
            None => vec![Category::General],
        };

        Ok(ListNewsRequest {
            selection: FeedSelection::Providers {
                providers,
                categories,
            },
            sort,
        })
    }
}

impl ListNewsRequest {
    /// Expands the selection into work items in launch order.
    ///
    /// Providers vary slowest. Items resolving to the same provider and URL
    /// after category fallback are fetched once.
    pub fn work_items(&self, table: &FeedTable) -> Vec<FeedWorkItem> {
        match &self.selection {
            FeedSelection::SourceUrl(url) => vec![FeedWorkItem {
                provider: Provider::Other,
                url: url.to_string(),
            }],
            FeedSelection::Providers {
                providers,
                categories,
            } => {
                let mut seen = HashSet::new();
                providers
                    .iter()
                    .flat_map(|provider| {
                        categories.iter().filter_map(move |category| {
                            table
                                .feed_url(*provider, *category)
                                .map(|url| FeedWorkItem {
                                    provider: *provider,
                                    url: url.to_string(),
                                })
                        })
                    })
                    .filter(|item| seen.insert(item.clone()))
                    .collect()
            }
        }
    }

    /// Canonical text form used to key cached responses.
    pub fn cache_key(&self) -> String {
        let selection = match &self.selection {
            FeedSelection::SourceUrl(url) => format!("source={url}"),
            FeedSelection::Providers {
                providers,
                categories,
            } => {
                let mut providers: Vec<&str> = providers.iter().map(Provider::as_str).collect();
                let mut categories: Vec<&str> = categories.iter().map(Category::as_str).collect();
                providers.sort_unstable();
                categories.sort_unstable();
                format!(
                    "providers={}|categories={}",
                    providers.join(","),
                    categories.join(",")
                )
            }
        };
        format!("news|{selection}|sort={}", self.sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Option<Vec<String>> {
        Some(values.iter().map(|v| v.to_string()).collect())
    }

    fn validate(params: ListNewsParams) -> Result<ListNewsRequest, NewsError> {
        params.validate(&FeedTable::default(), false)
    }

    #[test]
    fn test_defaults_select_all_providers_general_desc() {
        let request = validate(ListNewsParams::default()).unwrap();

        assert_eq!(request.sort, SortDirection::Desc);
        assert_eq!(
            request.selection,
            FeedSelection::Providers {
                providers: vec![Provider::Bbc, Provider::Sky],
                categories: vec![Category::General],
            }
        );
        assert_eq!(
            request.work_items(&FeedTable::default()),
            vec![
                FeedWorkItem {
                    provider: Provider::Bbc,
                    url: "http://feeds.bbci.co.uk/news/uk/rss.xml".into(),
                },
                FeedWorkItem {
                    provider: Provider::Sky,
                    url: "http://feeds.skynews.com/feeds/rss/uk.xml".into(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_lists_treated_as_absent() {
        let request = validate(ListNewsParams {
            providers: Some(Vec::new()),
            categories: strings(&[""]),
            sort: Some(" ".into()),
            ..ListNewsParams::default()
        })
        .unwrap();
        assert_eq!(request, validate(ListNewsParams::default()).unwrap());
    }

    #[test]
    fn test_unknown_values_rejected() {
        let cases = [
            ListNewsParams {
                providers: strings(&["bbc", "cnn"]),
                ..ListNewsParams::default()
            },
            ListNewsParams {
                categories: strings(&["sport"]),
                ..ListNewsParams::default()
            },
            ListNewsParams {
                sort: Some("sideways".into()),
                ..ListNewsParams::default()
            },
            ListNewsParams {
                providers: strings(&["other"]),
                ..ListNewsParams::default()
            },
        ];
        for params in cases {
            let err = validate(params.clone()).unwrap_err();
            assert!(err.is_argument(), "{params:?} gave {err}");
        }
    }

    #[test]
    fn test_source_url_is_exclusive() {
        for params in [
            ListNewsParams {
                providers: strings(&["bbc"]),
                source_url: Some("https://example.com/feed.xml".into()),
                ..ListNewsParams::default()
            },
            ListNewsParams {
                categories: strings(&["technology"]),
                source_url: Some("https://example.com/feed.xml".into()),
                ..ListNewsParams::default()
            },
        ] {
            assert!(validate(params).unwrap_err().is_argument());
        }
    }

    #[test]
    fn test_source_url_validation() {
        for bad in [
            "not a url",
            "ftp://example.com/feed.xml",
            "https://example.com/feed",
            "http://127.0.0.1/feed.xml",
        ] {
            let err = validate(ListNewsParams {
                source_url: Some(bad.into()),
                ..ListNewsParams::default()
            })
            .unwrap_err();
            assert!(err.is_argument(), "{bad}");
        }

        let request = validate(ListNewsParams {
            source_url: Some("https://example.com/feed.xml".into()),
            sort: Some("asc".into()),
            ..ListNewsParams::default()
        })
        .unwrap();
        assert_eq!(request.sort, SortDirection::Asc);
        assert_eq!(
            request.work_items(&FeedTable::default()),
            vec![FeedWorkItem {
                provider: Provider::Other,
                url: "https://example.com/feed.xml".into(),
            }]
        );
    }

    #[test]
    fn test_category_falls_back_to_general() {
        let mut table = FeedTable::empty();
        table.insert(Provider::Sky, Category::General, "https://sky.example/uk.xml");

        let request = ListNewsParams {
            providers: strings(&["sky"]),
            categories: strings(&["technology"]),
            ..ListNewsParams::default()
        }
        .validate(&table, false)
        .unwrap();

        assert_eq!(
            request.work_items(&table),
            vec![FeedWorkItem {
                provider: Provider::Sky,
                url: "https://sky.example/uk.xml".into(),
            }]
        );
    }

    #[test]
    fn test_fallback_duplicates_collapse() {
        let mut table = FeedTable::empty();
        table.insert(Provider::Sky, Category::General, "https://sky.example/uk.xml");

        let request = ListNewsParams {
            categories: strings(&["general", "technology", "general"]),
            ..ListNewsParams::default()
        }
        .validate(&table, false)
        .unwrap();

        assert_eq!(request.work_items(&table).len(), 1);
    }

    #[test]
    fn test_work_items_cross_product_order() {
        let request = validate(ListNewsParams {
            providers: strings(&["sky", "bbc"]),
            categories: strings(&["technology", "general"]),
            ..ListNewsParams::default()
        })
        .unwrap();

        let urls: Vec<String> = request
            .work_items(&FeedTable::default())
            .into_iter()
            .map(|item| item.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://feeds.skynews.com/feeds/rss/technology.xml",
                "http://feeds.skynews.com/feeds/rss/uk.xml",
                "http://feeds.bbci.co.uk/news/technology/rss.xml",
                "http://feeds.bbci.co.uk/news/uk/rss.xml",
            ]
        );
    }

    #[test]
    fn test_cache_key_ignores_list_order() {
        let a = validate(ListNewsParams {
            providers: strings(&["sky", "bbc"]),
            ..ListNewsParams::default()
        })
        .unwrap();
        let b = validate(ListNewsParams {
            providers: strings(&["bbc", "sky"]),
            sort: Some("DESC".into()),
            ..ListNewsParams::default()
        })
        .unwrap();
        let c = validate(ListNewsParams {
            sort: Some("ASC".into()),
            ..ListNewsParams::default()
        })
        .unwrap();

        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }
}
