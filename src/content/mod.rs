//! Single-article enrichment: fetch one page and scrape its headline,
//! description and body with `scraper`.

mod article;

pub use article::{
    extract_article, ArticleClient, DEFAULT_ARTICLE_TIMEOUT, DEFAULT_MAX_ARTICLE_BYTES,
};
