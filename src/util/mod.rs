//! Utility functions shared by the fetch paths and the command-line output.
//!
//! - **URL validation**: rejects non-http(s) and private-network targets
//! - **HTTP client**: the shared `reqwest` client configuration
//! - **Text**: terminal-safe, width-aware rendering of feed text

mod http;
mod text;
mod url_validator;

pub use http::build_http_client;
pub use text::{fit_width, single_line};
pub use url_validator::{validate_feed_url, validate_url, UrlValidationError};
