use std::time::Duration;

use reqwest::redirect::Policy;

use super::url_validator::ensure_public_host;

const USER_AGENT: &str = concat!("newsroom/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;

/// Redirect policy with a hop limit and loop detection. Unless
/// `allow_private_hosts` is set, redirects to localhost or private
/// addresses are refused.
fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev == url) {
            return attempt.error("redirect loop detected");
        }
        if !allow_private_hosts {
            if let Err(e) = ensure_public_host(url) {
                tracing::warn!(to = %url, error = %e, "Refusing redirect");
                return attempt.error(format!("redirect refused: {e}"));
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Builds the HTTP client shared by feed and article fetches.
///
/// Per-request deadlines are applied by the callers, so the client itself
/// carries only connection-level settings and the redirect policy.
pub fn build_http_client(allow_private_hosts: bool) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect_policy(allow_private_hosts))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}
