use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

/// Reasons a caller-supplied URL is refused before any request is made.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Feed URLs must name an XML document.
    #[error("source url must point to an .xml document")]
    NotXml,
    #[error("localhost not allowed")]
    Localhost,
    #[error("private IP address not allowed: {0}")]
    PrivateIp(IpAddr),
}

/// Parses `input` as an absolute http(s) URL with a host.
///
/// Unless `allow_private_hosts` is set, `localhost` and loopback, private,
/// link-local and unspecified IP literals are rejected. Hostnames are not
/// resolved, so a public name pointing at a private address still passes.
pub fn validate_url(input: &str, allow_private_hosts: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(input.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host().ok_or(UrlValidationError::MissingHost)?;
    if !allow_private_hosts {
        check_public(&host)?;
    }

    Ok(url)
}

/// [`validate_url`] plus the requirement that the path ends in `.xml`.
pub fn validate_feed_url(input: &str, allow_private_hosts: bool) -> Result<Url, UrlValidationError> {
    let url = validate_url(input, allow_private_hosts)?;
    if !url.path().to_ascii_lowercase().ends_with(".xml") {
        return Err(UrlValidationError::NotXml);
    }
    Ok(url)
}

/// Host check alone, for URLs that were not supplied by the caller (such
/// as redirect targets).
pub(crate) fn ensure_public_host(url: &Url) -> Result<(), UrlValidationError> {
    let host = url.host().ok_or(UrlValidationError::MissingHost)?;
    check_public(&host)
}

fn check_public(host: &Host<&str>) -> Result<(), UrlValidationError> {
    let ip = match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.');
            if name.eq_ignore_ascii_case("localhost")
                || name.to_ascii_lowercase().ends_with(".localhost")
            {
                return Err(UrlValidationError::Localhost);
            }
            return Ok(());
        }
        Host::Ipv4(v4) => IpAddr::V4(*v4),
        Host::Ipv6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(*v6),
        },
    };

    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let private = match ip {
        IpAddr::V4(v4) => is_private_v4(&v4),
        IpAddr::V6(v6) => is_private_v6(&v6),
    };
    if private {
        return Err(UrlValidationError::PrivateIp(ip));
    }
    Ok(())
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_private_v6(ip: &Ipv6Addr) -> bool {
    if ip.is_unspecified() {
        return true;
    }
    let first = ip.segments()[0];
    // fc00::/7 unique local, fe80::/10 link-local
    (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
}
