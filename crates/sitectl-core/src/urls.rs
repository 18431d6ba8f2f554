//! URL helpers for page metadata

use std::net::IpAddr;
use url::Url;

/// Parse `raw` as an absolute http(s) URL with a host
pub fn absolute_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// True when `raw` is an absolute URL pointing at a loopback host
pub fn is_loopback_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    match url.host() {
        Some(url::Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(url::Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(url::Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

/// `<scheme>://<host[:port]>/og/<page>.png` derived from a canonical URL.
///
/// Returns `None` when the canonical URL is missing or not absolute http(s).
pub fn og_image_url(canonical: &str, page: &str) -> Option<String> {
    let url = absolute_http_url(canonical)?;
    let host = url.host_str()?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Some(format!("{}://{}/og/{}.png", url.scheme(), authority, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback_url("http://localhost:8080/"));
        assert!(is_loopback_url("http://127.0.0.1/page"));
        assert!(is_loopback_url("http://[::1]/"));
        assert!(is_loopback_url("https://app.localhost/"));
        assert!(!is_loopback_url("https://example.com/"));
        assert!(!is_loopback_url("/relative"));
    }

    #[test]
    fn test_og_image_url() {
        assert_eq!(
            og_image_url("https://example.com/about", "about").as_deref(),
            Some("https://example.com/og/about.png")
        );
        assert_eq!(
            og_image_url("http://localhost:3000/", "home").as_deref(),
            Some("http://localhost:3000/og/home.png")
        );
        assert_eq!(og_image_url("/about", "about"), None);
        assert_eq!(og_image_url("ftp://example.com/", "x"), None);
    }
}
