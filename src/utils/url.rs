// src/utils/url.rs

//! Permalink and URL utilities.

use url::Url;

/// Extract a post identifier from a permalink href.
///
/// Permalinks carry the id in the path segment following `status`, e.g.
/// `/someone/status/1845220/photo/1` yields `1845220`. Works for both
/// relative hrefs and absolute URLs.
pub fn extract_post_id(href: &str) -> Option<String> {
    let path = href
        .split(['?', '#'])
        .next()
        .unwrap_or(href);

    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        if segment == "status" {
            let id = segments.next()?;
            if id.is_empty() {
                return None;
            }
            return Some(id.to_string());
        }
    }
    None
}

/// Resolve a potentially relative permalink against a base URL.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(base)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|u| u.to_string())
}
