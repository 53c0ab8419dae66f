//! URL decomposition into rule-addressable parts
//!
//! The scanning helpers work directly on string slices; only the final
//! [`Address`] owns its parts.

use std::fmt;

use crate::psl::split_host;

/// Error type for URL decomposition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("URL has no scheme separator: {0}")]
    MissingScheme(String),
    #[error("URL has an empty host: {0}")]
    EmptyHost(String),
}

/// A URL split into the parts rules are keyed on.
///
/// `protocol` keeps its `://` suffix, `query` keeps its leading `?` (or `#`
/// when there is only a fragment), and `path` always starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address {
    pub protocol: String,
    pub subdomain: String,
    pub domain: String,
    pub path: String,
    pub query: String,
}

impl Address {
    /// Full hostname (`subdomain.domain`).
    pub fn host(&self) -> String {
        if self.subdomain.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }

    /// Policy-tree path for this address: domain, subdomain, page.
    pub fn site_path(&self) -> [&str; 3] {
        [&self.domain, &self.subdomain, &self.path]
    }

    /// Script-list path for this address: domain, subdomain.
    pub fn origin_path(&self) -> [&str; 2] {
        [&self.domain, &self.subdomain]
    }

    /// Check if this is a websocket address.
    pub fn is_websocket(&self) -> bool {
        self.protocol == "ws://" || self.protocol == "wss://"
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", self.protocol, self.host(), self.path, self.query)
    }
}

// =============================================================================
// Decomposition
// =============================================================================

/// Split a URL into `{protocol, subdomain, domain, path, query}`.
///
/// The host is lowercased, and userinfo, port and a trailing dot are dropped
/// before the registrable-domain split.
pub fn decompose(url: &str) -> Result<Address, AddressError> {
    let scheme_end = get_scheme_end(url).ok_or_else(|| AddressError::MissingScheme(url.to_string()))?;
    let (host_start, host_end) = get_host_position(url, scheme_end);

    let host = url[host_start..host_end].trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(AddressError::EmptyHost(url.to_string()));
    }

    let rest = &url[host_end..];
    // skip the port, the path starts at the first '/', '?' or '#'
    let rest_start = rest
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    let rest = &rest[rest_start..];

    let query_start = rest.find(|c: char| c == '?' || c == '#').unwrap_or(rest.len());
    let path = match &rest[..query_start] {
        "" => "/",
        p => p,
    };

    let (subdomain, domain) = split_host(&host);

    Ok(Address {
        protocol: url[..scheme_end].to_ascii_lowercase(),
        subdomain: subdomain.to_string(),
        domain: domain.to_string(),
        path: path.to_string(),
        query: rest[query_start..].to_string(),
    })
}

// =============================================================================
// Scanning Helpers
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    // Find ':'
    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    if colon_pos == 0 {
        return None;
    }

    // Check for "://"
    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Get the start and end positions of the hostname, skipping userinfo and
/// stopping before a port.
#[inline]
pub fn get_host_position(url: &str, scheme_end: usize) -> (usize, usize) {
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' || b == b'?' || b == b'#' {
            break;
        }
    }

    // Find host end
    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    (host_start, host_end)
}

/// Check if the URL is one the engine evaluates (has a `scheme://host`).
#[inline]
pub fn is_decomposable(url: &str) -> bool {
    get_scheme_end(url).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_full() {
        let addr = decompose("https://static.cdn.example.com/js/a.js?x=1").unwrap();
        assert_eq!(addr.protocol, "https://");
        assert_eq!(addr.subdomain, "static.cdn");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(addr.path, "/js/a.js");
        assert_eq!(addr.query, "?x=1");
    }

    #[test]
    fn test_decompose_two_labels() {
        let addr = decompose("http://example.com/").unwrap();
        assert_eq!(addr.subdomain, "");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(addr.path, "/");
        assert_eq!(addr.query, "");
    }

    #[test]
    fn test_decompose_regional() {
        let addr = decompose("https://www.example.co.uk/index.html").unwrap();
        assert_eq!(addr.subdomain, "www");
        assert_eq!(addr.domain, "example.co.uk");

        let addr = decompose("https://example.co.uk/").unwrap();
        assert_eq!(addr.subdomain, "");
        assert_eq!(addr.domain, "example.co.uk");
    }

    #[test]
    fn test_decompose_no_path() {
        let addr = decompose("https://example.com").unwrap();
        assert_eq!(addr.path, "/");
        let addr = decompose("https://example.com?q=1").unwrap();
        assert_eq!(addr.path, "/");
        assert_eq!(addr.query, "?q=1");
    }

    #[test]
    fn test_decompose_strips_port_userinfo_case() {
        let addr = decompose("WSS://user:pw@Chat.Example.COM:8443/socket").unwrap();
        assert_eq!(addr.protocol, "wss://");
        assert_eq!(addr.subdomain, "chat");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(addr.path, "/socket");
        assert!(addr.is_websocket());
    }

    #[test]
    fn test_decompose_fragment_goes_to_query() {
        let addr = decompose("https://example.com/page#top").unwrap();
        assert_eq!(addr.path, "/page");
        assert_eq!(addr.query, "#top");
    }

    #[test]
    fn test_decompose_errors() {
        assert_eq!(
            decompose("about:blank"),
            Err(AddressError::MissingScheme("about:blank".to_string()))
        );
        assert!(matches!(decompose("example.com/a"), Err(AddressError::MissingScheme(_))));
        assert!(matches!(decompose("https:///path"), Err(AddressError::EmptyHost(_))));
    }

    #[test]
    fn test_display_round_trip() {
        let url = "https://static.cdn.example.com/js/a.js?x=1";
        assert_eq!(decompose(url).unwrap().to_string(), url);
    }

    #[test]
    fn test_get_scheme_end() {
        assert_eq!(get_scheme_end("https://example.com"), Some(8));
        assert_eq!(get_scheme_end("data:text/html"), None);
        assert_eq!(get_scheme_end("://x"), None);
    }
}
