/* src/extractor.rs */

use std::collections::HashMap;
use std::net::IpAddr;

/// Type alias for header maps. Keys are expected to be lowercase header names.
pub type HeaderMap = HashMap<String, String>;

/// Forwarding headers examined by default, in order of preference.
pub const FORWARDING_HEADERS: [&str; 8] = [
    "HTTP_CLIENT_IP",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_FORWARDED",
    "HTTP_X_CLUSTER_CLIENT_IP",
    "HTTP_FORWARDED_FOR",
    "HTTP_FORWARDED",
    "X-Forwarded-For",
    "X-Real-IP",
];

/// Resolves the client address of a request from forwarding headers,
/// falling back to the peer address of the connection.
#[derive(Debug, Clone)]
pub struct IpExtractor {
    /// Headers to check for the client IP, in order of preference.
    pub headers: Vec<String>,
}

impl Default for IpExtractor {
    fn default() -> Self {
        Self {
            headers: FORWARDING_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl IpExtractor {
    /// Create a new extractor with the default header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headers to check for the client IP.
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    /// Resolve the client address.
    ///
    /// The first public address found in the configured headers wins. When no
    /// header yields one, the host part of `peer_addr` is returned unfiltered,
    /// or an empty string if `peer_addr` is not a `host:port` pair.
    pub fn extract(&self, headers: &HeaderMap, peer_addr: &str) -> String {
        if let Some(ip) = self.extract_from_headers(headers) {
            return ip.to_string();
        }

        split_host(peer_addr).unwrap_or_default().to_string()
    }

    fn extract_from_headers<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        self.headers
            .iter()
            .filter_map(|name| headers.get(&name.to_lowercase()))
            .filter(|value| !value.is_empty())
            .find_map(|value| parse_header_value(value))
    }
}

/// Returns the first public address in a comma separated header value, as written.
fn parse_header_value(value: &str) -> Option<&str> {
    value.split(',').map(str::trim).find(|token| {
        token
            .parse::<IpAddr>()
            .map(|ip| is_public_ip(&ip))
            .unwrap_or(false)
    })
}

/// An address is public unless it is private, loopback or link-local unicast.
/// IPv4-mapped IPv6 addresses are classified as IPv4.
fn is_public_ip(ip: &IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(ipv4) => !(ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local()),
        IpAddr::V6(ipv6) => {
            !(ipv6.is_unique_local() || ipv6.is_loopback() || ipv6.is_unicast_link_local())
        }
    }
}

/// Host part of a `host:port` or `[host]:port` address.
fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, port) = rest.split_once(']')?;
        let port = port.strip_prefix(':')?;
        if port.contains(['[', ']']) {
            return None;
        }
        return Some(host);
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains(['[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some(host)
}

/// Resolve the client address with the default forwarding header list.
///
/// # Examples
///
/// ```rust
/// use iplog::{HeaderMap, extract_client_ip};
/// use std::collections::HashMap;
///
/// let mut headers: HeaderMap = HashMap::new();
/// headers.insert("x-real-ip".to_string(), "203.0.113.9".to_string());
///
/// assert_eq!(extract_client_ip(&headers, "127.0.0.1:4000"), "203.0.113.9");
/// assert_eq!(extract_client_ip(&HashMap::new(), "127.0.0.1:4000"), "127.0.0.1");
/// ```
pub fn extract_client_ip(headers: &HeaderMap, peer_addr: &str) -> String {
    IpExtractor::default().extract(headers, peer_addr)
}
