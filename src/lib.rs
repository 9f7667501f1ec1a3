/* src/lib.rs */
//! # iplog
//!
//! A small HTTP service that reports the real client IP address of a request,
//! resolved from common forwarding headers with a fallback to the remote
//! socket address, and logs it.
//!
//! ## Routes
//!
//! - `GET /log-ip` - the caller's address as `Your IP: <address>`, or its
//!   geolocation record as JSON when running in enriched mode
//! - `GET /ip` - this server's own public address as `{"ip": "<address>"}`
//!
//! ## Resolving an address
//!
//! ```rust
//! use iplog::{HeaderMap, extract_client_ip};
//! use std::collections::HashMap;
//!
//! let mut headers: HeaderMap = HashMap::new();
//! headers.insert("x-forwarded-for".to_string(), "10.0.0.1, 198.51.100.7".to_string());
//!
//! // Private, loopback and link-local addresses in headers are skipped.
//! assert_eq!(extract_client_ip(&headers, "192.0.2.1:5000"), "198.51.100.7");
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod lookup;
pub mod middleware;
pub mod routes;

pub use config::{Config, LogConfig, ResponseMode};
pub use error::{Error, LookupError, Result};
pub use extractor::{FORWARDING_HEADERS, HeaderMap, IpExtractor, extract_client_ip};
pub use lookup::{GeoLocator, LookupDetails, PublicIp, PublicIpClient};
pub use middleware::{ClientIp, ClientIpLayer, ClientIpService};
pub use routes::{AppState, create_router};
