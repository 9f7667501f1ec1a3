/* src/lookup.rs */

//! Outbound lookup services: geolocation of an address and discovery of this
//! host's own public address.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LookupError;

/// Geolocation record, field for field as the geolocation service returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupDetails {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub org: String,
    /// Autonomous system, e.g. `AS15169 Google LLC`.
    #[serde(default, rename = "as")]
    pub asn: String,
    /// The address that was looked up.
    #[serde(default)]
    pub query: String,
    /// Only present when `status` is `fail`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `{"ip": "<address>"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicIp {
    pub ip: String,
}

/// Build the shared outbound client.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, LookupError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Client for the geolocation service. The address is appended to the base
/// URL as a path segment.
#[derive(Debug, Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: String,
}

impl GeoLocator {
    /// Create a locator querying `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Look up `ip`. A `fail` status from the service is reported as
    /// [`LookupError::Rejected`].
    pub async fn lookup(&self, ip: &str) -> Result<LookupDetails, LookupError> {
        let url = format!("{}/{}", self.base_url, ip);
        let body = fetch_text(&self.client, &url).await?;
        let details: LookupDetails = serde_json::from_str(&body)?;

        if details.status == "fail" {
            let reason = details
                .message
                .unwrap_or_else(|| "no reason given".to_string());
            return Err(LookupError::Rejected(reason));
        }

        Ok(details)
    }
}

/// Client for a "what is my IP" service.
#[derive(Debug, Clone)]
pub struct PublicIpClient {
    client: reqwest::Client,
    url: String,
}

impl PublicIpClient {
    /// Create a client querying `url`.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Public address of this host as seen by the service.
    pub async fn fetch(&self) -> Result<String, LookupError> {
        let body = fetch_text(&self.client, &self.url).await?;
        let public: PublicIp = serde_json::from_str(&body)?;
        Ok(public.ip)
    }
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, LookupError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(LookupError::Status { status, body });
    }

    Ok(response.text().await?)
}
