// src/core/scanner/host_intel.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use crate::core::errors::LookupFailure;
use crate::core::models::{HostInfo, HostIntel, NOT_AVAILABLE};
use crate::core::scanner::HostIntelLookup;

pub const DEFAULT_SHODAN_URL: &str = "https://api.shodan.io/";

/// The subset of Shodan's `/shodan/host/{ip}` response that ends up in a result.
#[derive(Debug, Deserialize)]
struct ShodanHost {
    country_name: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    os: Option<String>,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    ports: Vec<u16>,
}

impl From<ShodanHost> for HostInfo {
    fn from(host: ShodanHost) -> Self {
        let or_na = |v: Option<String>| v.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            country: or_na(host.country_name),
            city: or_na(host.city),
            isp: or_na(host.isp),
            os: or_na(host.os),
            hostnames: host.hostnames,
            ports: host.ports,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ShodanError {
    error: String,
}

/// Host-intelligence adapter backed by the Shodan REST API.
pub struct ShodanClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ShodanClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LookupFailure> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("reconweb/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        // `Url::join` drops the last path segment unless it ends in a slash.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| LookupFailure::Api(format!("Invalid Shodan URL `{base_url}`: {e}")))?;

        Ok(Self { client, base_url, api_key })
    }

    /// Fetches the provider's view of `ip`.
    ///
    /// # Arguments
    /// * `ip` - A validated IPv4 address.
    ///
    /// # Returns
    /// The mapped `HostInfo`, or a `LookupFailure`: `Api` for a missing key or
    /// a provider error message, `Http` for transport and decoding failures.
    async fn fetch(&self, ip: &str) -> Result<HostInfo, LookupFailure> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LookupFailure::Api("Shodan API key is not configured".to_string()))?;

        let mut url = self
            .base_url
            .join(&format!("shodan/host/{ip}"))
            .map_err(|e| LookupFailure::Api(format!("Invalid host URL: {e}")))?;
        url.query_pairs_mut().append_pair("key", key);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ShodanError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(LookupFailure::Api(message));
        }

        let host: ShodanHost = response.json().await?;
        Ok(host.into())
    }
}

#[async_trait]
impl HostIntelLookup for ShodanClient {
    async fn lookup(&self, ip: &str) -> HostIntel {
        info!(ip, "Starting host intelligence lookup.");
        match self.fetch(ip).await {
            Ok(info) => {
                info!(ports = info.ports.len(), "Host intelligence lookup finished.");
                HostIntel::Info(info)
            }
            Err(e @ LookupFailure::Api(_)) => {
                warn!(ip, error = %e, "Host intelligence provider returned an error.");
                HostIntel::error(e.to_string())
            }
            Err(e) => {
                error!(ip, error = %e, "Host intelligence lookup failed.");
                HostIntel::error(e.to_string())
            }
        }
    }
}
