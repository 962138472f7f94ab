// src/core/scanner/whois_scanner.rs

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::core::errors::LookupFailure;
use crate::core::models::LookupResult;
use crate::core::scanner::WhoisLookup;

pub const DEFAULT_WHOIS_SERVER: &str = "whois.iana.org";
pub const WHOIS_PORT: u16 = 43;

/// Line prefixes that mean the registry has no record for the domain.
const NO_MATCH_MARKERS: &[&str] = &[
    "no match for",
    "not found",
    "no data found",
    "no entries found",
    "status: free",
    "domain not found",
];

/// RFC 3912 client: asks the bootstrap server which registry serves the
/// TLD, then asks that registry about the domain.
pub struct WhoisClient {
    bootstrap: String,
    port: u16,
    timeout: Duration,
}

impl WhoisClient {
    /// `bootstrap` may carry an explicit `host:port`; referred servers are
    /// always contacted on `port`.
    pub fn new(bootstrap: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self { bootstrap: bootstrap.into(), port, timeout }
    }

    fn address(&self, server: &str) -> String {
        if server.contains(':') {
            server.to_string()
        } else {
            format!("{server}:{}", self.port)
        }
    }

    async fn query(&self, server: &str, query: &str) -> Result<String, LookupFailure> {
        let addr = self.address(server);
        debug!(server = %addr, query, "Sending WHOIS query.");

        let exchange = async {
            let mut stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| LookupFailure::Connect { server: addr.clone(), source })?;
            let io_err = |source: std::io::Error| LookupFailure::Io { server: addr.clone(), source };
            stream.write_all(format!("{query}\r\n").as_bytes()).await.map_err(io_err)?;
            let mut response = Vec::new();
            stream.read_to_end(&mut response).await.map_err(io_err)?;
            Ok::<_, LookupFailure>(String::from_utf8_lossy(&response).into_owned())
        };

        timeout(self.timeout, exchange)
            .await
            .map_err(|_| LookupFailure::TimedOut { service: "WHOIS" })?
    }
}

#[async_trait]
impl WhoisLookup for WhoisClient {
    /// Resolves the registry for the domain's TLD through the bootstrap
    /// server, then asks that registry for the domain record.
    ///
    /// # Arguments
    /// * `domain` - A validated domain name.
    ///
    /// # Returns
    /// `Ok(Some(record))` with the raw registry text, `Ok(None)` when the
    /// registry has no match, or a `LookupFailure` for connection, timeout or
    /// referral problems.
    async fn lookup(&self, domain: &str) -> LookupResult<String> {
        info!(domain, "Starting WHOIS lookup.");
        let tld = domain.rsplit('.').next().unwrap_or(domain);

        let bootstrap = self.query(&self.bootstrap, tld).await?;
        let server = parse_referral(&bootstrap)
            .ok_or_else(|| LookupFailure::NoWhoisServer(tld.to_string()))?;

        let record = self.query(&server, domain).await?;
        if is_no_match(&record) {
            info!(domain, server = %server, "Registry has no record for domain.");
            return Ok(None);
        }
        info!(domain, server = %server, bytes = record.len(), "WHOIS lookup finished.");
        Ok(Some(record))
    }
}

/// Finds the `refer:` (IANA) or `whois:` line naming the authoritative server.
pub fn parse_referral(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        ((key == "refer" || key == "whois") && !value.is_empty()).then(|| value.to_string())
    })
}

/// A reply is a "no match" when it is empty or a non-comment line starts
/// with one of the markers. Markers elsewhere in a line do not count.
fn is_no_match(record: &str) -> bool {
    if record.trim().is_empty() {
        return true;
    }
    record
        .lines()
        .map(|line| line.trim_start().to_ascii_lowercase())
        .filter(|line| !line.starts_with('%') && !line.starts_with('#'))
        .any(|line| NO_MATCH_MARKERS.iter().any(|m| line.starts_with(m)))
}
