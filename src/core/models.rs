// src/core/models.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::LookupFailure;

// --- Reusable Result Types ---

/// Outcome of a best-effort lookup: a value, nothing found, or a failure.
pub type LookupResult<T> = Result<Option<T>, LookupFailure>;

/// DNS answers keyed by record type (`"A"`, `"MX"`, ...).
pub type DnsRecords = BTreeMap<String, Vec<String>>;

/// Placeholder used when the scanner omits service details.
pub const UNKNOWN: &str = "unknown";

/// Placeholder used when the host-intelligence provider omits a field.
pub const NOT_AVAILABLE: &str = "N/A";

// --- Task Identity ---

/// Opaque task identifier, a random UUID rendered in hyphenated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `None` for anything that is not a UUID. Such ids can never
    /// have been issued, so callers treat them as pending.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// --- Port Scanner Models ---

/// One `<port>` element from the scanner's XML output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFinding {
    pub protocol: String,
    pub port: String,
    pub state: String,
    pub service: String,
    /// `"unknown"` when the port has no service element, `None` when the
    /// service element carries no product attribute.
    pub product: Option<String>,
}

/// What the port scanner adapter produced for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub findings: Option<Vec<PortFinding>>,
    pub error: Option<String>,
}

impl ScanOutcome {
    pub fn completed(findings: Vec<PortFinding>) -> Self {
        Self { findings: Some(findings), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { findings: None, error: Some(error.into()) }
    }
}

// --- Host Intelligence Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub country: String,
    pub city: String,
    pub isp: String,
    pub os: String,
    pub hostnames: Vec<String>,
    pub ports: Vec<u16>,
}

/// Host-intelligence data, or the provider error rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostIntel {
    Info(HostInfo),
    Error { error: String },
}

impl HostIntel {
    pub fn error(message: impl Into<String>) -> Self {
        HostIntel::Error { error: message.into() }
    }
}

// --- Main Result ---

/// The aggregated record published once per task.
///
/// Every field is independently optional and always serialized, so absent
/// steps show up as `null` rather than missing keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub port_scan: Option<Vec<PortFinding>>,
    pub whois: Option<String>,
    pub dns: Option<DnsRecords>,
    pub host_intel: Option<HostIntel>,
    pub error: Option<String>,
}

impl ScanResult {
    /// Error-only record published when the scan sequence dies unexpectedly.
    pub fn aborted(reason: impl fmt::Display) -> Self {
        Self {
            error: Some(format!("Scan task aborted: {reason}")),
            ..Default::default()
        }
    }
}

/// Body of `GET /status/{taskId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
    Complete { data: ScanResult },
    Pending,
}
