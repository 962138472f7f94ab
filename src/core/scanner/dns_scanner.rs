// src/core/scanner/dns_scanner.rs

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use strum::{AsRefStr, EnumIter, IntoEnumIterator, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::core::errors::LookupFailure;
use crate::core::models::{DnsRecords, LookupResult};
use crate::core::scanner::DnsLookup;

/// The record types queried for every domain target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter, IntoStaticStr)]
pub enum DnsRecordKind {
    A,
    #[strum(serialize = "AAAA")]
    Aaaa,
    #[strum(serialize = "MX")]
    Mx,
    #[strum(serialize = "NS")]
    Ns,
    #[strum(serialize = "TXT")]
    Txt,
    #[strum(serialize = "CNAME")]
    Cname,
}

impl From<DnsRecordKind> for RecordType {
    fn from(kind: DnsRecordKind) -> Self {
        match kind {
            DnsRecordKind::A => RecordType::A,
            DnsRecordKind::Aaaa => RecordType::AAAA,
            DnsRecordKind::Mx => RecordType::MX,
            DnsRecordKind::Ns => RecordType::NS,
            DnsRecordKind::Txt => RecordType::TXT,
            DnsRecordKind::Cname => RecordType::CNAME,
        }
    }
}

/// Answers a single record-type query. `Ok(None)` means the name exists
/// but has no records of that type (or does not exist at all).
pub trait RecordSource: Send + Sync {
    fn records(
        &self,
        domain: &str,
        kind: DnsRecordKind,
    ) -> impl Future<Output = LookupResult<Vec<String>>> + Send;
}

impl RecordSource for TokioAsyncResolver {
    async fn records(&self, domain: &str, kind: DnsRecordKind) -> LookupResult<Vec<String>> {
        let wanted = RecordType::from(kind);
        match self.lookup(domain, wanted).await {
            Ok(lookup) => {
                // CNAME chains come back alongside the requested type; keep
                // only answers of the type that was asked for.
                let values: Vec<String> = lookup
                    .iter()
                    .filter(|rdata| rdata.record_type() == wanted)
                    .map(|rdata| rdata.to_string())
                    .collect();
                Ok((!values.is_empty()).then_some(values))
            }
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(None),
            Err(e) => Err(LookupFailure::Dns(e.to_string())),
        }
    }
}

/// Queries every `DnsRecordKind` on its own, in declaration order.
///
/// A type that has no answer or whose lookup fails is left out (failures are
/// logged at `warn`); the remaining types are still queried.
///
/// # Arguments
/// * `source` - Where the answers come from, the system resolver in production.
/// * `domain` - The domain name to query.
///
/// # Returns
/// A `DnsRecords` map from record-type name to answer strings. It is empty
/// when nothing resolved.
pub async fn collect_records<S: RecordSource>(source: &S, domain: &str) -> DnsRecords {
    let mut records = DnsRecords::new();
    for kind in DnsRecordKind::iter() {
        match source.records(domain, kind).await {
            Ok(Some(values)) => {
                debug!(record_type = kind.as_ref(), count = values.len(), "Records found.");
                records.insert(kind.as_ref().to_string(), values);
            }
            Ok(None) => debug!(record_type = kind.as_ref(), "No answer."),
            Err(e) => warn!(domain, record_type = kind.as_ref(), error = %e, "DNS lookup failed."),
        }
    }
    records
}

/// DNS adapter backed by `hickory-resolver`.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Uses the system resolver configuration when it can be read, the
    /// library defaults otherwise.
    pub fn from_system() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!(error = %e, "System resolver config unavailable, using defaults.");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

#[async_trait]
impl DnsLookup for DnsResolver {
    async fn resolve(&self, domain: &str) -> DnsRecords {
        info!(domain, "Starting DNS resolution.");
        let records = collect_records(&self.resolver, domain).await;
        info!(types = records.len(), "DNS resolution finished.");
        records
    }
}
