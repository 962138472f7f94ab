// src/core/scanner/mod.rs

//! Scan orchestration and the adapter seams it drives.
//!
//! Every adapter is failure-isolated: whatever goes wrong inside one ends up
//! as a field of the aggregated `ScanResult`, never as an early return.

pub mod dns_scanner;
pub mod host_intel;
pub mod port_scanner;
pub mod whois_scanner;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, info_span, warn, Instrument};

use crate::core::errors::StoreError;
use crate::core::models::{DnsRecords, HostIntel, LookupResult, ScanOutcome, ScanResult, TaskId};
use crate::core::store::ResultStore;
use crate::core::target::Target;

#[async_trait]
pub trait PortScanner: Send + Sync {
    async fn scan(&self, target: &Target) -> ScanOutcome;
}

#[async_trait]
pub trait WhoisLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> LookupResult<String>;
}

#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn resolve(&self, domain: &str) -> DnsRecords;
}

#[async_trait]
pub trait HostIntelLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> HostIntel;
}

/// The set of collaborators a scan runs against.
#[derive(Clone)]
pub struct Adapters {
    pub port_scanner: Arc<dyn PortScanner>,
    pub whois: Arc<dyn WhoisLookup>,
    pub dns: Arc<dyn DnsLookup>,
    pub host_intel: Arc<dyn HostIntelLookup>,
}

/// Runs the applicable adapters for `target`, one after another.
///
/// The port scan always runs. WHOIS and DNS run only for domain targets,
/// host intelligence only for IPv4 targets.
pub async fn run_full_scan(adapters: &Adapters, target: &Target) -> ScanResult {
    let mut result = ScanResult::default();

    let outcome = adapters.port_scanner.scan(target).await;
    result.port_scan = outcome.findings;
    result.error = outcome.error;

    if target.is_domain() {
        result.whois = match adapters.whois.lookup(target.as_str()).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "WHOIS lookup failed, leaving it out.");
                None
            }
        };
        result.dns = Some(adapters.dns.resolve(target.as_str()).await);
    }

    if target.is_ipv4() {
        result.host_intel = Some(adapters.host_intel.lookup(target.as_str()).await);
    }

    result
}

/// One accepted submission.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub task_id: TaskId,
    pub target: Target,
}

/// Runs jobs and publishes exactly one record per job.
pub struct Orchestrator {
    adapters: Adapters,
    store: Arc<dyn ResultStore>,
}

impl Orchestrator {
    pub fn new(adapters: Adapters, store: Arc<dyn ResultStore>) -> Self {
        Self { adapters, store }
    }

    /// Runs the scan and publishes its result.
    ///
    /// The scan itself runs in its own task so that a panic inside an adapter
    /// still leads to a published (error-only) record instead of a task that
    /// stays pending forever.
    pub async fn run(&self, job: ScanJob) -> Result<(), StoreError> {
        let span = info_span!("scan", task_id = %job.task_id, target = %job.target, kind = %job.target.kind());
        async move {
            info!("Scan started.");
            let adapters = self.adapters.clone();
            let target = job.target.clone();
            let handle = tokio::spawn(
                async move { run_full_scan(&adapters, &target).await }.in_current_span(),
            );

            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Scan task died, publishing error-only result.");
                    ScanResult::aborted(e)
                }
            };

            match self.store.publish(&job.task_id, &result).await {
                Ok(()) => {
                    info!(has_error = result.error.is_some(), "Scan published.");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Could not publish scan result.");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::core::scanner::port_scanner::NmapScanner;
    use crate::core::store::MemoryResultStore;

    #[tokio::test]
    async fn domain_target_runs_whois_and_dns_only() {
        let target = Target::parse("example.com").unwrap();
        let result = run_full_scan(&adapters(), &target).await;

        assert_eq!(result.port_scan, Some(vec![ssh_finding()]));
        assert_eq!(result.whois.as_deref(), Some("Domain Name: EXAMPLE.COM"));
        assert_eq!(result.dns.as_ref().unwrap()["A"], vec!["93.184.216.34"]);
        assert_eq!(result.host_intel, None);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn ipv4_target_runs_host_intel_only() {
        let target = Target::parse("203.0.113.5").unwrap();
        let result = run_full_scan(&adapters(), &target).await;

        assert!(result.port_scan.is_some());
        assert!(matches!(result.host_intel, Some(HostIntel::Info(_))));
        assert_eq!(result.whois, None);
        assert_eq!(result.dns, None);
    }

    #[tokio::test]
    async fn whois_failure_is_swallowed() {
        let adapters = Adapters {
            whois: Arc::new(FakeWhois { record: None, fail: true }),
            ..adapters()
        };
        let target = Target::parse("example.com").unwrap();
        let result = run_full_scan(&adapters, &target).await;

        assert_eq!(result.whois, None);
        assert!(result.dns.is_some());
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn scanner_failure_does_not_stop_later_steps() {
        let adapters = adapters_with_scanner(Arc::new(FakePortScanner {
            outcome: ScanOutcome::failed("Nmap scan failed: boom"),
        }));
        let target = Target::parse("example.com").unwrap();
        let result = run_full_scan(&adapters, &target).await;

        assert_eq!(result.port_scan, None);
        assert_eq!(result.error.as_deref(), Some("Nmap scan failed: boom"));
        assert!(result.whois.is_some());
        assert!(result.dns.is_some());
    }

    #[tokio::test]
    async fn missing_scanner_binary_still_publishes() {
        let store = Arc::new(MemoryResultStore::new());
        let adapters = adapters_with_scanner(Arc::new(NmapScanner::new(
            "/nonexistent/definitely-not-nmap",
            None,
        )));
        let orchestrator = Orchestrator::new(adapters, store.clone());
        let task_id = TaskId::new();

        orchestrator
            .run(ScanJob { task_id, target: Target::parse("example.com").unwrap() })
            .await
            .unwrap();

        let result = store.get(&task_id).await.unwrap().unwrap();
        assert_eq!(result.port_scan, None);
        assert!(result.error.unwrap().starts_with("Nmap scan failed"));
        assert!(result.dns.is_some());
    }

    #[tokio::test]
    async fn panicking_adapter_still_publishes() {
        let store = Arc::new(MemoryResultStore::new());
        let orchestrator =
            Orchestrator::new(adapters_with_scanner(Arc::new(PanickingPortScanner)), store.clone());
        let task_id = TaskId::new();

        orchestrator
            .run(ScanJob { task_id, target: Target::parse("203.0.113.5").unwrap() })
            .await
            .unwrap();

        let result = store.get(&task_id).await.unwrap().unwrap();
        assert!(result.error.unwrap().starts_with("Scan task aborted"));
        assert_eq!(result.port_scan, None);
        assert_eq!(result.host_intel, None);
    }

    #[tokio::test]
    async fn second_run_for_same_task_is_rejected() {
        let store = Arc::new(MemoryResultStore::new());
        let orchestrator = Orchestrator::new(adapters(), store.clone());
        let job = ScanJob { task_id: TaskId::new(), target: Target::parse("example.com").unwrap() };

        orchestrator.run(job.clone()).await.unwrap();
        assert!(matches!(orchestrator.run(job).await, Err(StoreError::AlreadyPublished(_))));
    }
}
