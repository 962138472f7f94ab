// src/app.rs

use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

use crate::config::{Settings, StorageBackend};
use crate::core::scanner::dns_scanner::DnsResolver;
use crate::core::scanner::host_intel::ShodanClient;
use crate::core::scanner::port_scanner::NmapScanner;
use crate::core::scanner::whois_scanner::WhoisClient;
use crate::core::scanner::{Adapters, Orchestrator};
use crate::core::store::{FileResultStore, MemoryResultStore, ResultStore};
use crate::core::worker::{ScanQueue, WorkerPool};

/// State shared by every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub queue: ScanQueue,
    pub store: Arc<dyn ResultStore>,
}

/// Everything `main` needs to serve and later shut down.
pub struct App {
    pub state: AppState,
    pub workers: WorkerPool,
}

impl App {
    pub async fn build(settings: &Settings) -> Result<Self> {
        let store = open_store(settings).await?;
        let adapters = build_adapters(settings)?;
        let orchestrator = Arc::new(Orchestrator::new(adapters, Arc::clone(&store)));
        let (queue, workers) =
            WorkerPool::spawn(settings.workers.count, settings.workers.queue_capacity, orchestrator);

        Ok(Self { state: AppState { queue, store }, workers })
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn ResultStore>> {
    let store: Arc<dyn ResultStore> = match settings.storage.backend {
        StorageBackend::File => {
            let dir = settings.storage.results_dir();
            Arc::new(
                FileResultStore::open(&dir)
                    .await
                    .wrap_err_with(|| format!("opening results directory {}", dir.display()))?,
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory result store, results will not survive a restart.");
            Arc::new(MemoryResultStore::new())
        }
    };
    Ok(store)
}

fn build_adapters(settings: &Settings) -> Result<Adapters> {
    let lookups = &settings.lookups;
    let host_intel = ShodanClient::new(&lookups.shodan_url, lookups.shodan_api_key.clone(), lookups.timeout())
        .wrap_err("building Shodan client")?;
    if lookups.shodan_api_key.is_none() {
        info!("No Shodan API key configured, IPv4 scans will report a host intelligence error.");
    }

    Ok(Adapters {
        port_scanner: Arc::new(NmapScanner::new(&settings.scanner.nmap_path, settings.scanner.timeout())),
        whois: Arc::new(WhoisClient::new(&lookups.whois_server, lookups.whois_port, lookups.timeout())),
        dns: Arc::new(DnsResolver::from_system()),
        host_intel: Arc::new(host_intel),
    })
}
