// src/core/worker.rs

//! Bounded worker pool draining a bounded scan queue.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::errors::SubmitError;
use crate::core::scanner::{Orchestrator, ScanJob};

/// Sending side of the scan queue. Submissions never wait: a full queue is
/// reported back immediately.
#[derive(Clone)]
pub struct ScanQueue {
    tx: mpsc::Sender<ScanJob>,
}

impl ScanQueue {
    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::Sender<ScanJob>) -> Self {
        Self { tx }
    }

    pub fn submit(&self, job: ScanJob) -> Result<(), SubmitError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                warn!(task_id = %job.task_id, "Scan queue full, rejecting submission.");
                SubmitError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `workers` tasks sharing a queue of `capacity` pending jobs.
    pub fn spawn(workers: usize, capacity: usize, orchestrator: Arc<Orchestrator>) -> (ScanQueue, Self) {
        let (tx, rx) = mpsc::channel::<ScanJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    loop {
                        // The lock is held only while waiting for the next job.
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };
                        debug!(worker, task_id = %job.task_id, "Worker picked up scan.");
                        // Publish failures are already logged by the orchestrator.
                        let _ = orchestrator.run(job).await;
                    }
                    debug!(worker, "Worker stopped.");
                })
            })
            .collect();

        info!(workers = workers.max(1), capacity = capacity.max(1), "Worker pool started.");
        (ScanQueue { tx }, Self { handles })
    }

    /// Waits for every worker to drain the queue and stop. Workers stop once
    /// all `ScanQueue` handles have been dropped.
    pub async fn shutdown(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker ended abnormally.");
            }
        }
        info!("Worker pool stopped.");
    }
}
