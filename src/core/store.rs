// src/core/store.rs

//! Write-once persistence of published scan results.
//!
//! An absent key means the task is still pending or was never submitted;
//! callers cannot tell the two apart.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::errors::StoreError;
use crate::core::models::{ScanResult, TaskId};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Stores `result` under `id`. Fails with `AlreadyPublished` if the key exists.
    async fn publish(&self, id: &TaskId, result: &ScanResult) -> Result<(), StoreError>;

    async fn get(&self, id: &TaskId) -> Result<Option<ScanResult>, StoreError>;

    async fn contains(&self, id: &TaskId) -> bool;

    /// Removes records published more than `age` ago and returns how many went.
    async fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError>;
}

/// One `<task_id>.json` file per task.
pub struct FileResultStore {
    dir: PathBuf,
}

impl FileResultStore {
    /// Opens the store, creating `dir` if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "Result store ready.");
        Ok(Self { dir })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path_for(&self, id: &TaskId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn publish(&self, id: &TaskId, result: &ScanResult) -> Result<(), StoreError> {
        let final_path = self.path_for(id);
        let temp_path = self.dir.join(format!(".{id}.json.tmp"));
        let content = serde_json::to_vec(result)?;

        fs::write(&temp_path, content).await?;

        // hard_link fails if the target exists, and readers only ever see a
        // complete file.
        let linked = fs::hard_link(&temp_path, &final_path).await;
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(path = %temp_path.display(), error = %e, "Could not remove temp result file.");
        }
        match linked {
            Ok(()) => {
                debug!(task_id = %id, "Result published.");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyPublished(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &TaskId) -> Result<Option<ScanResult>, StoreError> {
        match fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, id: &TaskId) -> bool {
        fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        let Some(cutoff) = SystemTime::now().checked_sub(age) else {
            return Ok(0);
        };

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_result = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".json") && !n.starts_with('.'));
            if !is_result {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if modified < cutoff {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryResultStore {
    records: RwLock<HashMap<TaskId, (DateTime<Utc>, ScanResult)>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn publish(&self, id: &TaskId, result: &ScanResult) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(id) {
            return Err(StoreError::AlreadyPublished(id.to_string()));
        }
        records.insert(*id, (Utc::now(), result.clone()));
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<ScanResult>, StoreError> {
        Ok(self.records.read().await.get(id).map(|(_, r)| r.clone()))
    }

    async fn contains(&self, id: &TaskId) -> bool {
        self.records.read().await.contains_key(id)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        let Some(cutoff) = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, (published_at, _)| *published_at >= cutoff);
        Ok(before - records.len())
    }
}

/// Periodically purges records older than `ttl`.
pub fn spawn_sweeper(
    store: Arc<dyn ResultStore>,
    ttl: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match store.purge_older_than(ttl).await {
                Ok(0) => {}
                Ok(n) => info!(removed = n, "Expired results purged."),
                Err(e) => warn!(error = %e, "Result purge failed."),
            }
        }
    })
}
