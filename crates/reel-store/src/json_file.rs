//! JSON-file store.
//!
//! All records live in one JSON array on disk. Every mutation rewrites the
//! file through a temporary sibling and a rename, so a crash mid-write leaves
//! the previous contents intact.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use reel_models::{AgentId, VideoId, VideoRecord};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_operation;
use crate::store::VideoStore;

/// Store backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Vec<VideoRecord>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), records = records.len(), "Opened video record store");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[VideoRecord]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), records = records.len(), "Persisted records");
        Ok(())
    }
}

#[async_trait]
impl VideoStore for JsonFileStore {
    async fn create(&self, record: &VideoRecord) -> StoreResult<()> {
        let started = Instant::now();
        let mut records = self.records.lock().await;

        if records.iter().any(|r| r.id == record.id) {
            record_operation("create", false, started.elapsed().as_secs_f64());
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }

        let mut next = records.clone();
        next.push(record.clone());
        let result = self.persist(&next).await;
        if result.is_ok() {
            *records = next;
            info!(video_id = %record.id, agent_id = %record.agent_id, "Created video record");
        }

        record_operation("create", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    async fn get(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|r| &r.id == id).cloned())
    }

    async fn list_for_agent(&self, agent_id: &AgentId) -> StoreResult<Vec<VideoRecord>> {
        let records = self.records.lock().await;
        let mut owned: Vec<VideoRecord> = records
            .iter()
            .filter(|r| r.is_owned_by(agent_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        let started = Instant::now();
        let mut records = self.records.lock().await;

        let Some(index) = records.iter().position(|r| &r.id == id) else {
            return Ok(None);
        };

        let mut next = records.clone();
        let removed = next.remove(index);
        let result = self.persist(&next).await;
        record_operation("delete", result.is_ok(), started.elapsed().as_secs_f64());
        result?;

        *records = next;
        Ok(Some(removed))
    }
}
