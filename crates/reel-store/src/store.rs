//! The `VideoStore` trait and record deletion.

use std::path::{Component, Path};

use async_trait::async_trait;
use tracing::{info, warn};

use reel_models::{AgentId, VideoId, VideoRecord};

use crate::error::{StoreError, StoreResult};

/// Persistence for [`VideoRecord`]s.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert a new record.
    async fn create(&self, record: &VideoRecord) -> StoreResult<()>;

    /// Fetch a record by id.
    async fn get(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>>;

    /// All records owned by `agent_id`, newest first.
    async fn list_for_agent(&self, agent_id: &AgentId) -> StoreResult<Vec<VideoRecord>>;

    /// Remove a record, returning it if it existed.
    async fn delete(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>>;
}

/// Delete an agent's video: the backing file(s) first, then the record.
///
/// Records owned by another agent are reported as not found. Files that are
/// already gone are not an error.
pub async fn delete_video(
    store: &dyn VideoStore,
    output_dir: &Path,
    agent_id: &AgentId,
    id: &VideoId,
) -> StoreResult<VideoRecord> {
    let record = store
        .get(id)
        .await?
        .filter(|r| r.is_owned_by(agent_id))
        .ok_or_else(|| StoreError::not_found(id.as_str()))?;

    for filename in record.backing_files() {
        let path = output_dir.join(checked_filename(filename)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(video_id = %id, path = %path.display(), "Deleted video file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(video_id = %id, path = %path.display(), "Video file already missing");
            }
            Err(e) => return Err(e.into()),
        }
    }

    store.delete(id).await?;
    info!(video_id = %id, agent_id = %agent_id, "Deleted video record");
    Ok(record)
}

/// A record filename must be a single normal path component.
pub fn checked_filename(filename: &str) -> StoreResult<&Path> {
    let path = Path::new(filename);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(StoreError::InvalidFilename(filename.to_string())),
    }
}
