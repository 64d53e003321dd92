//! In-memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use reel_models::{AgentId, VideoId, VideoRecord};

use crate::error::{StoreError, StoreResult};
use crate::store::VideoStore;

/// Records kept in a map; lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, VideoRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn create(&self, record: &VideoRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id.as_str()) {
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }
        records.insert(record.id.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(self.records.read().await.get(id.as_str()).cloned())
    }

    async fn list_for_agent(&self, agent_id: &AgentId) -> StoreResult<Vec<VideoRecord>> {
        let mut records: Vec<VideoRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_owned_by(agent_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(self.records.write().await.remove(id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryStore::new();
        let record = VideoRecord::new(AgentId::from("a1"), "job.mp4", false);

        store.create(&record).await.unwrap();
        assert_eq!(store.get(&record.id).await.unwrap(), Some(record.clone()));
        assert!(matches!(
            store.create(&record).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_newest_first() {
        let store = MemoryStore::new();
        let agent = AgentId::from("a1");

        let mut older = VideoRecord::new(agent.clone(), "old.mp4", false);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = VideoRecord::new(agent.clone(), "new.mp4", false);
        let other = VideoRecord::new(AgentId::from("a2"), "other.mp4", false);

        for r in [&older, &newer, &other] {
            store.create(r).await.unwrap();
        }

        let listed = store.list_for_agent(&agent).await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["new.mp4", "old.mp4"]);
    }

    #[tokio::test]
    async fn test_delete_returns_record() {
        let store = MemoryStore::new();
        let record = VideoRecord::new(AgentId::from("a1"), "job.mp4", false);
        store.create(&record).await.unwrap();

        assert!(store.delete(&record.id).await.unwrap().is_some());
        assert!(store.delete(&record.id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
