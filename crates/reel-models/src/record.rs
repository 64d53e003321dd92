//! Persisted video records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, VideoId};

/// Index entry for a completed deliverable.
///
/// Written once the deliverable exists on durable storage and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Record identifier
    pub id: VideoId,
    /// Owning agent
    pub agent_id: AgentId,
    /// Deliverable filename inside the output directory
    pub filename: String,
    /// Set when the deliverable includes an outro segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_with_outro: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a record for a freshly produced deliverable.
    pub fn new(agent_id: AgentId, filename: impl Into<String>, includes_outro: bool) -> Self {
        let filename = filename.into();
        Self {
            id: VideoId::new(),
            agent_id,
            filename_with_outro: includes_outro.then(|| filename.clone()),
            filename,
            created_at: Utc::now(),
        }
    }

    /// Every distinct file backing this record.
    pub fn backing_files(&self) -> Vec<&str> {
        let mut files = vec![self.filename.as_str()];
        if let Some(with_outro) = self.filename_with_outro.as_deref() {
            if with_outro != self.filename {
                files.push(with_outro);
            }
        }
        files
    }

    /// Check if this record belongs to the given agent.
    pub fn is_owned_by(&self, agent_id: &AgentId) -> bool {
        &self.agent_id == agent_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_outro() {
        let record = VideoRecord::new(AgentId::from("a1"), "job.mp4", false);
        assert!(record.filename_with_outro.is_none());
        assert_eq!(record.backing_files(), vec!["job.mp4"]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["agentId"], "a1");
        assert!(json.get("filenameWithOutro").is_none());
    }

    #[test]
    fn test_record_with_outro_deduplicates_files() {
        let record = VideoRecord::new(AgentId::from("a1"), "job.mp4", true);
        assert_eq!(record.filename_with_outro.as_deref(), Some("job.mp4"));
        assert_eq!(record.backing_files(), vec!["job.mp4"]);
    }

    #[test]
    fn test_legacy_record_with_distinct_outro_file() {
        let mut record = VideoRecord::new(AgentId::from("a1"), "plain.mp4", false);
        record.filename_with_outro = Some("with-outro.mp4".to_string());
        assert_eq!(record.backing_files(), vec!["plain.mp4", "with-outro.mp4"]);
    }

    #[test]
    fn test_ownership() {
        let record = VideoRecord::new(AgentId::from("a1"), "job.mp4", false);
        assert!(record.is_owned_by(&AgentId::from("a1")));
        assert!(!record.is_owned_by(&AgentId::from("a2")));
    }
}
