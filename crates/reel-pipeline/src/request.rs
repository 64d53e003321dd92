//! Job inputs and outputs.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reel_models::{AgentId, JobId, JobState, VideoRecord};

/// An uploaded clip, already written to disk by the ingress layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Filename as sent by the client
    pub original_filename: String,
    /// Where the upload was stored
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl Clip {
    pub fn new(original_filename: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            original_filename: original_filename.into(),
            path: path.into(),
            size,
            uploaded_at: Utc::now(),
        }
    }
}

/// Which outro, if any, to append.
#[derive(Debug, Clone, PartialEq)]
pub enum OutroSelection {
    /// A filename in the outro catalog directory
    Catalog(String),
    /// An outro file uploaded with the request
    Uploaded(Clip),
}

/// One video-assembly request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub agent_id: AgentId,
    /// Clips in upload order
    pub clips: Vec<Clip>,
    pub outro: Option<OutroSelection>,
}

impl JobRequest {
    pub fn new(agent_id: AgentId, clips: Vec<Clip>) -> Self {
        Self {
            agent_id,
            clips,
            outro: None,
        }
    }

    pub fn with_outro(mut self, outro: OutroSelection) -> Self {
        self.outro = Some(outro);
        self
    }

    /// Every caller-supplied file, clips first.
    pub fn uploaded_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.clips.iter().map(|c| c.path.clone()).collect();
        if let Some(OutroSelection::Uploaded(clip)) = &self.outro {
            files.push(clip.path.clone());
        }
        files
    }
}

/// A finished job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    /// Deliverable in the output directory
    pub deliverable: PathBuf,
    /// `None` when persisting the record failed
    pub record: Option<VideoRecord>,
    /// Number of segments concatenated
    pub segment_count: usize,
    pub includes_outro: bool,
    /// Always `Completed` for a returned outcome
    pub state: JobState,
}
