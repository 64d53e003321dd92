//! Shared data models for the listing video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Agent, job and video identifiers
//! - Segments (intro, clips, outro) and their ordering
//! - Persisted video records
//! - Encoding profiles shared by every FFmpeg stage
//! - The job state machine

pub mod encoding;
pub mod ids;
pub mod job;
pub mod record;
pub mod segment;

// Re-export common types
pub use encoding::{EncodingProfile, Resolution};
pub use ids::{AgentId, JobId, VideoId};
pub use job::{JobState, JobStateError};
pub use record::VideoRecord;
pub use segment::{sort_segments, Segment, SegmentKind};
