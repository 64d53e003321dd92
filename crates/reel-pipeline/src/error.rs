//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

use reel_media::MediaError;
use reel_models::JobState;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("No video clips provided")]
    NoClipsProvided,

    #[error("Too many clips: {count} provided, at most {max} allowed")]
    TooManyClips { count: usize, max: usize },

    #[error("Intro asset missing: {}", .0.display())]
    IntroAssetMissing(PathBuf),

    #[error("{stage} failed: {source}")]
    Media {
        stage: JobState,
        #[source]
        source: MediaError,
    },

    #[error("Server busy: no job slot available within {0} seconds")]
    Busy(u64),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Job task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    pub fn media(stage: JobState, source: MediaError) -> Self {
        match source {
            MediaError::Cancelled => Self::Cancelled,
            source => Self::Media { stage, source },
        }
    }

    /// HTTP status the error maps to.
    ///
    /// Stage failures are server errors even when the root cause is a bad
    /// upload, because the job was already accepted.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Unauthenticated => 401,
            PipelineError::NoClipsProvided | PipelineError::TooManyClips { .. } => 400,
            PipelineError::Busy(_) => 503,
            // Client closed request
            PipelineError::Cancelled => 499,
            PipelineError::IntroAssetMissing(_)
            | PipelineError::Media { .. }
            | PipelineError::Workspace(_)
            | PipelineError::TaskFailed(_) => 500,
        }
    }

    /// Check if the caller can fix the error by changing the request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Unauthenticated => "unauthenticated",
            PipelineError::NoClipsProvided => "no_clips_provided",
            PipelineError::TooManyClips { .. } => "too_many_clips",
            PipelineError::IntroAssetMissing(_) => "intro_asset_missing",
            PipelineError::Media { source, .. } => match source {
                MediaError::InvalidInput { .. } => "invalid_input",
                MediaError::EncodeFailure { .. } => "encode_failure",
                MediaError::EmptySegmentList => "empty_segment_list",
                MediaError::ConcatFailure { .. } => "concat_failure",
                MediaError::CompositingFailure { .. } => "compositing_failure",
                MediaError::Timeout(_) => "engine_timeout",
                _ => "media_error",
            },
            PipelineError::Busy(_) => "busy",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Workspace(_) => "workspace_error",
            PipelineError::TaskFailed(_) => "task_failed",
        }
    }

    /// The stage the job was in, when the error came from a media stage.
    pub fn stage(&self) -> Option<JobState> {
        match self {
            PipelineError::Media { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PipelineError::Unauthenticated.status_code(), 401);
        assert_eq!(PipelineError::NoClipsProvided.status_code(), 400);
        assert_eq!(
            PipelineError::TooManyClips { count: 11, max: 10 }.status_code(),
            400
        );
        assert_eq!(
            PipelineError::IntroAssetMissing(PathBuf::from("intro.mp4")).status_code(),
            500
        );
        assert_eq!(PipelineError::Busy(30).status_code(), 503);
    }

    #[test]
    fn test_invalid_input_during_normalization_is_server_error() {
        let err = PipelineError::media(
            JobState::Normalizing,
            MediaError::invalid_input("/tmp/clip_2.mp4", "file is empty"),
        );
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_client_error());
        assert_eq!(err.code(), "invalid_input");
        assert_eq!(err.stage(), Some(JobState::Normalizing));
    }

    #[test]
    fn test_cancelled_media_error_collapses() {
        let err = PipelineError::media(JobState::Assembling, MediaError::Cancelled);
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn test_message_names_stage() {
        let err = PipelineError::media(
            JobState::Watermarking,
            MediaError::CompositingFailure {
                path: PathBuf::from("/tmp/combined.mp4"),
                message: "exit 1".into(),
            },
        );
        assert!(err.to_string().starts_with("watermarking failed"));
    }
}
