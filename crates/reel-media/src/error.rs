//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    /// Normalizer precondition: source missing or empty.
    #[error("Invalid input {}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// Normalizer: engine failed or produced an undersized file.
    #[error("Encoding failed for {}: {message}", path.display())]
    EncodeFailure { path: PathBuf, message: String },

    /// Assembler: nothing to concatenate.
    #[error("No segments to concatenate")]
    EmptySegmentList,

    /// Assembler: concat engine failed.
    #[error("Concatenation failed: {message}")]
    ConcatFailure { message: String },

    /// Compositor: overlay engine failed.
    #[error("Watermark compositing failed for {}: {message}", path.display())]
    CompositingFailure { path: PathBuf, message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an encode failure error.
    pub fn encode_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::EncodeFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if the error came from a timeout or cancellation rather than
    /// from the media itself.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MediaError::Cancelled | MediaError::Timeout(_))
    }

    /// One-line description of a runner failure, including the tail of
    /// FFmpeg's stderr when available.
    pub fn describe(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                exit_code,
            } if !stderr.trim().is_empty() => {
                let tail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
                match exit_code {
                    Some(code) => format!("{message} (exit code {code}): {tail}"),
                    None => format!("{message}: {tail}"),
                }
            }
            MediaError::FfmpegFailed {
                message,
                exit_code: Some(code),
                ..
            } => format!("{message} (exit code {code})"),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_uses_stderr_tail() {
        let err = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("first line\n[concat] Impossible to open 'x'\n\n".to_string()),
            Some(1),
        );
        assert_eq!(
            err.describe(),
            "FFmpeg exited with non-zero status (exit code 1): [concat] Impossible to open 'x'"
        );
    }

    #[test]
    fn test_interrupted() {
        assert!(MediaError::Cancelled.is_interrupted());
        assert!(MediaError::Timeout(5).is_interrupted());
        assert!(!MediaError::EmptySegmentList.is_interrupted());
    }

    #[test]
    fn test_invalid_input_message() {
        let err = MediaError::invalid_input("/tmp/clip.mp4", "file is empty");
        assert_eq!(err.to_string(), "Invalid input /tmp/clip.mp4: file is empty");
    }
}
