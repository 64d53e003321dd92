//! Watermark overlay for finished listing videos.
//!
//! The brand image is scaled relative to the base video width and pinned to
//! the bottom edge, either centered or flush-left.
//!
//! # Architecture
//!
//! - `WatermarkPlacement`: Builder pattern for overlay geometry
//! - `WatermarkCompositor`: Runs the overlay pass through a `CommandExecutor`
//! - `build_overlay_filter`: The two-input filter graph

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use reel_models::EncodingProfile;

use crate::command::{CancelSignal, CommandExecutor, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{file_size, remove_file_if_exists};
use crate::normalize::MIN_OUTPUT_BYTES;

// =============================================================================
// Configuration (Builder Pattern)
// =============================================================================

/// Horizontal anchor along the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkAnchor {
    #[default]
    Centered,
    FlushLeft,
}

impl std::str::FromStr for WatermarkAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "centered" | "center" => Ok(Self::Centered),
            "flush_left" | "left" => Ok(Self::FlushLeft),
            other => Err(format!("unknown watermark anchor: {other}")),
        }
    }
}

/// Where and how large the watermark is drawn.
///
/// ```ignore
/// let placement = WatermarkPlacement::default()
///     .with_anchor(WatermarkAnchor::FlushLeft)
///     .with_width_ratio(0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatermarkPlacement {
    pub anchor: WatermarkAnchor,
    /// Watermark width as a fraction of the base video width
    pub width_ratio: f32,
}

impl Default for WatermarkPlacement {
    fn default() -> Self {
        Self {
            anchor: WatermarkAnchor::Centered,
            width_ratio: 1.0,
        }
    }
}

impl WatermarkPlacement {
    pub fn with_anchor(mut self, anchor: WatermarkAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set the width ratio (clamped to 0.01..=1.0).
    pub fn with_width_ratio(mut self, ratio: f32) -> Self {
        self.width_ratio = ratio.clamp(0.01, 1.0);
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Build the overlay filter graph.
///
/// Input 0 is the base video, input 1 the watermark image. `scale2ref`
/// sizes the watermark against the base, then overlay pins it at
/// `y = main_h - overlay_h`.
pub fn build_overlay_filter(placement: &WatermarkPlacement) -> String {
    let x = match placement.anchor {
        WatermarkAnchor::Centered => "(main_w-overlay_w)/2",
        WatermarkAnchor::FlushLeft => "0",
    };
    format!(
        "[1:v][0:v]scale2ref=w=main_w*{ratio:.2}:h=ow/a[wm][base];\
         [base][wm]overlay=x={x}:y=main_h-overlay_h:format=auto[out]",
        ratio = placement.width_ratio
    )
}

// =============================================================================
// Compositor
// =============================================================================

/// Composites the brand watermark onto the assembled stream.
#[derive(Clone)]
pub struct WatermarkCompositor {
    executor: Arc<dyn CommandExecutor>,
    image_path: PathBuf,
    placement: WatermarkPlacement,
    profile: EncodingProfile,
    min_output_bytes: u64,
}

impl WatermarkCompositor {
    pub fn new(executor: Arc<dyn CommandExecutor>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            image_path: image_path.into(),
            placement: WatermarkPlacement::default(),
            profile: EncodingProfile::watermark(),
            min_output_bytes: MIN_OUTPUT_BYTES,
        }
    }

    pub fn with_placement(mut self, placement: WatermarkPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_profile(mut self, profile: EncodingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_min_output_bytes(mut self, bytes: u64) -> Self {
        self.min_output_bytes = bytes;
        self
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Overlay the watermark on `input`, writing the deliverable to `output`.
    pub async fn composite(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelSignal,
    ) -> MediaResult<PathBuf> {
        let failure = |message: String| MediaError::CompositingFailure {
            path: input.to_path_buf(),
            message,
        };

        if !tokio::fs::try_exists(&self.image_path).await.unwrap_or(false) {
            return Err(failure(format!(
                "watermark image not found: {}",
                self.image_path.display()
            )));
        }

        info!(
            video = %input.display(),
            watermark = %self.image_path.display(),
            anchor = ?self.placement.anchor,
            "Applying watermark overlay"
        );

        let cmd = self.build_command(input, output);
        if let Err(e) = self.executor.execute(&cmd, cancel).await {
            let _ = remove_file_if_exists(output).await;
            if e.is_interrupted() {
                return Err(e);
            }
            return Err(failure(e.describe()));
        }

        match file_size(output).await {
            Ok(Some(bytes)) if bytes >= self.min_output_bytes => {
                info!(output = %output.display(), bytes, "Watermark applied successfully");
                Ok(output.to_path_buf())
            }
            Ok(Some(bytes)) => {
                let _ = remove_file_if_exists(output).await;
                Err(failure(format!("watermarked output is only {bytes} bytes")))
            }
            Ok(None) => Err(failure("no output produced".to_string())),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    /// Build the two-input overlay invocation.
    pub fn build_command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .add_input(&self.image_path)
            .filter_complex(build_overlay_filter(&self.placement))
            .map("[out]")
            .map("0:a:0?")
            .output_args(self.profile.to_ffmpeg_args())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::never_cancelled;
    use crate::testing::FakeExecutor;
    use tempfile::TempDir;

    #[test]
    fn test_centered_filter() {
        let filter = build_overlay_filter(&WatermarkPlacement::default());
        assert!(filter.contains("scale2ref=w=main_w*1.00"));
        assert!(filter.contains("overlay=x=(main_w-overlay_w)/2:y=main_h-overlay_h"));
    }

    #[test]
    fn test_flush_left_filter() {
        let placement = WatermarkPlacement::default()
            .with_anchor(WatermarkAnchor::FlushLeft)
            .with_width_ratio(0.5);
        let filter = build_overlay_filter(&placement);
        assert!(filter.contains("main_w*0.50"));
        assert!(filter.contains("overlay=x=0:y=main_h-overlay_h"));
    }

    #[test]
    fn test_ratio_clamping() {
        assert_eq!(WatermarkPlacement::default().with_width_ratio(3.0).width_ratio, 1.0);
        assert_eq!(WatermarkPlacement::default().with_width_ratio(0.0).width_ratio, 0.01);
    }

    #[test]
    fn test_anchor_from_str() {
        assert_eq!("left".parse::<WatermarkAnchor>().unwrap(), WatermarkAnchor::FlushLeft);
        assert_eq!("Centered".parse::<WatermarkAnchor>().unwrap(), WatermarkAnchor::Centered);
        assert!("top".parse::<WatermarkAnchor>().is_err());
    }

    #[tokio::test]
    async fn test_composite_uses_fast_profile() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("combined.mp4");
        let logo = dir.path().join("video-watermark.png");
        tokio::fs::write(&input, vec![0u8; 4096]).await.unwrap();
        tokio::fs::write(&logo, b"png").await.unwrap();
        let fake = Arc::new(FakeExecutor::new());

        let output = WatermarkCompositor::new(fake.clone(), &logo)
            .composite(&input, &dir.path().join("final.mp4"), &never_cancelled())
            .await
            .unwrap();

        assert!(output.exists());
        let calls = fake.calls();
        assert_eq!(calls[0].inputs, vec![input, logo]);
        assert!(calls[0].has_arg_pair("-preset", "veryfast"));
        assert!(calls[0].has_arg_pair("-crf", "28"));
    }

    #[tokio::test]
    async fn test_missing_image_is_compositing_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("combined.mp4");
        tokio::fs::write(&input, vec![0u8; 4096]).await.unwrap();
        let fake = Arc::new(FakeExecutor::new());

        let err = WatermarkCompositor::new(fake.clone(), dir.path().join("missing.png"))
            .composite(&input, &dir.path().join("final.mp4"), &never_cancelled())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::CompositingFailure { .. }));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("combined.mp4");
        let logo = dir.path().join("logo.png");
        let output = dir.path().join("final.mp4");
        tokio::fs::write(&input, vec![0u8; 4096]).await.unwrap();
        tokio::fs::write(&logo, b"png").await.unwrap();
        let fake = Arc::new(FakeExecutor::new().fail_on_output("final"));

        let err = WatermarkCompositor::new(fake, &logo)
            .composite(&input, &output, &never_cancelled())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::CompositingFailure { .. }));
        assert!(!output.exists());
    }
}
