//! FFmpeg CLI wrapper for the listing-video pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeout and cancellation support via tokio
//! - The three media stages: normalize, concatenate, watermark

pub mod command;
pub mod concat;
pub mod error;
pub mod fs_utils;
pub mod normalize;
pub mod probe;
pub mod progress;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod watermark;

pub use command::{
    cancelled, check_ffmpeg, check_ffprobe, never_cancelled, CancelSignal, CommandExecutor,
    FfmpegCommand, FfmpegRunner,
};
pub use concat::{build_manifest, escape_manifest_path, parse_manifest, SegmentAssembler};
pub use error::{MediaError, MediaResult};
pub use normalize::{Normalizer, MIN_OUTPUT_BYTES};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressParser};
pub use watermark::{WatermarkAnchor, WatermarkCompositor, WatermarkPlacement};
