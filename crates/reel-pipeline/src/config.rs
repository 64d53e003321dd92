//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_media::{WatermarkAnchor, WatermarkPlacement, MIN_OUTPUT_BYTES};
use reel_models::EncodingProfile;

/// Pipeline configuration.
///
/// Every asset path the orchestrator touches comes from here.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Mandatory intro asset
    pub intro_asset_path: PathBuf,
    /// Directory of selectable outro assets
    pub outro_catalog_dir: PathBuf,
    /// Watermark image
    pub watermark_asset_path: PathBuf,
    /// Parent of the per-job working directories
    pub temp_root_dir: PathBuf,
    /// Durable directory for deliverables
    pub output_dir: PathBuf,
    /// Timeout for a single FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Maximum uploaded clips per job
    pub max_clips: usize,
    /// Maximum jobs running at once
    pub max_concurrent_jobs: usize,
    /// Maximum segments normalized in parallel within one job
    pub max_parallel_normalize: usize,
    /// How long a job may wait for an admission slot
    pub admission_timeout: Duration,
    /// Smallest acceptable stage output
    pub min_output_bytes: u64,
    /// Catalog outros at or below this size are treated as invalid
    pub min_outro_bytes: u64,
    /// Add a silent audio track to clips that have none
    pub fill_missing_audio: bool,
    /// Probe the deliverable after watermarking
    pub probe_deliverable: bool,
    /// Normalization profile
    pub normalize_profile: EncodingProfile,
    /// Concatenation profile
    pub concat_profile: EncodingProfile,
    /// Watermark pass profile
    pub watermark_profile: EncodingProfile,
    /// Watermark geometry
    pub watermark_placement: WatermarkPlacement,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            intro_asset_path: PathBuf::from("assets/intro/intro.mp4"),
            outro_catalog_dir: PathBuf::from("assets/outro"),
            watermark_asset_path: PathBuf::from("assets/video-watermark.png"),
            temp_root_dir: PathBuf::from("uploads/temp"),
            output_dir: PathBuf::from("uploads/videos"),
            ffmpeg_timeout: Duration::from_secs(900), // 15 minutes
            max_clips: 10,
            max_concurrent_jobs: 2,
            max_parallel_normalize: 2,
            admission_timeout: Duration::from_secs(30),
            min_output_bytes: MIN_OUTPUT_BYTES,
            min_outro_bytes: 1024,
            fill_missing_audio: true,
            probe_deliverable: true,
            normalize_profile: EncodingProfile::normalization(),
            concat_profile: EncodingProfile::concatenation(),
            watermark_profile: EncodingProfile::watermark(),
            watermark_placement: WatermarkPlacement::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let crf = std::env::var("REEL_CRF").ok().and_then(|s| s.parse::<u8>().ok());
        let normalize_profile = match crf {
            Some(crf) => defaults.normalize_profile.clone().with_crf(crf),
            None => defaults.normalize_profile.clone(),
        };
        let concat_profile = match crf {
            Some(crf) => defaults.concat_profile.clone().with_crf(crf),
            None => defaults.concat_profile.clone(),
        };

        let watermark_placement = WatermarkPlacement::default()
            .with_anchor(
                std::env::var("REEL_WATERMARK_ANCHOR")
                    .ok()
                    .and_then(|s| s.parse::<WatermarkAnchor>().ok())
                    .unwrap_or_default(),
            )
            .with_width_ratio(
                std::env::var("REEL_WATERMARK_WIDTH_RATIO")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1.0),
            );

        Self {
            intro_asset_path: env_path("REEL_INTRO_ASSET", defaults.intro_asset_path),
            outro_catalog_dir: env_path("REEL_OUTRO_DIR", defaults.outro_catalog_dir),
            watermark_asset_path: env_path("REEL_WATERMARK_ASSET", defaults.watermark_asset_path),
            temp_root_dir: env_path("REEL_TEMP_DIR", defaults.temp_root_dir),
            output_dir: env_path("REEL_OUTPUT_DIR", defaults.output_dir),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("REEL_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            max_clips: std::env::var("REEL_MAX_CLIPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
            max_concurrent_jobs: std::env::var("REEL_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            max_parallel_normalize: std::env::var("REEL_MAX_PARALLEL_NORMALIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            admission_timeout: Duration::from_secs(
                std::env::var("REEL_ADMISSION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            min_output_bytes: defaults.min_output_bytes,
            min_outro_bytes: defaults.min_outro_bytes,
            fill_missing_audio: env_bool("REEL_FILL_MISSING_AUDIO", true),
            probe_deliverable: env_bool("REEL_PROBE_DELIVERABLE", true),
            normalize_profile,
            concat_profile,
            watermark_profile: defaults.watermark_profile,
            watermark_placement,
        }
    }

    /// Config rooted in `base` with every asset under `base/assets`.
    ///
    /// Used by tests and local tooling.
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            intro_asset_path: base.join("assets/intro/intro.mp4"),
            outro_catalog_dir: base.join("assets/outro"),
            watermark_asset_path: base.join("assets/video-watermark.png"),
            temp_root_dir: base.join("uploads/temp"),
            output_dir: base.join("uploads/videos"),
            ..Self::default()
        }
    }
}

/// `key` from the environment or `default`, resolved against the
/// working directory.
fn env_path(key: &str, default: PathBuf) -> PathBuf {
    absolute(std::env::var(key).map(PathBuf::from).unwrap_or(default))
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
