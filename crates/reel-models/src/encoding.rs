//! Video encoding profiles.
//!
//! Every FFmpeg stage encodes with a named profile instead of ad-hoc
//! arguments. Normalization and concatenation share the canonical profile so
//! all segments are compatible; the watermark pass trades quality for speed.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset for normalization and concatenation
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF for normalization and concatenation
pub const DEFAULT_CRF: u8 = 26;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Default audio sample rate
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Default output frame rate
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Watermark pass preset (faster than normalization)
pub const WATERMARK_PRESET: &str = "veryfast";
/// Watermark pass CRF
pub const WATERMARK_CRF: u8 = 28;

/// Canonical resolution
pub const CANONICAL_WIDTH: u32 = 1280;
pub const CANONICAL_HEIGHT: u32 = 720;

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The canonical 1280x720 frame.
    pub const fn canonical() -> Self {
        Self::new(CANONICAL_WIDTH, CANONICAL_HEIGHT)
    }

    /// Filter that fits any input into this frame.
    ///
    /// Aspect ratio is preserved and the remainder letterboxed, so portrait
    /// phone clips are not stretched.
    pub fn fit_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
            w = self.width,
            h = self.height
        )
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Encoding settings for one FFmpeg stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "veryfast")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Audio sample rate (Hz)
    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    /// Output frame rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Target frame size; `None` keeps the input size
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_audio_sample_rate() -> u32 {
    DEFAULT_AUDIO_SAMPLE_RATE
}
fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self::normalization()
    }
}

impl EncodingProfile {
    /// Canonical profile every segment is normalized to.
    pub fn normalization() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            frame_rate: DEFAULT_FRAME_RATE,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            resolution: Some(Resolution::canonical()),
        }
    }

    /// Re-encode profile for the concat step.
    ///
    /// Segments are already canonical, so no scaling is applied.
    pub fn concatenation() -> Self {
        Self {
            resolution: None,
            ..Self::normalization()
        }
    }

    /// Faster, lower-fidelity profile for the final watermark pass.
    pub fn watermark() -> Self {
        Self {
            preset: WATERMARK_PRESET.to_string(),
            crf: WATERMARK_CRF,
            resolution: None,
            ..Self::normalization()
        }
    }

    /// Returns a new profile with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    /// Returns a new profile with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Returns a new profile with a target resolution.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Convert to FFmpeg output arguments (codecs, quality, rate, format).
    ///
    /// Scaling is not included; callers add `fit_filter()` to their own
    /// filter chain when `resolution` is set.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-r".to_string(),
            self.frame_rate.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.audio_sample_rate.to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_is_canonical() {
        let profile = EncodingProfile::normalization();
        assert_eq!(profile.codec, "libx264");
        assert_eq!(profile.audio_codec, "aac");
        assert_eq!(profile.crf, 26);
        assert_eq!(profile.resolution, Some(Resolution::new(1280, 720)));
    }

    #[test]
    fn test_watermark_is_faster() {
        let normalize = EncodingProfile::normalization();
        let watermark = EncodingProfile::watermark();
        assert_eq!(watermark.preset, "veryfast");
        assert!(watermark.crf > normalize.crf);
        assert_eq!(watermark.codec, normalize.codec);
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingProfile::normalization().to_ffmpeg_args();
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-preset fast"));
        assert!(joined.contains("-crf 26"));
        assert!(joined.contains("-c:a aac"));
    }

    #[test]
    fn test_crf_clamped() {
        assert_eq!(EncodingProfile::normalization().with_crf(80).crf, 51);
    }

    #[test]
    fn test_fit_filter() {
        let filter = Resolution::canonical().fit_filter();
        assert!(filter.starts_with("scale=1280:720:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1280:720"));
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let profile: EncodingProfile = serde_json::from_str(r#"{"crf": 20}"#).unwrap();
        assert_eq!(profile.crf, 20);
        assert_eq!(profile.preset, "fast");
        assert!(profile.resolution.is_none());
    }
}
