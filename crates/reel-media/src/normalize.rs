//! Segment normalization.
//!
//! Re-encodes an arbitrary uploaded clip (or the intro/outro asset) to the
//! canonical profile so every segment can be concatenated without stream
//! mismatches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use reel_models::EncodingProfile;

use crate::command::{CancelSignal, CommandExecutor, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{file_size, remove_file_if_exists};
use crate::probe::probe_video;

/// Smallest file a stage may produce before it counts as a failure.
pub const MIN_OUTPUT_BYTES: u64 = 1024;

/// Re-encodes single segments to the canonical profile.
#[derive(Clone)]
pub struct Normalizer {
    executor: Arc<dyn CommandExecutor>,
    profile: EncodingProfile,
    min_output_bytes: u64,
    fill_missing_audio: bool,
}

impl Normalizer {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            profile: EncodingProfile::normalization(),
            min_output_bytes: MIN_OUTPUT_BYTES,
            fill_missing_audio: false,
        }
    }

    pub fn with_profile(mut self, profile: EncodingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_min_output_bytes(mut self, bytes: u64) -> Self {
        self.min_output_bytes = bytes;
        self
    }

    /// Probe each input and add a silent track to clips without audio.
    ///
    /// Requires ffprobe at runtime.
    pub fn with_fill_missing_audio(mut self, enabled: bool) -> Self {
        self.fill_missing_audio = enabled;
        self
    }

    pub fn profile(&self) -> &EncodingProfile {
        &self.profile
    }

    /// Normalize `input` into `output`.
    ///
    /// Fails with [`MediaError::InvalidInput`] before invoking FFmpeg when the
    /// source is missing or empty, and with [`MediaError::EncodeFailure`] when
    /// FFmpeg fails or leaves fewer than `min_output_bytes` behind.
    pub async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelSignal,
    ) -> MediaResult<PathBuf> {
        check_input(input).await?;

        let silent = self.fill_missing_audio && self.input_is_silent(input).await;
        let cmd = self.build_command(input, output, silent);

        debug!(input = %input.display(), output = %output.display(), "Normalizing segment");

        if let Err(e) = self.executor.execute(&cmd, cancel).await {
            let _ = remove_file_if_exists(output).await;
            if e.is_interrupted() {
                return Err(e);
            }
            return Err(MediaError::encode_failure(input, e.describe()));
        }

        let size = file_size(output)
            .await
            .map_err(|e| MediaError::encode_failure(input, e.to_string()))?;
        match size {
            Some(bytes) if bytes >= self.min_output_bytes => {
                info!(
                    input = %input.display(),
                    output = %output.display(),
                    bytes,
                    "Segment normalized"
                );
                Ok(output.to_path_buf())
            }
            Some(bytes) => {
                let _ = remove_file_if_exists(output).await;
                Err(MediaError::encode_failure(
                    input,
                    format!(
                        "output is {bytes} bytes, below the {} byte minimum",
                        self.min_output_bytes
                    ),
                ))
            }
            None => Err(MediaError::encode_failure(input, "no output produced")),
        }
    }

    /// Build the FFmpeg invocation for one segment.
    pub fn build_command(&self, input: &Path, output: &Path, silent: bool) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(input, output);

        if silent {
            cmd = cmd
                .add_input(format!(
                    "anullsrc=channel_layout=stereo:sample_rate={}",
                    self.profile.audio_sample_rate
                ))
                .input_args(["-f", "lavfi"])
                .map("0:v:0")
                .map("1:a:0")
                .output_arg("-shortest");
        } else {
            cmd = cmd.map("0:v:0").map("0:a:0?");
        }

        if let Some(resolution) = self.profile.resolution {
            cmd = cmd.video_filter(resolution.fit_filter());
        }

        cmd.output_args(self.profile.to_ffmpeg_args())
    }

    async fn input_is_silent(&self, input: &Path) -> bool {
        match probe_video(input).await {
            Ok(info) => !info.has_audio(),
            Err(e) => {
                warn!(input = %input.display(), "Probe failed, keeping original audio: {}", e);
                false
            }
        }
    }
}

/// The source must exist as a non-empty regular file.
async fn check_input(input: &Path) -> MediaResult<()> {
    match file_size(input).await {
        Ok(Some(0)) => Err(MediaError::invalid_input(input, "file is empty")),
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(MediaError::invalid_input(input, "file does not exist")),
        Err(e) => Err(MediaError::invalid_input(input, e.to_string())),
    }
}
