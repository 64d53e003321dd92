//! Segment assembly via the concat demuxer.
//!
//! Normalized segments are listed in a manifest (`file '<path>'` per line)
//! and re-encoded into one stream with `-f concat -safe 0`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use reel_models::{sort_segments, EncodingProfile, Segment};

use crate::command::{CancelSignal, CommandExecutor, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{file_size, remove_file_if_exists};
use crate::normalize::MIN_OUTPUT_BYTES;

/// Quote a path for the concat list format.
///
/// The list is parsed with shell-like single quoting, so a literal `'`
/// closes the quote, emits an escaped quote and reopens it.
pub fn escape_manifest_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Render the manifest for `segments` in ordinal order.
pub fn build_manifest(segments: &[Segment]) -> String {
    let mut ordered = segments.to_vec();
    sort_segments(&mut ordered);

    ordered
        .iter()
        .map(|s| format!("file '{}'\n", escape_manifest_path(&s.path)))
        .collect()
}

/// Parse a manifest back into paths.
///
/// Accepts exactly what [`build_manifest`] writes; blank lines and `#`
/// comments are skipped.
pub fn parse_manifest(manifest: &str) -> MediaResult<Vec<PathBuf>> {
    manifest
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let quoted = line
                .strip_prefix("file ")
                .map(str::trim_start)
                .ok_or_else(|| MediaError::ConcatFailure {
                    message: format!("malformed manifest line: {line}"),
                })?;
            unquote(quoted).map(PathBuf::from).ok_or_else(|| {
                MediaError::ConcatFailure {
                    message: format!("unbalanced quotes in manifest line: {line}"),
                }
            })
        })
        .collect()
}

fn unquote(quoted: &str) -> Option<String> {
    let mut out = String::with_capacity(quoted.len());
    let mut in_quote = false;
    let mut chars = quoted.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => in_quote = !in_quote,
            '\\' if !in_quote => out.push(chars.next()?),
            c => out.push(c),
        }
    }

    (!in_quote).then_some(out)
}

/// Concatenates normalized segments into one stream.
#[derive(Clone)]
pub struct SegmentAssembler {
    executor: Arc<dyn CommandExecutor>,
    profile: EncodingProfile,
    min_output_bytes: u64,
}

impl SegmentAssembler {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            profile: EncodingProfile::concatenation(),
            min_output_bytes: MIN_OUTPUT_BYTES,
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

    /// Write the manifest to `manifest_path` and concatenate into `output`.
    pub async fn assemble(
        &self,
        segments: &[Segment],
        manifest_path: &Path,
        output: &Path,
        cancel: &CancelSignal,
    ) -> MediaResult<PathBuf> {
        if segments.is_empty() {
            return Err(MediaError::EmptySegmentList);
        }

        for segment in segments {
            if !tokio::fs::try_exists(&segment.path).await.unwrap_or(false) {
                return Err(MediaError::ConcatFailure {
                    message: format!(
                        "{} segment {} is missing: {}",
                        segment.kind,
                        segment.ordinal,
                        segment.path.display()
                    ),
                });
            }
        }

        let manifest = build_manifest(segments);
        tokio::fs::write(manifest_path, &manifest).await?;
        debug!(
            manifest = %manifest_path.display(),
            segments = segments.len(),
            "Wrote concat manifest"
        );

        let cmd = self.build_command(manifest_path, output);
        if let Err(e) = self.executor.execute(&cmd, cancel).await {
            let _ = remove_file_if_exists(output).await;
            if e.is_interrupted() {
                return Err(e);
            }
            return Err(MediaError::ConcatFailure {
                message: e.describe(),
            });
        }

        match file_size(output).await {
            Ok(Some(bytes)) if bytes >= self.min_output_bytes => {
                info!(
                    output = %output.display(),
                    segments = segments.len(),
                    bytes,
                    "Segments concatenated"
                );
                Ok(output.to_path_buf())
            }
            Ok(Some(bytes)) => {
                let _ = remove_file_if_exists(output).await;
                Err(MediaError::ConcatFailure {
                    message: format!("concatenated output is only {bytes} bytes"),
                })
            }
            Ok(None) => Err(MediaError::ConcatFailure {
                message: "no output produced".to_string(),
            }),
            Err(e) => Err(MediaError::ConcatFailure {
                message: e.to_string(),
            }),
        }
    }

    /// Build the concat-demuxer invocation.
    pub fn build_command(&self, manifest_path: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(manifest_path, output)
            .input_args(["-f", "concat", "-safe", "0"])
            .map("0:v:0")
            .map("0:a:0?")
            .output_args(self.profile.to_ffmpeg_args())
    }
}
