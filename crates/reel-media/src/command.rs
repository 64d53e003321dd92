//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{ProgressParser, StderrLine};

/// Diagnostic stderr lines kept for error reports.
const MAX_STDERR_LINES: usize = 20;

/// Cancellation signal shared by every engine invocation of one job.
///
/// The job is cancelled once the value flips to `true`.
pub type CancelSignal = watch::Receiver<bool>;

/// A signal that never fires.
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// One `-i` input with the arguments that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    pub args: Vec<String>,
    pub path: PathBuf,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                args: Vec::new(),
                path: input.as_ref().to_path_buf(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Append another input; subsequent `input_arg` calls apply to it.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            path: input.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an argument placed before the most recently added input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(input) = self.inputs.last_mut() {
            input.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Select a stream for the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Inputs in `-i` order.
    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    /// Output file path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Something that can run an FFmpeg command to completion.
///
/// The production implementation is [`FfmpegRunner`]; tests substitute a
/// fake that writes output files directly.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, cmd: &FfmpegCommand, cancel: &CancelSignal) -> MediaResult<()>;
}

/// Runs FFmpeg as a child process with timeout and cancellation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Per-invocation timeout
    timeout: Option<Duration>,
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand, cancel: &CancelSignal) -> MediaResult<()> {
        if *cancel.borrow() {
            return Err(MediaError::Cancelled);
        }

        let program = check_ffmpeg()?;
        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let started = Instant::now();
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        counter!("reel_ffmpeg_spawned_total").increment(1);

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("FFmpeg stderr not captured", None, None))?;
        let output_label = cmd.output().display().to_string();

        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut parser = ProgressParser::new();
            let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(MAX_STDERR_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                match parser.parse_line(&line) {
                    StderrLine::BlockComplete => {
                        let progress = parser.current();
                        trace!(
                            output = %output_label,
                            frame = progress.frame,
                            out_time_ms = progress.out_time_ms,
                            speed = progress.speed,
                            "FFmpeg progress"
                        );
                    }
                    StderrLine::Diagnostic(text) if !text.is_empty() => {
                        if diagnostics.len() == MAX_STDERR_LINES {
                            diagnostics.pop_front();
                        }
                        diagnostics.push_back(text);
                    }
                    _ => {}
                }
            }

            diagnostics.into_iter().collect::<Vec<_>>().join("\n")
        });

        let outcome = self.wait_for_completion(&mut child, cancel).await;
        let stderr_text = stderr_task.await.unwrap_or_default();
        histogram!("reel_ffmpeg_duration_seconds").record(started.elapsed().as_secs_f64());

        let status = outcome?;
        if status.success() {
            Ok(())
        } else {
            counter!("reel_ffmpeg_failed_total").increment(1);
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_text),
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(
        &self,
        child: &mut Child,
        cancel: &CancelSignal,
    ) -> MediaResult<ExitStatus> {
        let mut cancel = cancel.clone();
        let timeout = self.timeout;

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = sleep_or_pending(timeout) => WaitOutcome::TimedOut,
            _ = cancelled(&mut cancel) => WaitOutcome::Cancelled,
        };

        match outcome {
            WaitOutcome::Exited(status) => Ok(status?),
            WaitOutcome::TimedOut => {
                let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
            WaitOutcome::Cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for FfmpegRunner {
    async fn execute(&self, cmd: &FfmpegCommand, cancel: &CancelSignal) -> MediaResult<()> {
        self.run(cmd, cancel).await
    }
}

async fn sleep_or_pending(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once the signal reads `true`; never resolves if the sender is
/// dropped first.
pub async fn cancelled(rx: &mut CancelSignal) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .output_args(["-c:v", "libx264"])
            .output_arg("-crf")
            .output_arg("26");

        let args = cmd.build_args();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_input_args_precede_their_input() {
        let cmd = FfmpegCommand::new("list.txt", "out.mp4")
            .input_args(["-f", "concat", "-safe", "0"])
            .add_input("logo.png")
            .input_arg("-loop")
            .input_arg("1");

        let args = cmd.build_args();
        let concat = args.iter().position(|a| a == "concat").unwrap();
        let first_input = args.iter().position(|a| a == "list.txt").unwrap();
        let loop_flag = args.iter().position(|a| a == "-loop").unwrap();
        let second_input = args.iter().position(|a| a == "logo.png").unwrap();

        assert!(concat < first_input);
        assert!(first_input < loop_flag);
        assert!(loop_flag < second_input);
        assert_eq!(cmd.inputs().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_spawn() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let result = FfmpegRunner::new().run(&cmd, &rx).await;
        assert!(matches!(result, Err(MediaError::Cancelled)));
    }

    #[tokio::test]
    async fn test_never_cancelled_signal() {
        let mut rx = never_cancelled();
        assert!(!*rx.borrow());
        let fired = tokio::time::timeout(Duration::from_millis(20), cancelled(&mut rx)).await;
        assert!(fired.is_err());
    }
}
