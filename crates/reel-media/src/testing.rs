//! In-process stand-in for FFmpeg.
//!
//! [`FakeExecutor`] records every command it receives and writes a dummy
//! output file instead of encoding. Rules keyed on path fragments let tests
//! make a given stage fail or emit an undersized file.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{cancelled, CancelSignal, CommandExecutor, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

/// Size of the file written for a successful fake encode.
pub const FAKE_OUTPUT_BYTES: usize = 4096;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub args: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Contents of the first input when it was read as a concat manifest
    pub manifest: Option<String>,
}

impl RecordedCall {
    pub fn is_concat(&self) -> bool {
        self.args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat")
    }

    pub fn has_arg_pair(&self, flag: &str, value: &str) -> bool {
        self.args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }
}

#[derive(Debug, Clone)]
enum Rule {
    FailInput(String),
    FailOutput(String),
    UndersizedInput(String, usize),
    UndersizedOutput(String, usize),
}

/// Executor that fakes FFmpeg by writing placeholder bytes.
#[derive(Debug)]
pub struct FakeExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    rules: Mutex<Vec<Rule>>,
    delay: Option<Duration>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before writing output; the sleep observes cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail any command with an input path containing `fragment`.
    pub fn fail_on_input(self, fragment: impl Into<String>) -> Self {
        self.push_rule(Rule::FailInput(fragment.into()))
    }

    /// Fail any command whose output path contains `fragment`.
    pub fn fail_on_output(self, fragment: impl Into<String>) -> Self {
        self.push_rule(Rule::FailOutput(fragment.into()))
    }

    /// Write only `bytes` bytes for inputs containing `fragment`.
    pub fn undersized_on_input(self, fragment: impl Into<String>, bytes: usize) -> Self {
        self.push_rule(Rule::UndersizedInput(fragment.into(), bytes))
    }

    /// Write only `bytes` bytes for outputs containing `fragment`.
    pub fn undersized_on_output(self, fragment: impl Into<String>, bytes: usize) -> Self {
        self.push_rule(Rule::UndersizedOutput(fragment.into(), bytes))
    }

    fn push_rule(self, rule: Rule) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(rule);
        }
        self
    }

    /// Every command seen so far, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn outcome_for(&self, call: &RecordedCall) -> Result<usize, String> {
        let rules = self.rules.lock().map(|r| r.clone()).unwrap_or_default();
        let input_matches = |fragment: &str| {
            call.inputs
                .iter()
                .any(|p| p.to_string_lossy().contains(fragment))
        };
        let output_matches =
            |fragment: &str| call.output.to_string_lossy().contains(fragment);

        for rule in rules {
            match rule {
                Rule::FailInput(f) if input_matches(&f) => {
                    return Err(format!("Invalid data found when processing input ({f})"))
                }
                Rule::FailOutput(f) if output_matches(&f) => {
                    return Err(format!("Conversion failed ({f})"))
                }
                Rule::UndersizedInput(f, bytes) if input_matches(&f) => return Ok(bytes),
                Rule::UndersizedOutput(f, bytes) if output_matches(&f) => return Ok(bytes),
                _ => {}
            }
        }
        Ok(FAKE_OUTPUT_BYTES)
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn execute(&self, cmd: &FfmpegCommand, cancel: &CancelSignal) -> MediaResult<()> {
        if *cancel.borrow() {
            return Err(MediaError::Cancelled);
        }

        let inputs: Vec<PathBuf> = cmd.inputs().iter().map(|i| i.path.clone()).collect();
        let args = cmd.build_args();
        let mut call = RecordedCall {
            args,
            inputs,
            output: cmd.output().to_path_buf(),
            manifest: None,
        };
        if call.is_concat() {
            if let Some(first) = call.inputs.first() {
                call.manifest = tokio::fs::read_to_string(first).await.ok();
            }
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }

        if let Some(delay) = self.delay {
            let mut cancel = cancel.clone();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(&mut cancel) => return Err(MediaError::Cancelled),
            }
        }

        match self.outcome_for(&call) {
            Ok(bytes) => {
                tokio::fs::write(&call.output, vec![0u8; bytes]).await?;
                Ok(())
            }
            Err(stderr) => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                Some(1),
            )),
        }
    }
}
