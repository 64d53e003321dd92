//! FFmpeg progress parsing.
//!
//! FFmpeg writes `key=value` blocks to `-progress pipe:2`; each block ends
//! with a `progress=continue|end` line.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }
}

/// Line classification for FFmpeg stderr.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrLine {
    /// Part of a progress block (already folded into the parser state)
    Progress,
    /// A full progress block ended with this line
    BlockComplete,
    /// Anything else: warnings and errors worth keeping for diagnostics
    Diagnostic(String),
}

/// Stateful parser for FFmpeg's `-progress` output.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest progress snapshot.
    pub fn current(&self) -> &FfmpegProgress {
        &self.current
    }

    /// Feed one stderr line.
    pub fn parse_line(&mut self, line: &str) -> StderrLine {
        let line = line.trim();

        let Some((key, value)) = line.split_once('=') else {
            return StderrLine::Diagnostic(line.to_string());
        };

        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            // Despite the name, FFmpeg reports microseconds here too.
            "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.current.is_complete = true;
                }
                return StderrLine::BlockComplete;
            }
            "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames"
            | "stream_0_0_q" => {}
            _ => return StderrLine::Diagnostic(line.to_string()),
        }

        StderrLine::Progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_block() {
        let mut parser = ProgressParser::new();

        assert_eq!(parser.parse_line("frame=120"), StderrLine::Progress);
        assert_eq!(parser.parse_line("out_time_us=4000000"), StderrLine::Progress);
        assert_eq!(parser.parse_line("speed=2.5x"), StderrLine::Progress);
        assert_eq!(parser.parse_line("progress=continue"), StderrLine::BlockComplete);

        assert_eq!(parser.current().frame, 120);
        assert_eq!(parser.current().out_time_ms, 4000);
        assert!((parser.current().speed - 2.5).abs() < 0.01);
        assert!(!parser.current().is_complete);

        parser.parse_line("progress=end");
        assert!(parser.current().is_complete);
    }

    #[test]
    fn test_speed_not_available() {
        let mut parser = ProgressParser::new();
        parser.parse_line("speed=N/A");
        assert_eq!(parser.current().speed, 0.0);
    }

    #[test]
    fn test_error_lines_are_diagnostics() {
        let mut parser = ProgressParser::new();
        let line = "[concat @ 0x55] Impossible to open '/tmp/a.mp4'";
        assert_eq!(
            parser.parse_line(line),
            StderrLine::Diagnostic(line.to_string())
        );
    }

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(5000) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }
}
