//! Segments: the normalized units that get concatenated.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a segment came from.
///
/// The derived ordering (`Intro < Clip < Outro`) is the order segments must
/// appear in the final video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Fixed branded intro
    Intro,
    /// Caller-uploaded clip
    Clip,
    /// Optional branded outro
    Outro,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Intro => "intro",
            SegmentKind::Clip => "clip",
            SegmentKind::Outro => "outro",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized video file ready for concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the final video (0 = intro)
    pub ordinal: u32,
    /// Source kind
    pub kind: SegmentKind,
    /// Path of the normalized file
    pub path: PathBuf,
}

impl Segment {
    pub fn new(ordinal: u32, kind: SegmentKind, path: impl Into<PathBuf>) -> Self {
        Self {
            ordinal,
            kind,
            path: path.into(),
        }
    }
}

/// Sort segments into manifest order.
///
/// Primary key is the ordinal; kind breaks ties so an outro can never land
/// before a clip even if ordinals were assigned carelessly.
pub fn sort_segments(segments: &mut [Segment]) {
    segments.sort_by_key(|s| (s.ordinal, s.kind));
}
