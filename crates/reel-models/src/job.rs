//! Pipeline job state machine.
//!
//! ```text
//! Received -> Validating -> Normalizing -> Assembling -> Watermarking
//!          -> Persisting -> Delivering -> Completed
//! any non-terminal state -> Failed
//! ```
//!
//! Cleanup is not a state of its own: it runs on the way into `Completed`
//! and into `Failed`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Job processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Received,
    Validating,
    Normalizing,
    Assembling,
    Watermarking,
    Persisting,
    Delivering,
    Completed,
    Failed,
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job state transition: {from} -> {to}")]
pub struct JobStateError {
    pub from: JobState,
    pub to: JobState,
}

impl JobState {
    /// Get string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Received => "received",
            JobState::Validating => "validating",
            JobState::Normalizing => "normalizing",
            JobState::Assembling => "assembling",
            JobState::Watermarking => "watermarking",
            JobState::Persisting => "persisting",
            JobState::Delivering => "delivering",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// The state that follows this one on the success path.
    pub fn next(&self) -> Option<JobState> {
        match self {
            JobState::Received => Some(JobState::Validating),
            JobState::Validating => Some(JobState::Normalizing),
            JobState::Normalizing => Some(JobState::Assembling),
            JobState::Assembling => Some(JobState::Watermarking),
            JobState::Watermarking => Some(JobState::Persisting),
            JobState::Persisting => Some(JobState::Delivering),
            JobState::Delivering => Some(JobState::Completed),
            JobState::Completed | JobState::Failed => None,
        }
    }

    /// Check whether `to` is a legal successor of this state.
    pub fn can_transition_to(&self, to: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == JobState::Failed || self.next() == Some(to)
    }

    /// Move to `to`, rejecting illegal transitions.
    pub fn transition(&mut self, to: JobState) -> Result<(), JobStateError> {
        if !self.can_transition_to(to) {
            return Err(JobStateError { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
