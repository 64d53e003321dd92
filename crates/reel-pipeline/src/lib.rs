//! Listing video pipeline.
//!
//! This crate provides:
//! - The orchestrator that runs normalize, assemble, watermark and persist
//! - Per-job workspaces with idempotent cleanup
//! - Admission control and cancellation
//! - Outro resolution with graceful degradation
//! - Structured job logging and metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod outro;
pub mod request;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use orchestrator::{CancelHandle, Pipeline, RunningJob};
pub use outro::{list_outros, resolve_outro};
pub use request::{Clip, JobOutcome, JobRequest, OutroSelection};
pub use workspace::JobWorkspace;
