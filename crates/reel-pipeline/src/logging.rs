//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for pipeline jobs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use reel_models::{AgentId, JobId, JobState};

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the job id, the owning agent and the stage the job
/// was in when the line was written.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    agent_id: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job.
    pub fn new(job_id: &JobId, agent_id: &AgentId) -> Self {
        Self {
            job_id: job_id.to_string(),
            agent_id: agent_id.to_string(),
        }
    }

    /// Log the start of a job.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            agent_id = %self.agent_id,
            "Job started: {}", message
        );
    }

    /// Log entry into a stage.
    pub fn log_stage(&self, stage: JobState, message: &str) {
        info!(
            job_id = %self.job_id,
            agent_id = %self.agent_id,
            stage = %stage,
            "Job stage: {}", message
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, stage: JobState, message: &str) {
        warn!(
            job_id = %self.job_id,
            agent_id = %self.agent_id,
            stage = %stage,
            "Job warning: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, stage: JobState, message: &str) {
        error!(
            job_id = %self.job_id,
            agent_id = %self.agent_id,
            stage = %stage,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job.
    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            agent_id = %self.agent_id,
            "Job completed: {}", message
        );
    }

    /// Get the job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the agent ID.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            agent_id = %self.agent_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, &AgentId::from("agent-7"));

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.agent_id(), "agent-7");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = JobLogger::new(&JobId::new(), &AgentId::from("agent-7"));
        logger.log_stage(JobState::Normalizing, "3 segments");
        logger.log_warning(JobState::Validating, "outro skipped");
        let _span = logger.create_span();
    }
}
