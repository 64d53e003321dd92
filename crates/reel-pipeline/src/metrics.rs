//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

use reel_models::JobState;

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "reel_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "reel_jobs_active";
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "reel_stage_duration_seconds";
    pub const PERSIST_FAILURES_TOTAL: &str = "reel_persist_failures_total";
    pub const OUTRO_DEGRADED_TOTAL: &str = "reel_outro_degraded_total";
    pub const ADMISSION_REJECTED_TOTAL: &str = "reel_admission_rejected_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
    gauge!(names::JOBS_ACTIVE).increment(1.0);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    gauge!(names::JOBS_ACTIVE).decrement(1.0);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(code: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "code" => code).increment(1);
    gauge!(names::JOBS_ACTIVE).decrement(1.0);
}

/// A job refused before it started running.
pub fn record_job_rejected(code: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "code" => code).increment(1);
}

pub fn record_stage(stage: JobState, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

pub fn record_persist_failure() {
    counter!(names::PERSIST_FAILURES_TOTAL).increment(1);
}

pub fn record_outro_degraded(reason: &'static str) {
    counter!(names::OUTRO_DEGRADED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_admission_rejected() {
    counter!(names::ADMISSION_REJECTED_TOTAL).increment(1);
}
