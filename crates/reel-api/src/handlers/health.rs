//! Health check handlers.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use reel_media::{check_ffmpeg, check_ffprobe};

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub available_job_slots: usize,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
    pub intro_asset: CheckStatus,
    pub watermark_asset: CheckStatus,
    pub output_dir: CheckStatus,
}

impl ReadinessChecks {
    fn all_ok(&self) -> bool {
        [
            &self.ffmpeg,
            &self.ffprobe,
            &self.intro_asset,
            &self.watermark_asset,
            &self.output_dir,
        ]
        .iter()
        .all(|c| c.is_ok())
    }
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

async fn check_asset(path: &Path) -> CheckStatus {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => CheckStatus::ok(),
        Ok(_) => CheckStatus::error(format!("{} is empty or not a file", path.display())),
        Err(e) => CheckStatus::error(format!("{}: {}", path.display(), e)),
    }
}

async fn check_writable(dir: &Path) -> CheckStatus {
    let probe = dir.join(format!(".ready-{}", Uuid::new_v4()));
    match tokio::fs::write(&probe, b"ok").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe).await;
            CheckStatus::ok()
        }
        Err(e) => CheckStatus::error(format!("{}: {}", dir.display(), e)),
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks the FFmpeg binaries, the brand assets and the output directory.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let config = state.pipeline_config();

    let checks = ReadinessChecks {
        ffmpeg: check_ffmpeg()
            .map(|_| CheckStatus::ok())
            .unwrap_or_else(|e| CheckStatus::error(e.to_string())),
        ffprobe: check_ffprobe()
            .map(|_| CheckStatus::ok())
            .unwrap_or_else(|e| CheckStatus::error(e.to_string())),
        intro_asset: check_asset(&config.intro_asset_path).await,
        watermark_asset: check_asset(&config.watermark_asset_path).await,
        output_dir: check_writable(&config.output_dir).await,
    };

    let all_ok = checks.all_ok();
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        available_job_slots: state.pipeline.available_slots(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
