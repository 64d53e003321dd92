//! Listing video handlers.

use std::path::Path;

use axum::body::Body;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use scopeguard::ScopeGuard;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use reel_media::fs_utils::remove_dir_if_exists;
use reel_models::{VideoId, VideoRecord};
use reel_pipeline::{list_outros, JobOutcome};
use reel_store::store::checked_filename;
use reel_store::delete_video as delete_video_record;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use crate::upload;

/// Filename every deliverable is downloaded as.
pub const DOWNLOAD_FILENAME: &str = "listing-video.mp4";

/// Header carrying the persisted record id.
pub const VIDEO_ID_HEADER: &str = "X-Video-Id";

/// Assemble the uploaded clips into a watermarked listing video.
///
/// Multipart fields: `clips` (repeated), optional `outro` catalog name,
/// optional `outroFile`. Responds with the MP4 as an attachment.
pub async fn combine_videos(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let upload_dir = state.config.upload_dir.join(Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&upload_dir).await?;

    // Removes the spool directory if the request future is dropped
    let dir_guard = scopeguard::guard(upload_dir.clone(), |dir| {
        tokio::spawn(async move {
            let _ = remove_dir_if_exists(&dir).await;
        });
    });

    let result = run_combine(&state, &user, &mut multipart, &upload_dir).await;

    let dir = ScopeGuard::into_inner(dir_guard);
    if let Err(e) = remove_dir_if_exists(&dir).await {
        warn!(path = %dir.display(), "Failed to remove upload directory: {}", e);
    }

    let outcome = result?;
    let video_id = outcome.record.as_ref().map(|r| r.id.clone());
    info!(
        agent_id = %user.agent_id,
        job_id = %outcome.job_id,
        video_id = ?video_id.as_ref().map(VideoId::as_str),
        segments = outcome.segment_count,
        "Streaming combined video"
    );
    metrics::record_delivery("combine");
    video_attachment(&outcome.deliverable, video_id.as_ref()).await
}

async fn run_combine(
    state: &AppState,
    user: &AuthUser,
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> ApiResult<JobOutcome> {
    let max_clips = state.pipeline_config().max_clips;
    let received = upload::receive(multipart, upload_dir, max_clips).await?;
    let request = received.into_request(user.agent_id.clone());

    let job = state.pipeline.clone().spawn(request);

    // Caller disconnect drops this future; the guard then cancels the job
    let cancel_guard = scopeguard::guard(job.cancel_handle(), |handle| handle.cancel());
    let result = job.wait().await;
    ScopeGuard::into_inner(cancel_guard);

    Ok(result?)
}

/// Response body for the video list.
#[derive(Serialize)]
pub struct ListVideosResponse {
    pub videos: Vec<VideoRecord>,
}

/// List the caller's videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ListVideosResponse>> {
    let videos = state.store().list_for_agent(&user.agent_id).await?;
    Ok(Json(ListVideosResponse { videos }))
}

/// Response body for the outro catalog.
#[derive(Serialize)]
pub struct OutrosResponse {
    pub outros: Vec<String>,
}

/// List the outro catalog.
pub async fn list_outro_catalog(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<OutrosResponse>> {
    let outros = list_outros(&state.pipeline_config().outro_catalog_dir).await?;
    Ok(Json(OutrosResponse { outros }))
}

/// Download a previously produced video.
pub async fn download_video(
    State(state): State<AppState>,
    UrlPath(video_id): UrlPath<String>,
    user: AuthUser,
) -> ApiResult<Response> {
    let id = VideoId::from_string(video_id);
    let record = state
        .store()
        .get(&id)
        .await?
        .filter(|r| r.is_owned_by(&user.agent_id))
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let path = state
        .pipeline_config()
        .output_dir
        .join(checked_filename(&record.filename)?);

    metrics::record_delivery("download");
    video_attachment(&path, Some(&record.id)).await
}

#[derive(Serialize)]
pub struct DeleteVideoResponse {
    pub success: bool,
    pub video_id: String,
}

/// Delete a video record and its files.
pub async fn delete_video(
    State(state): State<AppState>,
    UrlPath(video_id): UrlPath<String>,
    user: AuthUser,
) -> ApiResult<Json<DeleteVideoResponse>> {
    let id = VideoId::from_string(video_id);
    let record = delete_video_record(
        state.store().as_ref(),
        &state.pipeline_config().output_dir,
        &user.agent_id,
        &id,
    )
    .await?;

    Ok(Json(DeleteVideoResponse {
        success: true,
        video_id: record.id.to_string(),
    }))
}

/// Stream `path` as the `listing-video.mp4` attachment.
async fn video_attachment(path: &Path, video_id: Option<&VideoId>) -> ApiResult<Response> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Video file not found"));
        }
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
        );
    if let Some(id) = video_id {
        builder = builder.header(VIDEO_ID_HEADER, id.as_str());
    }

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}
