//! Multipart ingress for the combine route.
//!
//! File fields are streamed to disk chunk by chunk; nothing is buffered
//! whole in memory.

use std::path::Path;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use reel_models::AgentId;
use reel_pipeline::{Clip, JobRequest, OutroSelection, PipelineError};

use crate::error::ApiResult;
use crate::metrics;

/// Repeated file field carrying the listing clips, in order.
pub const CLIPS_FIELD: &str = "clips";
/// Text field naming a catalog outro.
pub const OUTRO_FIELD: &str = "outro";
/// File field carrying a custom outro.
pub const OUTRO_FILE_FIELD: &str = "outroFile";

/// Everything received from one combine request.
#[derive(Debug, Default)]
pub struct ReceivedUpload {
    pub clips: Vec<Clip>,
    pub outro_name: Option<String>,
    pub outro_file: Option<Clip>,
    /// Clip fields seen, including ones past the limit that were not stored
    pub clip_fields: usize,
}

impl ReceivedUpload {
    /// Build the job request. An uploaded outro wins over a catalog name.
    pub fn into_request(self, agent_id: AgentId) -> JobRequest {
        let outro = match (self.outro_file, self.outro_name) {
            (Some(file), _) => Some(OutroSelection::Uploaded(file)),
            (None, Some(name)) => Some(OutroSelection::Catalog(name)),
            (None, None) => None,
        };
        let request = JobRequest::new(agent_id, self.clips);
        match outro {
            Some(outro) => request.with_outro(outro),
            None => request,
        }
    }
}

/// Read every field of `multipart`, spooling files into `dir`.
///
/// Fails with `TooManyClips` once all fields are read if more than
/// `max_clips` clips were sent.
pub async fn receive(
    multipart: &mut Multipart,
    dir: &Path,
    max_clips: usize,
) -> ApiResult<ReceivedUpload> {
    let mut upload = ReceivedUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            CLIPS_FIELD => {
                upload.clip_fields += 1;
                if upload.clip_fields > max_clips {
                    continue;
                }
                if let Some(clip) = spool(field, dir).await? {
                    upload.clips.push(clip);
                }
            }
            OUTRO_FIELD => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    upload.outro_name = Some(text.to_string());
                }
            }
            OUTRO_FILE_FIELD if upload.outro_file.is_none() => {
                upload.outro_file = spool(field, dir).await?;
            }
            other => debug!(field = other, "Ignoring multipart field"),
        }
    }

    if upload.clip_fields > max_clips {
        return Err(PipelineError::TooManyClips {
            count: upload.clip_fields,
            max: max_clips,
        }
        .into());
    }

    Ok(upload)
}

/// Stream one file field to disk. Fields without a filename are empty
/// file inputs and are skipped.
async fn spool(mut field: Field<'_>, dir: &Path) -> ApiResult<Option<Clip>> {
    let original = match field.file_name() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => return Ok(None),
    };
    let field_name = field.name().unwrap_or_default().to_string();

    let path = dir.join(format!("{}.{}", Uuid::new_v4(), extension_of(&original)));
    let mut file = tokio::fs::File::create(&path).await?;
    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;

    metrics::record_upload_bytes(&field_name, size);
    debug!(field = %field_name, original = %original, size, path = %path.display(), "Stored upload");
    Ok(Some(Clip::new(original, path, size)))
}

/// Lowercased alphanumeric extension of `filename`, `mp4` otherwise.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "mp4".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Kitchen.MOV"), "mov");
        assert_eq!(extension_of("no_extension"), "mp4");
        assert_eq!(extension_of("../../etc/passwd.sh;rm"), "mp4");
    }

    #[test]
    fn test_uploaded_outro_wins() {
        let upload = ReceivedUpload {
            clips: vec![Clip::new("a.mp4", "/tmp/a.mp4", 10)],
            outro_name: Some("brand.mp4".into()),
            outro_file: Some(Clip::new("mine.mp4", "/tmp/mine.mp4", 10)),
            clip_fields: 1,
        };
        let request = upload.into_request(AgentId::from("agent"));
        assert!(matches!(request.outro, Some(OutroSelection::Uploaded(_))));
    }

    #[test]
    fn test_catalog_outro_without_file() {
        let upload = ReceivedUpload {
            outro_name: Some("brand.mp4".into()),
            ..Default::default()
        };
        let request = upload.into_request(AgentId::from("agent"));
        assert_eq!(
            request.outro,
            Some(OutroSelection::Catalog("brand.mp4".into()))
        );
    }
}
