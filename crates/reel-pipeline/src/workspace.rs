//! Per-job temporary workspace.
//!
//! Every transient artifact of a job (normalized segments, the manifest,
//! the assembled stream, the pre-move deliverable) lives under
//! `<temp_root>/<job_id>/`, so concurrent jobs never share a path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use reel_media::fs_utils::remove_dir_if_exists;
use reel_models::{JobId, SegmentKind};

/// Manifest filename inside the workspace.
pub const MANIFEST_FILE: &str = "concat_list.txt";
/// Assembled stream filename inside the workspace.
pub const ASSEMBLED_FILE: &str = "combined.mp4";
/// Watermarked output filename inside the workspace.
pub const WATERMARKED_FILE: &str = "final.mp4";

/// A job-unique working directory.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
    cleaned: AtomicBool,
}

impl JobWorkspace {
    /// Create `<temp_root>/<job_id>/`.
    ///
    /// Fails if the directory already exists. The stored directory is
    /// absolute even for a relative `temp_root`, since the concat demuxer
    /// resolves manifest entries against the manifest's own directory.
    pub async fn create(temp_root: &Path, job_id: &JobId) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(temp_root).await?;
        let created = temp_root.join(job_id.as_str());
        tokio::fs::create_dir(&created).await?;
        let dir = match tokio::fs::canonicalize(&created).await {
            Ok(dir) => dir,
            Err(e) => {
                let _ = tokio::fs::remove_dir(&created).await;
                return Err(e);
            }
        };
        debug!(job_id = %job_id, dir = %dir.display(), "Created job workspace");

        Ok(Self {
            dir,
            cleaned: AtomicBool::new(false),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the normalized segment at `ordinal`.
    pub fn segment_path(&self, ordinal: u32, kind: SegmentKind) -> PathBuf {
        self.dir.join(format!("{ordinal:03}_{kind}.mp4"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn assembled_path(&self) -> PathBuf {
        self.dir.join(ASSEMBLED_FILE)
    }

    pub fn watermarked_path(&self) -> PathBuf {
        self.dir.join(WATERMARKED_FILE)
    }

    /// Remove the workspace and everything in it.
    ///
    /// Returns whether anything was removed; a second call is a no-op.
    pub async fn cleanup(&self) -> std::io::Result<bool> {
        let removed = remove_dir_if_exists(&self.dir).await?;
        self.cleaned.store(true, Ordering::SeqCst);
        if removed {
            debug!(dir = %self.dir.display(), "Removed job workspace");
        }
        Ok(removed)
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned.load(Ordering::SeqCst)
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.is_cleaned() {
            return;
        }
        // Reached only when the job future is dropped mid-flight.
        warn!(
            dir = %self.dir.display(),
            "JobWorkspace dropped without cleanup(), removing synchronously"
        );
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), "Failed to remove workspace: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_workspace_is_job_unique() {
        let root = TempDir::new().unwrap();
        let a = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();
        let b = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();

        assert_ne!(a.dir(), b.dir());
        assert_ne!(a.manifest_path(), b.manifest_path());
        a.cleanup().await.unwrap();
        b.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_segment_paths_sort_by_ordinal() {
        let root = TempDir::new().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();

        let intro = ws.segment_path(0, SegmentKind::Intro);
        let clip = ws.segment_path(10, SegmentKind::Clip);
        assert!(intro.ends_with("000_intro.mp4"));
        assert!(clip.ends_with("010_clip.mp4"));
        ws.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_relative_temp_root_yields_absolute_paths() {
        let root = PathBuf::from(format!("workspace-test-{}", JobId::new()));
        let ws = JobWorkspace::create(&root, &JobId::new()).await.unwrap();

        assert!(ws.dir().is_absolute());
        assert!(ws.segment_path(0, SegmentKind::Intro).is_absolute());
        assert!(ws.manifest_path().is_absolute());
        assert!(ws.cleanup().await.unwrap());
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let root = TempDir::new().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();
        tokio::fs::write(ws.manifest_path(), b"file 'x'\n").await.unwrap();
        tokio::fs::write(ws.assembled_path(), b"video").await.unwrap();

        assert!(ws.cleanup().await.unwrap());
        assert!(!ws.cleanup().await.unwrap());
        assert!(!ws.dir().exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_externally_removed_dir() {
        let root = TempDir::new().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();
        std::fs::remove_dir_all(ws.dir()).unwrap();

        assert!(!ws.cleanup().await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_removes_uncleaned_workspace() {
        let root = TempDir::new().unwrap();
        let dir = {
            let ws = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();
            tokio::fs::write(ws.assembled_path(), b"video").await.unwrap();
            ws.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }
}
