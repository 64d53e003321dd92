//! Outro resolution.
//!
//! An outro is optional branding: anything wrong with it degrades the job
//! to "no outro" instead of failing it.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::metrics::record_outro_degraded;
use crate::request::OutroSelection;

/// Why a requested outro was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutroSkip {
    InvalidName,
    NotFound,
    TooSmall,
    Unreadable,
}

impl OutroSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutroSkip::InvalidName => "invalid_name",
            OutroSkip::NotFound => "not_found",
            OutroSkip::TooSmall => "too_small",
            OutroSkip::Unreadable => "unreadable",
        }
    }
}

/// Resolve the requested outro to a usable file, or `None`.
pub async fn resolve_outro(
    config: &PipelineConfig,
    selection: Option<&OutroSelection>,
) -> Option<PathBuf> {
    let selection = selection?;
    match check_outro(config, selection).await {
        Ok(path) => {
            debug!(outro = %path.display(), "Resolved outro");
            Some(path)
        }
        Err(skip) => {
            warn!(selection = ?selection, reason = skip.as_str(), "Skipping outro");
            record_outro_degraded(skip.as_str());
            None
        }
    }
}

/// Validate an outro selection.
pub async fn check_outro(
    config: &PipelineConfig,
    selection: &OutroSelection,
) -> Result<PathBuf, OutroSkip> {
    let path = match selection {
        OutroSelection::Uploaded(clip) => clip.path.clone(),
        OutroSelection::Catalog(name) => {
            if !is_plain_filename(name) {
                return Err(OutroSkip::InvalidName);
            }
            config.outro_catalog_dir.join(name)
        }
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if !meta.is_file() => Err(OutroSkip::NotFound),
        Ok(meta) if meta.len() <= config.min_outro_bytes => Err(OutroSkip::TooSmall),
        Ok(_) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OutroSkip::NotFound),
        Err(_) => Err(OutroSkip::Unreadable),
    }
}

/// List the `.mp4` files in the outro catalog, sorted by name.
///
/// A missing catalog directory lists as empty.
pub async fn list_outros(catalog_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(catalog_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.to_ascii_lowercase().ends_with(".mp4") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn is_plain_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Clip;
    use tempfile::TempDir;

    async fn config_with_catalog() -> (TempDir, PipelineConfig) {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        tokio::fs::create_dir_all(&config.outro_catalog_dir).await.unwrap();
        tokio::fs::write(config.outro_catalog_dir.join("brand.mp4"), vec![0u8; 4096])
            .await
            .unwrap();
        tokio::fs::write(config.outro_catalog_dir.join("stub.mp4"), vec![0u8; 1024])
            .await
            .unwrap();
        tokio::fs::write(config.outro_catalog_dir.join("notes.txt"), b"x")
            .await
            .unwrap();
        (dir, config)
    }

    #[tokio::test]
    async fn test_catalog_outro_resolves() {
        let (_dir, config) = config_with_catalog().await;
        let selection = OutroSelection::Catalog("brand.mp4".into());

        assert_eq!(
            resolve_outro(&config, Some(&selection)).await,
            Some(config.outro_catalog_dir.join("brand.mp4"))
        );
    }

    #[tokio::test]
    async fn test_missing_catalog_outro_degrades() {
        let (_dir, config) = config_with_catalog().await;
        let selection = OutroSelection::Catalog("nonexistent.mp4".into());

        assert_eq!(check_outro(&config, &selection).await, Err(OutroSkip::NotFound));
        assert_eq!(resolve_outro(&config, Some(&selection)).await, None);
    }

    #[tokio::test]
    async fn test_kilobyte_outro_is_too_small() {
        let (_dir, config) = config_with_catalog().await;
        let selection = OutroSelection::Catalog("stub.mp4".into());

        assert_eq!(check_outro(&config, &selection).await, Err(OutroSkip::TooSmall));
    }

    #[tokio::test]
    async fn test_traversal_names_degrade() {
        let (_dir, config) = config_with_catalog().await;
        for name in ["../intro/intro.mp4", "/etc/passwd", "a/b.mp4", "..", ""] {
            let selection = OutroSelection::Catalog(name.into());
            assert_eq!(
                check_outro(&config, &selection).await,
                Err(OutroSkip::InvalidName),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn test_uploaded_outro() {
        let (dir, config) = config_with_catalog().await;
        let path = dir.path().join("custom-outro.mp4");
        tokio::fs::write(&path, vec![0u8; 2048]).await.unwrap();
        let selection = OutroSelection::Uploaded(Clip::new("custom-outro.mp4", &path, 2048));

        assert_eq!(resolve_outro(&config, Some(&selection)).await, Some(path));
    }

    #[tokio::test]
    async fn test_no_selection() {
        let (_dir, config) = config_with_catalog().await;
        assert_eq!(resolve_outro(&config, None).await, None);
    }

    #[tokio::test]
    async fn test_list_outros() {
        let (dir, config) = config_with_catalog().await;
        assert_eq!(
            list_outros(&config.outro_catalog_dir).await.unwrap(),
            vec!["brand.mp4".to_string(), "stub.mp4".to_string()]
        );
        assert!(list_outros(&dir.path().join("missing")).await.unwrap().is_empty());
    }
}
