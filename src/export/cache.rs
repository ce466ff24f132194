//! On-disk cache of rendered artifacts
//!
//! Artifacts are keyed by a SHA-256 fingerprint of everything that reaches
//! the renderer, so an unchanged wiki is not rendered twice. Cache failures
//! are logged and otherwise ignored; an export never fails because of them.

use sha2::{Digest, Sha256};
use std::path::PathBuf;

use super::renderer::{RenderMetadata, RenderedPage};
use crate::types::ExportFormat;

/// Directory-backed artifact cache
#[derive(Clone, Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    /// Create a cache rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Fingerprint of a render request
    ///
    /// Covers the format, the metadata shown in the document (generation
    /// date, not time) and every page in order.
    pub fn fingerprint(
        format: ExportFormat,
        meta: &RenderMetadata,
        pages: &[RenderedPage],
    ) -> String {
        let mut hasher = Sha256::new();
        let date = meta.generated_at.format("%Y-%m-%d").to_string();

        for field in [
            format.extension(),
            meta.title.as_str(),
            meta.author.as_str(),
            date.as_str(),
        ] {
            update_field(&mut hasher, field);
        }
        hasher.update(meta.course_id.to_le_bytes());
        for page in pages {
            update_field(&mut hasher, &page.title);
            update_field(&mut hasher, &page.anchor);
            update_field(&mut hasher, &page.html);
        }

        format!("{:x}", hasher.finalize())
    }

    fn path_for(&self, key: &str, format: ExportFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", key, format.extension()))
    }

    /// Look up a cached artifact
    pub async fn get(&self, key: &str, format: ExportFormat) -> Option<Vec<u8>> {
        let path = self.path_for(key, format);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read cached artifact"
                );
                None
            }
        }
    }

    /// Store an artifact
    ///
    /// Written to a temporary file first and renamed into place, so readers
    /// never see a partial artifact.
    pub async fn put(&self, key: &str, format: ExportFormat, bytes: &[u8]) {
        let path = self.path_for(key, format);
        let tmp = self.dir.join(format!("{}.{}.tmp", key, format.extension()));

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to cache artifact");
            let _ = tokio::fs::remove_file(&tmp).await;
        }
    }
}

fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}
