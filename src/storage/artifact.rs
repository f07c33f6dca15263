//! Local artifact files produced by the fetcher

use crate::error::IngestError;
use crate::types::{ArtifactKind, MediaId};
use std::path::{Path, PathBuf};

/// A produced local file on its way to object storage.
///
/// The value owns the file: it is removed when the artifact is consumed by
/// [`Artifact::remove`] or dropped, whichever happens first, and never twice.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    key: String,
    kind: ArtifactKind,
    removed: bool,
}

impl Artifact {
    /// Locate `{dir}/{id}.{ext}`.
    ///
    /// Fails with `InvalidLocalPath` when the file cannot be resolved or lies
    /// outside `dir`; no artifact exists then, so nothing will be deleted.
    pub fn resolve(dir: &Path, id: &MediaId, kind: ArtifactKind) -> Result<Self, IngestError> {
        let key = kind.object_key(id);
        let expected = dir.join(&key);

        let path = std::fs::canonicalize(&expected).map_err(|e| IngestError::InvalidLocalPath {
            path: expected.clone(),
            reason: e.to_string(),
        })?;
        let root = std::fs::canonicalize(dir).map_err(|e| IngestError::InvalidLocalPath {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if path.parent() != Some(root.as_path()) {
            return Err(IngestError::InvalidLocalPath {
                path,
                reason: format!("not inside {}", root.display()),
            });
        }
        if !path.is_file() {
            return Err(IngestError::InvalidLocalPath {
                path,
                reason: "not a regular file".into(),
            });
        }

        Ok(Self {
            path,
            key,
            kind,
            removed: false,
        })
    }

    /// Absolute local path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Object key `{id}.{ext}`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Artifact kind
    pub fn kind(&self) -> &ArtifactKind {
        &self.kind
    }

    /// Delete the local file now
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed local artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove local artifact")
            }
        }
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed unused local artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove local artifact")
            }
        }
    }
}
