//! Upload with unconditional local cleanup

use super::ObjectStore;
use super::artifact::Artifact;
use crate::error::IngestError;
use std::sync::Arc;

/// Join a public URL prefix and an object key with exactly one slash
pub fn public_url(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key)
}

/// Uploads artifacts and deletes their local files
#[derive(Clone)]
pub struct ArtifactUploader {
    store: Arc<dyn ObjectStore>,
    public_url: String,
}

impl ArtifactUploader {
    /// Create an uploader for a store whose objects are served under `public_url`
    pub fn new(store: Arc<dyn ObjectStore>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            public_url: public_url.into(),
        }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Public URL an object key will be served at
    pub fn url_for(&self, key: &str) -> String {
        public_url(&self.public_url, key)
    }

    /// Upload `artifact` under its key and return the public URL.
    ///
    /// The local file is gone when this returns, whatever the outcome.
    pub async fn upload_and_delete(&self, artifact: Artifact) -> Result<String, IngestError> {
        let key = artifact.key().to_string();
        let content_type = artifact.kind().content_type();

        tracing::debug!(key = %key, content_type = %content_type, "uploading artifact");
        let uploaded = self.store.put(&key, artifact.path(), &content_type).await;
        artifact.remove().await;

        match uploaded {
            Ok(()) => {
                let url = self.url_for(&key);
                tracing::info!(key = %key, url = %url, "artifact uploaded");
                Ok(url)
            }
            Err(e) => Err(IngestError::UploadFailed {
                key,
                reason: e.to_string(),
            }),
        }
    }
}
