//! Durable object storage for episode artifacts
//!
//! [`ObjectStore`] is the put/delete seam; [`S3ObjectStore`] implements it for
//! S3-compatible services. [`ArtifactUploader`] pairs each upload with the
//! deletion of the local [`Artifact`].

mod artifact;
mod s3;
mod uploader;

pub use artifact::Artifact;
pub use s3::S3ObjectStore;
pub use uploader::{ArtifactUploader, public_url};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Put/delete by key. Implementations must accept concurrent calls.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the contents of `file` under `key`
    async fn put(&self, key: &str, file: &Path, content_type: &str) -> Result<()>;

    /// Remove the object stored under `key`
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Object key of a public URL previously produced by [`public_url`]
pub fn key_from_public_url(prefix: &str, url: &str) -> Option<String> {
    let prefix = prefix.trim_end_matches('/');
    url.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_recovered_from_public_url() {
        let url = public_url("https://cdn.example.com/", "abc123.webp");
        assert_eq!(
            key_from_public_url("https://cdn.example.com", &url).as_deref(),
            Some("abc123.webp")
        );
        assert_eq!(
            key_from_public_url("https://other.example.com", &url),
            None
        );
    }
}
