//! Trait for media fetchers

use crate::error::IngestError;
use crate::types::FetchResult;
use async_trait::async_trait;
use std::path::Path;
use url::Url;

/// Downloads and transcodes one source URL into the working directory.
///
/// On success the audio is at `{work_dir}/{id}.mp3`, and the thumbnail, when
/// one was produced, at `{work_dir}/{id}.{ext}`.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url`; `FetchFailed` carries the tool's output
    async fn fetch(&self, url: &Url) -> Result<FetchResult, IngestError>;

    /// Directory artifacts are written to
    fn work_dir(&self) -> &Path;

    /// Name of the implementation, for logging
    fn name(&self) -> &'static str;
}
