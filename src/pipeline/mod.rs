//! Per-task ingestion pipeline
//!
//! Stages run strictly in order and each starts only after the previous one
//! succeeded: parse and dedup check, fetch, audio upload, image upload,
//! catalog write, notification fan-out.

use crate::admission::{AdmissionGuard, parse_source_url};
use crate::catalog::CatalogRecordBuilder;
use crate::error::IngestError;
use crate::fetcher::{MediaFetcher, check_media_id};
use crate::notify::NotificationFanout;
use crate::storage::{Artifact, ArtifactUploader};
use crate::types::{ArtifactKind, EpisodeRecord, FetchResult, IngestJob};
use async_trait::async_trait;
use std::sync::Arc;

/// What to do with uploaded objects when the catalog write fails.
///
/// The dedup check and the insert are not atomic, so a task can lose the
/// insert race after uploading. `Keep` leaves its objects in storage.
/// Object keys derive from the media id, so a losing task shares its keys
/// with the winner; `Delete` never touches a key a published record uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave uploaded objects in place
    #[default]
    Keep,
    /// Delete the objects this task uploaded that no published record references
    Delete,
}

/// Executes one job to completion. The seam between queues and the pipeline.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run every stage for `job`
    async fn run(&self, job: &IngestJob) -> Result<EpisodeRecord, IngestError>;
}

/// Collaborators of the pipeline, passed in explicitly
#[derive(Clone)]
pub struct PipelineComponents {
    /// Duplicate check
    pub admission: AdmissionGuard,
    /// External fetcher
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Object storage uploads
    pub uploader: ArtifactUploader,
    /// Catalog writes
    pub records: CatalogRecordBuilder,
    /// Device notifications
    pub notifier: NotificationFanout,
    /// Handling of objects orphaned by a failed catalog write
    pub orphan_policy: OrphanPolicy,
}

/// The ingestion pipeline shared by all tasks
#[derive(Clone)]
pub struct IngestPipeline {
    components: Arc<PipelineComponents>,
}

impl IngestPipeline {
    /// Create a pipeline
    pub fn new(components: PipelineComponents) -> Self {
        Self {
            components: Arc::new(components),
        }
    }

    /// Run all stages and log the outcome with the source URL.
    ///
    /// This is the task boundary: every failure is logged here exactly once.
    pub async fn execute(&self, job: &IngestJob) -> Result<EpisodeRecord, IngestError> {
        let result = self.run_stages(job).await;
        match &result {
            Ok(record) => {
                tracing::info!(url = %job.url, episode_id = %record.id, "episode ingested");
            }
            Err(e @ IngestError::AlreadyExists { .. }) => {
                tracing::info!(url = %job.url, error = %e, "skipping duplicate");
            }
            Err(e) => {
                tracing::error!(url = %job.url, kind = e.kind(), error = %e, "ingestion failed");
            }
        }
        result
    }

    async fn run_stages(&self, job: &IngestJob) -> Result<EpisodeRecord, IngestError> {
        let c = &self.components;

        let url = parse_source_url(&job.url)?;
        let requested = c.admission.check(&url).await?;

        let fetched = c.fetcher.fetch(&url).await?;
        check_media_id(&fetched)?;
        if let Some(requested) = &requested
            && requested.as_str() != fetched.id
        {
            tracing::warn!(
                requested = %requested,
                fetched = %fetched.id,
                "fetcher reported a different media id"
            );
        }

        // Resolve the optional image first: if the audio is missing, the
        // image artifact is dropped and its file removed.
        let image = self.resolve_image(&fetched);
        let audio = Artifact::resolve(c.fetcher.work_dir(), &fetched.media_id(), ArtifactKind::Audio)?;

        let audio_key = audio.key().to_string();
        let audio_url = c.uploader.upload_and_delete(audio).await?;

        let mut uploaded_keys = vec![audio_key];
        let image_url = match image {
            Some(image) => {
                let key = image.key().to_string();
                match c.uploader.upload_and_delete(image).await {
                    Ok(url) => {
                        uploaded_keys.push(key);
                        Some(url)
                    }
                    Err(e) => {
                        tracing::warn!(url = %job.url, error = %e, "publishing without artwork");
                        None
                    }
                }
            }
            None => None,
        };

        let record = match c.records.persist(&fetched, audio_url, image_url).await {
            Ok(record) => record,
            Err(e) => {
                self.handle_orphans(&fetched.id, uploaded_keys).await;
                return Err(e);
            }
        };

        if job.send_notification {
            c.notifier.notify_all(&record).await;
        }

        Ok(record)
    }

    fn resolve_image(&self, fetched: &FetchResult) -> Option<Artifact> {
        let extension = fetched.thumbnail_extension()?;
        let kind = ArtifactKind::Image { extension };
        match Artifact::resolve(self.components.fetcher.work_dir(), &fetched.media_id(), kind) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                tracing::warn!(episode_id = %fetched.id, error = %e, "thumbnail not found");
                None
            }
        }
    }

    async fn handle_orphans(&self, id: &str, keys: Vec<String>) {
        let c = &self.components;
        if c.orphan_policy == OrphanPolicy::Keep {
            tracing::warn!(keys = ?keys, "catalog write failed, uploaded objects left in storage");
            return;
        }

        let published = match c.records.find(id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(episode_id = %id, error = %e, "cannot tell which objects are published, keeping all");
                return;
            }
        };
        let referenced = |key: &str| {
            published.as_ref().is_some_and(|record| {
                let url = c.uploader.url_for(key);
                record.audio == url || record.image.as_deref() == Some(url.as_str())
            })
        };

        for key in keys {
            if referenced(&key) {
                tracing::info!(key = %key, episode_id = %id, "object belongs to the published episode, keeping it");
                continue;
            }
            if let Err(e) = c.uploader.store().delete(&key).await {
                tracing::warn!(key = %key, error = %e, "failed to delete orphaned object");
            }
        }
    }
}

#[async_trait]
impl JobRunner for IngestPipeline {
    async fn run(&self, job: &IngestJob) -> Result<EpisodeRecord, IngestError> {
        self.execute(job).await
    }
}
