//! Catalog query/persist interface and episode record assembly

use crate::db::Database;
use crate::error::{DatabaseError, Error, IngestError, Result};
use crate::types::{EpisodeRecord, FetchResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Query and persist interface for catalog records.
///
/// Implementations provide their own concurrency control; inserting an id
/// that already exists must fail rather than overwrite.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a record by media identifier
    async fn find_episode(&self, id: &str) -> Result<Option<EpisodeRecord>>;

    /// Insert a new record
    async fn insert_episode(&self, record: &EpisodeRecord) -> Result<()>;
}

#[async_trait]
impl Catalog for Database {
    async fn find_episode(&self, id: &str) -> Result<Option<EpisodeRecord>> {
        self.get_episode(id).await
    }

    async fn insert_episode(&self, record: &EpisodeRecord) -> Result<()> {
        Database::insert_episode(self, record).await
    }
}

/// Builds episode records from fetch results and writes them once
#[derive(Clone)]
pub struct CatalogRecordBuilder {
    catalog: Arc<dyn Catalog>,
}

impl CatalogRecordBuilder {
    /// Create a builder over a catalog
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Assemble the record published for a fetch result
    pub fn build(
        fetched: &FetchResult,
        audio_url: String,
        image_url: Option<String>,
        publish_date: i64,
    ) -> EpisodeRecord {
        EpisodeRecord {
            id: fetched.id.clone(),
            title: fetched.title.clone(),
            description: fetched.description.clone().unwrap_or_default(),
            audio: audio_url,
            image: image_url,
            audio_length_sec: i64::try_from(fetched.duration).unwrap_or(i64::MAX),
            maybe_audio_invalid: false,
            publish_date,
        }
    }

    /// The record currently published under `id`, if any
    pub async fn find(&self, id: &str) -> Result<Option<EpisodeRecord>> {
        self.catalog.find_episode(id).await
    }

    /// Build the record stamped with the current time and persist it.
    ///
    /// A duplicate id means a concurrent task for the same media won the
    /// race; it surfaces as `PersistFailed` like any other write failure.
    pub async fn persist(
        &self,
        fetched: &FetchResult,
        audio_url: String,
        image_url: Option<String>,
    ) -> std::result::Result<EpisodeRecord, IngestError> {
        let record = Self::build(
            fetched,
            audio_url,
            image_url,
            chrono::Utc::now().timestamp_millis(),
        );

        match self.catalog.insert_episode(&record).await {
            Ok(()) => Ok(record),
            Err(e) => {
                let reason = match &e {
                    Error::Database(DatabaseError::ConstraintViolation(_)) => {
                        format!("lost race against a concurrent insert: {e}")
                    }
                    _ => e.to_string(),
                };
                Err(IngestError::PersistFailed {
                    id: record.id,
                    reason,
                })
            }
        }
    }
}
