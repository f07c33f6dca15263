//! Media identifier extraction and the duplicate check run before any work
//!
//! The check is advisory: it does not reserve the identifier, so two tasks
//! for the same media can both pass it. The catalog's primary key turns the
//! loser of that race into a `PersistFailed`.

use crate::catalog::Catalog;
use crate::error::IngestError;
use crate::types::MediaId;
use std::sync::Arc;
use url::Url;

/// Query parameter carrying the media identifier
pub const MEDIA_ID_PARAM: &str = "v";

/// Parse a submitted source URL
pub fn parse_source_url(raw: &str) -> Result<Url, IngestError> {
    Url::parse(raw.trim()).map_err(|e| IngestError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Extract the media identifier from the `v` query parameter
pub fn extract_media_id(url: &Url) -> Result<MediaId, IngestError> {
    url.query_pairs()
        .find(|(key, _)| key == MEDIA_ID_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(MediaId::new)
        .ok_or_else(|| IngestError::InvalidUrl {
            url: url.to_string(),
            reason: format!("no '{MEDIA_ID_PARAM}' query parameter"),
        })
}

/// Rejects media that is already in the catalog
#[derive(Clone)]
pub struct AdmissionGuard {
    catalog: Arc<dyn Catalog>,
}

impl AdmissionGuard {
    /// Create a guard over a catalog
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// True when no record exists for `id`.
    ///
    /// A failed catalog query admits the task; the uniqueness constraint at
    /// persist time is the backstop.
    pub async fn admit(&self, id: &MediaId) -> bool {
        match self.catalog.find_episode(id.as_str()).await {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(media_id = %id, error = %e, "catalog lookup failed, admitting");
                true
            }
        }
    }

    /// Run the check for a source URL.
    ///
    /// URLs without an identifier cannot be deduplicated and are admitted.
    pub async fn check(&self, url: &Url) -> Result<Option<MediaId>, IngestError> {
        let id = match extract_media_id(url) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "no media id, skipping duplicate check");
                return Ok(None);
            }
        };

        if self.admit(&id).await {
            Ok(Some(id))
        } else {
            Err(IngestError::AlreadyExists { id: id.to_string() })
        }
    }
}
