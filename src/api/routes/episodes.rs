//! Catalog handlers

use super::EpisodesQuery;
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::storage::key_from_public_url;
use crate::types::{ArtifactKind, EpisodeRecord, MediaId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /episodes - List episodes, newest first
///
/// With `from_date`, only episodes published strictly after it are returned
/// and an empty result is `204 No Content`.
pub async fn list_episodes(
    State(state): State<AppState>,
    Query(query): Query<EpisodesQuery>,
) -> Result<Response> {
    if let Some(from) = query.from_date
        && from < 0
    {
        return Err(Error::InvalidRequest(
            "from_date must not be negative".to_string(),
        ));
    }

    let episodes = state.db.list_episodes(query.from_date).await?;
    if query.from_date.is_some() && episodes.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(episodes).into_response())
}

/// DELETE /episodes/:id - Remove an episode and its stored artifacts
///
/// The catalog record goes first; object deletions that fail afterwards are
/// logged and do not fail the request.
pub async fn delete_episode(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EpisodeRecord>> {
    let record = state
        .db
        .delete_episode(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("episode {}", id)))?;

    for key in artifact_keys(&state.public_url, &record) {
        if let Err(e) = state.store.delete(&key).await {
            tracing::warn!(episode_id = %record.id, key = %key, error = %e, "failed to delete stored artifact");
        }
    }

    tracing::info!(episode_id = %record.id, "episode deleted");
    Ok(Json(record))
}

fn artifact_keys(public_url: &str, record: &EpisodeRecord) -> Vec<String> {
    let audio = key_from_public_url(public_url, &record.audio)
        .unwrap_or_else(|| ArtifactKind::Audio.object_key(&MediaId::new(record.id.as_str())));
    let mut keys = vec![audio];
    if let Some(image) = record.image.as_deref() {
        match key_from_public_url(public_url, image) {
            Some(key) => keys.push(key),
            None => {
                tracing::warn!(episode_id = %record.id, image = %image, "image URL outside the storage prefix");
            }
        }
    }
    keys
}
