//! Job submission handler

use super::{DownloadAccepted, DownloadRequest};
use crate::admission::parse_source_url;
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::IngestJob;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /download - Queue one job per submitted URL
///
/// Responds as soon as every job is accepted: `200` when queued in-process,
/// `202` when handed to the durable queue. A malformed body or URL is `400`
/// and nothing is queued. When the backend refuses a URL after earlier ones
/// were queued, the response keeps the success status and reports both counts.
pub async fn submit_download(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let request: DownloadRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::InvalidRequest(format!("malformed body: {}", e)))?;

    let urls = request.urls();
    if urls.is_empty() {
        return Err(Error::InvalidRequest(
            "videoURL or videoURLs is required".to_string(),
        ));
    }
    for url in &urls {
        parse_source_url(url)?;
    }

    let send_notification = request.send_notification.unwrap_or(true);
    let mut status = StatusCode::ACCEPTED;
    let mut accepted = 0;
    for url in &urls {
        match state
            .backend
            .submit(IngestJob::new(url.clone(), send_notification))
            .await
        {
            Ok(submission) => {
                status =
                    StatusCode::from_u16(submission.status_code()).unwrap_or(StatusCode::ACCEPTED);
                accepted += 1;
            }
            // Nothing queued yet: the request fails as a whole.
            Err(e) if accepted == 0 => return Err(e),
            Err(e) => {
                tracing::warn!(
                    accepted,
                    rejected = urls.len() - accepted,
                    error = %e,
                    "download request partially accepted"
                );
                break;
            }
        }
    }

    tracing::info!(
        count = accepted,
        backend = state.backend.name(),
        send_notification,
        "download request accepted"
    );

    Ok((
        status,
        Json(DownloadAccepted {
            accepted,
            rejected: urls.len() - accepted,
        }),
    )
        .into_response())
}
