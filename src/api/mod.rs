//! REST API server module
//!
//! Accepts ingestion requests and exposes the catalog and device registry to
//! client apps.

use crate::Result;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Ingestion
/// - `POST /download` - Queue one job per source URL
///
/// ## Catalog
/// - `GET /episodes` - List episodes, optionally after `from_date`
/// - `DELETE /episodes/:id` - Delete an episode and its stored artifacts
///
/// ## Devices
/// - `GET /devices` - List registered devices
/// - `POST /devices` - Register a device or refresh its token
/// - `DELETE /devices/:device_id` - Unregister a device
///
/// ## System
/// - `GET /health` - Health check (no API key)
///
/// Everything except `/health` requires the `X-Api-Key` header.
pub fn create_router(state: AppState, api_key: &str) -> Router {
    let protected = Router::new()
        .route("/download", post(routes::submit_download))
        .route("/episodes", get(routes::list_episodes))
        .route("/episodes/:id", delete(routes::delete_episode))
        .route("/devices", get(routes::list_devices))
        .route("/devices", post(routes::register_device))
        .route("/devices/:device_id", delete(routes::delete_device))
        .layer(middleware::from_fn_with_state(
            Arc::<str>::from(api_key),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(routes::health_check))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on `bind_address` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish once `shutdown` fires.
pub async fn start_api_server<F>(
    state: AppState,
    api_key: &str,
    bind_address: SocketAddr,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(state, api_key);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
