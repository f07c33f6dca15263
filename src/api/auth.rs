//! Authentication middleware for the REST API
//!
//! Every protected route requires the service API key in the `X-Api-Key`
//! header; requests without a matching key receive `401 Unauthorized`.

use crate::error::ApiError;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Reject requests whose `X-Api-Key` header does not match `expected_key`
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware};
/// use episode_ingest::api::auth::require_api_key;
/// use std::sync::Arc;
///
/// let key: Arc<str> = Arc::from("secret-key-123");
/// let router: Router = Router::new()
///     .layer(middleware::from_fn_with_state(key, require_api_key));
/// ```
pub async fn require_api_key(
    State(expected_key): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    // Constant-time comparison so response timing does not leak the key
    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected_key.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing X-Api-Key header"),
    }
}

/// Compares every byte regardless of where the first mismatch occurs
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized_response(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized(message))).into_response()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, middleware, routing::get};
    use tower::ServiceExt; // for oneshot

    async fn ok_handler() -> impl IntoResponse {
        (StatusCode::OK, "Success")
    }

    fn app(key: &str) -> Router {
        Router::new()
            .route("/test", get(ok_handler))
            .layer(middleware::from_fn_with_state(
                Arc::<str>::from(key),
                require_api_key,
            ))
    }

    async fn status_for(key: &str, header: Option<(&str, &str)>) -> (StatusCode, String) {
        let mut request = Request::builder().uri("/test");
        if let Some((name, value)) = header {
            request = request.header(name, value);
        }
        let response = app(key)
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn matching_key_passes_through() {
        let (status, _) = status_for("secret", Some(("X-Api-Key", "secret"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn header_name_is_case_insensitive() {
        let (status, _) = status_for("secret", Some(("x-api-key", "secret"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let (status, body) = status_for("secret", Some(("X-Api-Key", "Secret"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid API key"));
        assert!(body.contains("\"code\":\"unauthorized\""));
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let (status, body) = status_for("secret", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Missing X-Api-Key header"));
    }

    #[tokio::test]
    async fn key_is_compared_without_trimming() {
        let (status, _) = status_for("key ", Some(("X-Api-Key", "key"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
