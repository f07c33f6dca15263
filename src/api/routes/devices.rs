//! Device registry handlers

use super::RegisterDeviceRequest;
use crate::api::AppState;
use crate::db::NewDevice;
use crate::error::{Error, Result};
use crate::types::Device;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// POST /devices - Register a device or refresh its push token
pub async fn register_device(
    State(state): State<AppState>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<Device>> {
    for (field, value) in [
        ("userId", &request.user_id),
        ("deviceId", &request.device_id),
        ("notificationToken", &request.notification_token),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidRequest(format!("{} must not be empty", field)));
        }
    }

    let device = state
        .db
        .upsert_device(&NewDevice {
            user_id: request.user_id,
            device_id: request.device_id,
            notification_token: request.notification_token,
        })
        .await?;

    tracing::debug!(device_id = %device.device_id, user_id = %device.user_id, "device registered");
    Ok(Json(device))
}

/// GET /devices - List registered devices
pub async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<Device>>> {
    Ok(Json(state.db.list_devices().await?))
}

/// DELETE /devices/:device_id - Unregister a device
pub async fn delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<StatusCode> {
    if state.db.delete_device(&device_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("device {}", device_id)))
    }
}
