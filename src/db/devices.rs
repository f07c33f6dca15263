//! Device registry.

use crate::error::DatabaseError;
use crate::types::Device;
use crate::{Error, Result};

use super::{Database, NewDevice};

impl Database {
    /// Create or update a device registration.
    ///
    /// The device is keyed by `device_id`. A token that moved from another
    /// device is taken over: the stale registration is removed.
    pub async fn upsert_device(&self, device: &NewDevice) -> Result<Device> {
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        sqlx::query("DELETE FROM devices WHERE notification_token = ? AND device_id != ?")
            .bind(&device.notification_token)
            .bind(&device.device_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to release notification token: {}",
                    e
                )))
            })?;

        let saved = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (user_id, device_id, notification_token, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(device_id) DO UPDATE SET
                user_id = excluded.user_id,
                notification_token = excluded.notification_token,
                updated_at = excluded.updated_at
            RETURNING id, user_id, device_id, notification_token, updated_at
            "#,
        )
        .bind(&device.user_id)
        .bind(&device.device_id)
        .bind(&device.notification_token)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to save device: {}",
                e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit device: {}",
                e
            )))
        })?;

        Ok(saved)
    }

    /// List all registered devices
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        sqlx::query_as::<_, Device>(
            "SELECT id, user_id, device_id, notification_token, updated_at FROM devices ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list devices: {}",
                e
            )))
        })
    }

    /// All push tokens, one per device
    pub async fn notification_tokens(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT notification_token FROM devices ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list notification tokens: {}",
                    e
                )))
            })
    }

    /// Remove a device; returns whether it existed
    pub async fn delete_device(&self, device_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM devices WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete device: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
