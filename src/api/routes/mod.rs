//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`download`]: job submission
//! - [`episodes`]: catalog listing and removal
//! - [`devices`]: push device registry
//! - [`system`]: health

use serde::{Deserialize, Serialize};

mod devices;
mod download;
mod episodes;
mod system;

pub use devices::*;
pub use download::*;
pub use episodes::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /download
///
/// Accepts either a single `videoURL` or a list under `videoURLs`; both may
/// be present and are combined.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// One source URL
    #[serde(rename = "videoURL")]
    pub video_url: Option<String>,

    /// Several source URLs
    #[serde(rename = "videoURLs")]
    pub video_urls: Option<Vec<String>>,

    /// Notify registered devices once ingested (default: true)
    #[serde(rename = "sendNotification")]
    pub send_notification: Option<bool>,
}

impl DownloadRequest {
    /// All submitted URLs, single one first
    pub fn urls(&self) -> Vec<String> {
        self.video_url
            .iter()
            .chain(self.video_urls.iter().flatten())
            .cloned()
            .collect()
    }
}

/// Response body for POST /download
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadAccepted {
    /// Number of jobs accepted
    pub accepted: usize,
    /// Trailing URLs refused after earlier ones were accepted
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rejected: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Query parameters for GET /episodes
#[derive(Debug, Deserialize)]
pub struct EpisodesQuery {
    /// Only episodes published after this epoch-millisecond timestamp
    pub from_date: Option<i64>,
}

/// Request body for POST /devices
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    /// Owning user
    pub user_id: String,
    /// Client-generated device identifier
    pub device_id: String,
    /// Push token issued to the device
    pub notification_token: String,
}
