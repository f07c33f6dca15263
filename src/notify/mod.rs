//! Best-effort push notification fan-out
//!
//! A new episode is announced to every registered device. Failures are
//! [`NotificationError`]s, a type deliberately separate from [`crate::Error`]:
//! [`NotificationFanout::notify_all`] logs them and returns a report, so a
//! failed push can never fail the task that published the episode.

mod apns;

pub use apns::{ApnsSender, PRODUCTION_ENDPOINT, SANDBOX_ENDPOINT};

use crate::db::Database;
use crate::types::{EpisodeRecord, NotificationPayload};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;

/// Localization key shown as the alert title
pub const NEW_EPISODE_TITLE: &str = "newEpisode";

/// Failure to deliver or prepare a push notification
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The gateway rejected or never answered one send
    #[error("push to device {token} failed: {reason}")]
    SendFailed {
        /// Device token, shortened by [`redact_token`]
        token: String,
        /// HTTP status, when the gateway answered
        status: Option<u16>,
        /// Gateway reason or transport error
        reason: String,
    },

    /// The provider token could not be created
    #[error("cannot sign provider token: {0}")]
    Signing(String),

    /// Device tokens could not be read
    #[error("device registry unavailable: {0}")]
    Registry(String),
}

/// Leading characters of a device token, enough to correlate log lines.
///
/// Tokens are bearer credentials for a device; full values never reach
/// logs or error messages.
pub fn redact_token(token: &str) -> String {
    let shown = (token.chars().count() / 2).min(6);
    let prefix: String = token.chars().take(shown).collect();
    format!("{prefix}...")
}

/// Content of a new-episode alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisodeAlert {
    /// Alert body, the episode title
    pub body: String,
    /// Custom data for the client
    pub payload: NotificationPayload,
}

impl From<&EpisodeRecord> for NewEpisodeAlert {
    fn from(episode: &EpisodeRecord) -> Self {
        Self {
            body: episode.title.clone(),
            payload: NotificationPayload::from(episode),
        }
    }
}

/// Sends one notification to one device. Shared across tasks.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver `alert` to the device holding `token`
    async fn send(&self, token: &str, alert: &NewEpisodeAlert) -> Result<(), NotificationError>;
}

/// Source of fan-out targets
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Push tokens of all registered devices
    async fn notification_tokens(&self) -> Result<Vec<String>, NotificationError>;
}

#[async_trait]
impl DeviceRegistry for Database {
    async fn notification_tokens(&self) -> Result<Vec<String>, NotificationError> {
        Database::notification_tokens(self)
            .await
            .map_err(|e| NotificationError::Registry(e.to_string()))
    }
}

/// Outcome of one fan-out, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Registered devices
    pub devices: usize,
    /// Successful sends
    pub sent: usize,
    /// Failed sends
    pub failed: usize,
}

/// Announces episodes to every registered device
#[derive(Clone)]
pub struct NotificationFanout {
    registry: Arc<dyn DeviceRegistry>,
    sender: Arc<dyn PushSender>,
    max_in_flight: usize,
}

impl NotificationFanout {
    /// Create a fan-out sending at most `max_in_flight` pushes at once
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        sender: Arc<dyn PushSender>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            registry,
            sender,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Send one alert per device. Never fails; per-device errors are logged.
    pub async fn notify_all(&self, episode: &EpisodeRecord) -> FanoutReport {
        let tokens = match self.registry.notification_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(episode_id = %episode.id, error = %e, "skipping notifications");
                return FanoutReport::default();
            }
        };

        let alert = NewEpisodeAlert::from(episode);
        let mut report = FanoutReport {
            devices: tokens.len(),
            ..Default::default()
        };

        let alert = &alert;
        let sender = &self.sender;
        let mut sends = futures::stream::iter(tokens)
            .map(|token| async move { sender.send(&token, alert).await })
            .buffer_unordered(self.max_in_flight);

        while let Some(result) = sends.next().await {
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(episode_id = %episode.id, error = %e, "notification not delivered");
                }
            }
        }

        tracing::info!(
            episode_id = %episode.id,
            devices = report.devices,
            sent = report.sent,
            failed = report.failed,
            "notification fan-out finished"
        );
        report
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticRegistry(Result<Vec<String>, ()>);

    #[async_trait]
    impl DeviceRegistry for StaticRegistry {
        async fn notification_tokens(&self) -> Result<Vec<String>, NotificationError> {
            self.0
                .clone()
                .map_err(|_| NotificationError::Registry("database is locked".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        failing: Vec<&'static str>,
        sent: Mutex<Vec<(String, NewEpisodeAlert)>>,
    }

    #[async_trait]
    impl PushSender for RecordingSender {
        async fn send(&self, token: &str, alert: &NewEpisodeAlert) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), alert.clone()));
            if self.failing.contains(&token) {
                return Err(NotificationError::SendFailed {
                    token: token.to_string(),
                    status: Some(410),
                    reason: "Unregistered".into(),
                });
            }
            Ok(())
        }
    }

    fn episode() -> EpisodeRecord {
        EpisodeRecord {
            id: "abc123".into(),
            title: "Ep 1".into(),
            description: String::new(),
            audio: "https://cdn/abc123.mp3".into(),
            image: Some("https://cdn/abc123.webp".into()),
            audio_length_sec: 120,
            maybe_audio_invalid: false,
            publish_date: 1,
        }
    }

    #[test]
    fn redacted_tokens_keep_only_a_short_prefix() {
        let token = "a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f8a9b0c1d2e3f4a5b6c7d8e9f0a1b2";
        assert_eq!(redact_token(token), "a1b2c3...");
        assert_eq!(redact_token("stale"), "st...");
        assert_eq!(redact_token(""), "...");
    }

    fn tokens(list: &[&str]) -> StaticRegistry {
        StaticRegistry(Ok(list.iter().map(|t| t.to_string()).collect()))
    }

    #[tokio::test]
    async fn sends_one_alert_per_device() {
        let sender = Arc::new(RecordingSender::default());
        let fanout = NotificationFanout::new(Arc::new(tokens(&["a", "b", "c"])), sender.clone(), 2);

        let report = fanout.notify_all(&episode()).await;

        assert_eq!(
            report,
            FanoutReport {
                devices: 3,
                sent: 3,
                failed: 0
            }
        );
        let sent = sender.sent.lock().unwrap();
        let mut targets: Vec<_> = sent.iter().map(|(t, _)| t.as_str()).collect();
        targets.sort_unstable();
        assert_eq!(targets, vec!["a", "b", "c"]);
        assert_eq!(sent[0].1.body, "Ep 1");
        assert_eq!(sent[0].1.payload.episode_id, "abc123");
        assert_eq!(
            sent[0].1.payload.image_url.as_deref(),
            Some("https://cdn/abc123.webp")
        );
    }

    #[tokio::test]
    async fn failed_devices_are_counted_not_propagated() {
        let sender = Arc::new(RecordingSender {
            failing: vec!["b"],
            ..Default::default()
        });
        let fanout = NotificationFanout::new(Arc::new(tokens(&["a", "b", "c"])), sender.clone(), 4);

        let report = fanout.notify_all(&episode()).await;

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 3, "later devices still receive");
    }

    #[tokio::test]
    async fn registry_failure_sends_nothing() {
        let sender = Arc::new(RecordingSender::default());
        let fanout = NotificationFanout::new(Arc::new(StaticRegistry(Err(()))), sender.clone(), 4);

        assert_eq!(fanout.notify_all(&episode()).await, FanoutReport::default());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_devices_is_a_quiet_no_op() {
        let sender = Arc::new(RecordingSender::default());
        let fanout = NotificationFanout::new(Arc::new(tokens(&[])), sender.clone(), 0);

        assert_eq!(fanout.notify_all(&episode()).await.devices, 0);
    }
}
