//! Apple Push Notification service sender (token-based authentication)

use super::{NEW_EPISODE_TITLE, NewEpisodeAlert, NotificationError, PushSender, redact_token};
use crate::config::PushConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Production gateway
pub const PRODUCTION_ENDPOINT: &str = "https://api.push.apple.com";
/// Development gateway
pub const SANDBOX_ENDPOINT: &str = "https://api.sandbox.push.apple.com";

// Apple rejects provider tokens older than an hour; refresh well before.
const TOKEN_LIFETIME_SECS: i64 = 50 * 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    iat: i64,
}

struct ProviderToken {
    key: EncodingKey,
    key_id: String,
    team_id: String,
    cached: Mutex<Option<(String, i64)>>,
}

impl ProviderToken {
    fn new(config: &PushConfig) -> Result<Self> {
        let decoded = STANDARD
            .decode(config.private_key_base64.trim())
            .map_err(|e| Error::Config {
                message: format!("push signing key is not valid base64: {e}"),
                key: Some("APNS_PRIVATE_KEY_BASE64".into()),
            })?;

        let key = if decoded.starts_with(b"-----BEGIN") {
            EncodingKey::from_ec_pem(&decoded).map_err(|e| Error::Config {
                message: format!("push signing key is not an EC PEM key: {e}"),
                key: Some("APNS_PRIVATE_KEY_BASE64".into()),
            })?
        } else {
            EncodingKey::from_ec_der(&decoded)
        };

        Ok(Self {
            key,
            key_id: config.key_id.clone(),
            team_id: config.team_id.clone(),
            cached: Mutex::new(None),
        })
    }

    fn current(&self, now: i64) -> std::result::Result<String, NotificationError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((token, issued_at)) = cached.as_ref()
            && now - issued_at < TOKEN_LIFETIME_SECS
        {
            return Ok(token.clone());
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = Claims {
            iss: &self.team_id,
            iat: now,
        };
        let token = jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| NotificationError::Signing(e.to_string()))?;

        *cached = Some((token.clone(), now));
        Ok(token)
    }
}

#[derive(Serialize)]
struct Alert<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct Aps<'a> {
    alert: Alert<'a>,
    #[serde(rename = "mutable-content")]
    mutable_content: u8,
}

#[derive(Serialize)]
struct ApnsBody<'a> {
    aps: Aps<'a>,
    #[serde(flatten)]
    payload: &'a crate::types::NotificationPayload,
}

/// Error body returned by the gateway
#[derive(serde::Deserialize)]
struct ApnsErrorBody {
    reason: String,
}

/// Sends new-episode alerts through APNs over HTTP/2.
///
/// One client and one cached provider token are shared by all tasks.
pub struct ApnsSender {
    client: reqwest::Client,
    base_url: String,
    topic: String,
    token: ProviderToken,
    timeout: Duration,
}

impl ApnsSender {
    /// Sender for the production or sandbox gateway, per `config.sandbox`
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .build()
            .map_err(|e| Error::Other(format!("failed to build push client: {e}")))?;
        let base_url = if config.sandbox {
            SANDBOX_ENDPOINT
        } else {
            PRODUCTION_ENDPOINT
        };
        Self::with_client(config, client, base_url)
    }

    /// Sender against an explicit gateway URL
    pub fn with_client(
        config: &PushConfig,
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            topic: config.topic.clone(),
            token: ProviderToken::new(config)?,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl PushSender for ApnsSender {
    async fn send(
        &self,
        token: &str,
        alert: &NewEpisodeAlert,
    ) -> std::result::Result<(), NotificationError> {
        let jwt = self.token.current(chrono::Utc::now().timestamp())?;
        let body = ApnsBody {
            aps: Aps {
                alert: Alert {
                    title: NEW_EPISODE_TITLE,
                    body: &alert.body,
                },
                mutable_content: 1,
            },
            payload: &alert.payload,
        };

        let request = self
            .client
            .post(format!("{}/3/device/{}", self.base_url, token))
            .bearer_auth(jwt)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .json(&body)
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(NotificationError::SendFailed {
                    token: redact_token(token),
                    status: None,
                    reason: e.without_url().to_string(),
                });
            }
            Err(_) => {
                return Err(NotificationError::SendFailed {
                    token: redact_token(token),
                    status: None,
                    reason: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(token = %redact_token(token), "push delivered");
            return Ok(());
        }

        let reason = match response.json::<ApnsErrorBody>().await {
            Ok(body) => body.reason,
            Err(_) => status.to_string(),
        };
        Err(NotificationError::SendFailed {
            token: redact_token(token),
            status: Some(status.as_u16()),
            reason,
        })
    }
}
