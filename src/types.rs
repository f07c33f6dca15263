//! Core types for episode-ingest

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stable external key of a piece of source media.
///
/// Used as the catalog primary key and as the object key prefix.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a task inside one in-process worker pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of submitted work: a source URL and whether to notify devices.
///
/// This is also the message format of the durable queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestJob {
    /// Source URL as submitted
    pub url: String,
    /// Fan out a push notification after the episode is persisted
    pub send_notification: bool,
}

impl IngestJob {
    /// Create a job
    pub fn new(url: impl Into<String>, send_notification: bool) -> Self {
        Self {
            url: url.into(),
            send_notification,
        }
    }
}

/// Structured result printed by the external fetcher
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FetchResult {
    /// Media identifier, also the artifact file stem
    pub id: String,
    /// Title
    pub title: String,
    /// Description, when the source has one
    #[serde(default)]
    pub description: Option<String>,
    /// Duration in whole seconds
    #[serde(default, deserialize_with = "seconds")]
    pub duration: u64,
    /// Thumbnail URL or path; its trailing extension names the image format
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl FetchResult {
    /// Media identifier of this result
    pub fn media_id(&self) -> MediaId {
        MediaId::new(self.id.clone())
    }

    /// Image extension taken from the thumbnail reference.
    ///
    /// Query and fragment are ignored; a final segment without a dot has no
    /// extension.
    pub fn thumbnail_extension(&self) -> Option<String> {
        let reference = self.thumbnail.as_deref()?;
        let path = reference.split(['?', '#']).next().unwrap_or(reference);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

// Fetchers print duration as an integer or a float depending on the extractor
fn seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(match value {
        None => 0,
        Some(n) => match n.as_u64() {
            Some(secs) => secs,
            None => n.as_f64().map(|f| f.max(0.0).round() as u64).unwrap_or(0),
        },
    })
}

/// Kind of a produced artifact; decides the object's content type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Transcoded mp3 audio
    Audio,
    /// Thumbnail image with the extension detected from the thumbnail reference
    Image {
        /// Lowercase file extension, e.g. "webp"
        extension: String,
    },
}

impl ArtifactKind {
    /// File extension of the local file and the object key
    pub fn extension(&self) -> &str {
        match self {
            ArtifactKind::Audio => "mp3",
            ArtifactKind::Image { extension } => extension,
        }
    }

    /// MIME type sent with the upload
    pub fn content_type(&self) -> String {
        match self {
            ArtifactKind::Audio => "audio/mpeg".to_string(),
            ArtifactKind::Image { extension } => format!("image/{extension}"),
        }
    }

    /// Object key `{id}.{ext}`
    pub fn object_key(&self, id: &MediaId) -> String {
        format!("{}.{}", id, self.extension())
    }
}

/// A published catalog entry.
///
/// On the wire it also carries `thumbnail` (always equal to `image`) and a
/// `link` that ingestion never sets, for clients of the older schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(into = "EpisodeJson")]
pub struct EpisodeRecord {
    /// Media identifier, never regenerated
    pub id: String,
    /// Title
    pub title: String,
    /// Description, empty when the source had none
    pub description: String,
    /// Public audio URL
    pub audio: String,
    /// Public image URL
    pub image: Option<String>,
    /// Duration in seconds
    pub audio_length_sec: i64,
    /// Set downstream when the audio turns out to be broken; false at creation
    pub maybe_audio_invalid: bool,
    /// Ingestion time, milliseconds since the Unix epoch
    #[serde(rename = "pub_date_ms")]
    pub publish_date: i64,
}

#[derive(Serialize)]
struct EpisodeJson {
    id: String,
    title: String,
    description: String,
    link: Option<String>,
    audio: String,
    image: Option<String>,
    thumbnail: Option<String>,
    audio_length_sec: i64,
    maybe_audio_invalid: bool,
    pub_date_ms: i64,
}

impl From<EpisodeRecord> for EpisodeJson {
    fn from(record: EpisodeRecord) -> Self {
        Self {
            thumbnail: record.image.clone(),
            id: record.id,
            title: record.title,
            description: record.description,
            link: None,
            audio: record.audio,
            image: record.image,
            audio_length_sec: record.audio_length_sec,
            maybe_audio_invalid: record.maybe_audio_invalid,
            pub_date_ms: record.publish_date,
        }
    }
}

/// A registered client device
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Row id
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Client-generated device identifier (unique)
    pub device_id: String,
    /// Push token (unique)
    pub notification_token: String,
    /// Unix timestamp of the last registration
    pub updated_at: i64,
}

/// Custom data attached to a new-episode push
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    /// Episode identifier
    #[serde(rename = "episodeID")]
    pub episode_id: String,
    /// Public artwork URL, when the episode has one
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
}

impl From<&EpisodeRecord> for NotificationPayload {
    fn from(episode: &EpisodeRecord) -> Self {
        Self {
            episode_id: episode.id.clone(),
            image_url: episode.image.clone(),
        }
    }
}

/// Event emitted during a task's lifecycle
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted into the pool
    TaskQueued {
        /// Task ID
        id: TaskId,
        /// Source URL
        url: String,
    },

    /// Task moved to executing
    TaskStarted {
        /// Task ID
        id: TaskId,
    },

    /// Task was cancelled before dispatch and ran no stage
    TaskCancelled {
        /// Task ID
        id: TaskId,
    },

    /// Episode persisted
    TaskCompleted {
        /// Task ID
        id: TaskId,
        /// Identifier of the new episode
        episode_id: String,
    },

    /// A stage failed
    TaskFailed {
        /// Task ID
        id: TaskId,
        /// Error kind, e.g. "already_exists"
        kind: String,
        /// Error message
        error: String,
    },
}

impl Event {
    /// Task this event belongs to
    pub fn task_id(&self) -> TaskId {
        match self {
            Event::TaskQueued { id, .. }
            | Event::TaskStarted { id }
            | Event::TaskCancelled { id }
            | Event::TaskCompleted { id, .. }
            | Event::TaskFailed { id, .. } => *id,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_thumbnail(thumbnail: Option<&str>) -> FetchResult {
        FetchResult {
            id: "abc123".into(),
            title: "Ep 1".into(),
            description: None,
            duration: 0,
            thumbnail: thumbnail.map(String::from),
        }
    }

    #[test]
    fn fetch_result_parses_fetcher_json() {
        let json = r#"{"id":"abc123","title":"Ep 1","description":"d","duration":120,
                       "thumbnail":"https://i.ytimg.com/vi/abc123/maxresdefault.webp","extra":1}"#;
        let result: FetchResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.id, "abc123");
        assert_eq!(result.description.as_deref(), Some("d"));
        assert_eq!(result.duration, 120);
        assert_eq!(result.thumbnail_extension().as_deref(), Some("webp"));
    }

    #[test]
    fn fetch_result_accepts_float_and_missing_duration() {
        let float: FetchResult =
            serde_json::from_str(r#"{"id":"a","title":"t","duration":59.6}"#).unwrap();
        assert_eq!(float.duration, 60);

        let missing: FetchResult = serde_json::from_str(r#"{"id":"a","title":"t"}"#).unwrap();
        assert_eq!(missing.duration, 0);
        assert!(missing.thumbnail.is_none());
    }

    #[test]
    fn thumbnail_extension_handles_paths_and_queries() {
        let cases = [
            (Some("abc123.webp"), Some("webp")),
            (Some("https://cdn.example/x/abc123.JPG?sqp=1#frag"), Some("jpg")),
            (Some("/tmp/work/abc123.png"), Some("png")),
            (Some("https://cdn.example/x/noext"), None),
            (Some("https://cdn.example.com/"), None),
            (Some(".hidden"), None),
            (None, None),
        ];
        for (thumbnail, expected) in cases {
            assert_eq!(
                result_with_thumbnail(thumbnail).thumbnail_extension().as_deref(),
                expected,
                "thumbnail {thumbnail:?}"
            );
        }
    }

    #[test]
    fn artifact_kind_derives_key_and_content_type() {
        let id = MediaId::from("abc123");
        assert_eq!(ArtifactKind::Audio.object_key(&id), "abc123.mp3");
        assert_eq!(ArtifactKind::Audio.content_type(), "audio/mpeg");

        let image = ArtifactKind::Image {
            extension: "webp".into(),
        };
        assert_eq!(image.object_key(&id), "abc123.webp");
        assert_eq!(image.content_type(), "image/webp");
    }

    #[test]
    fn episode_record_serializes_wire_names() {
        let record = EpisodeRecord {
            id: "abc123".into(),
            title: "Ep 1".into(),
            description: String::new(),
            audio: "https://cdn/abc123.mp3".into(),
            image: None,
            audio_length_sec: 120,
            maybe_audio_invalid: false,
            publish_date: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pub_date_ms"], 1_700_000_000_000_i64);
        assert_eq!(json["audio_length_sec"], 120);
        assert_eq!(json["maybe_audio_invalid"], false);
        assert!(json["image"].is_null());
        assert!(json["thumbnail"].is_null());
        assert!(json["link"].is_null());
    }

    #[test]
    fn thumbnail_mirrors_image_and_reads_back() {
        let record = EpisodeRecord {
            id: "abc123".into(),
            title: "Ep 1".into(),
            description: "d".into(),
            audio: "https://cdn/abc123.mp3".into(),
            image: Some("https://cdn/abc123.webp".into()),
            audio_length_sec: 120,
            maybe_audio_invalid: false,
            publish_date: 1,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["thumbnail"], "https://cdn/abc123.webp");
        assert_eq!(json["image"], json["thumbnail"]);

        let parsed: EpisodeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn notification_payload_uses_client_keys() {
        let payload = NotificationPayload {
            episode_id: "abc123".into(),
            image_url: Some("https://cdn/abc123.webp".into()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["episodeID"], "abc123");
        assert_eq!(json["imageURL"], "https://cdn/abc123.webp");
    }

    #[test]
    fn event_is_tagged_by_type() {
        let event = Event::TaskFailed {
            id: TaskId(7),
            kind: "fetch_failed".into(),
            error: "boom".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_failed");
        assert_eq!(json["id"], 7);
        assert_eq!(event.task_id(), TaskId(7));
    }
}
