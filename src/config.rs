//! Configuration types for episode-ingest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// External fetcher settings (binary, transcoder override, working directory)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Fetcher executable name or path (default: "youtube-dl", resolved through PATH)
    #[serde(default = "default_fetcher_binary")]
    pub binary: PathBuf,

    /// Transcoder binary location passed as `--ffmpeg-location`
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,

    /// Directory the fetcher writes `{id}.{ext}` artifacts into (default: "./work")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Upper bound for a single fetcher invocation (default: 1 hour)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary: default_fetcher_binary(),
            ffmpeg_location: None,
            work_dir: default_work_dir(),
            timeout: default_fetch_timeout(),
        }
    }
}

/// S3-compatible object storage settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Access key id
    pub access_key_id: String,

    /// Secret access key
    pub secret_access_key: String,

    /// Bucket receiving audio and artwork objects
    pub bucket: String,

    /// Endpoint URL of the S3-compatible service
    pub endpoint_url: String,

    /// Signing region (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Public URL prefix that object keys are appended to
    pub public_url: String,

    /// Upper bound for one put/delete call (default: 10 minutes)
    #[serde(default = "default_storage_timeout", with = "duration_serde")]
    pub operation_timeout: Duration,
}

impl StorageConfig {
    /// Public URL of an object key, joined with exactly one slash
    pub fn public_url_for(&self, key: &str) -> String {
        crate::storage::public_url(&self.public_url, key)
    }
}

/// Push gateway (APNs) signing settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PushConfig {
    /// Apple developer team id, the provider token issuer
    pub team_id: String,

    /// Id of the signing key, sent as the token's `kid`
    pub key_id: String,

    /// Base64-encoded PKCS#8 P-256 private key
    pub private_key_base64: String,

    /// Bundle id used as `apns-topic`
    pub topic: String,

    /// Use the sandbox gateway instead of production
    #[serde(default)]
    pub sandbox: bool,

    /// Timeout for each push request (default: 10 seconds)
    #[serde(default = "default_push_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Maximum concurrent sends during one fan-out (default: 16)
    #[serde(default = "default_push_concurrency")]
    pub max_in_flight: usize,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./episode-ingest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Which job backend accepts submissions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Bounded worker pool inside the API process
    #[default]
    InProcess,
    /// Jobs persisted to the database and executed by `episode-ingest worker`
    Durable,
}

impl std::str::FromStr for QueueMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_process" | "in-process" | "inprocess" => Ok(QueueMode::InProcess),
            "durable" => Ok(QueueMode::Durable),
            other => Err(format!("unknown queue mode '{other}'")),
        }
    }
}

/// Worker pool and durable queue settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Backend selection (default: in_process)
    #[serde(default)]
    pub mode: QueueMode,

    /// Maximum concurrently executing tasks (default: 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// How long an idle worker waits before polling again (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Claimed jobs older than this are reset to pending on worker start (default: 2 hours)
    #[serde(default = "default_stale_claim_timeout", with = "duration_serde")]
    pub stale_claim_timeout: Duration,

    /// How long shutdown waits for executing tasks (default: 15 minutes)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::default(),
            max_concurrent: default_max_concurrent(),
            poll_interval: default_poll_interval(),
            stale_claim_timeout: default_stale_claim_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Service API key required in `x-api-key`
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: String::new(),
        }
    }
}

/// Main configuration for episode-ingest
///
/// - [`fetcher`](FetcherConfig): external tool location and working directory
/// - [`storage`](StorageConfig): object store credentials and public URL prefix
/// - [`push`](PushConfig): notification signing credentials
/// - [`persistence`](PersistenceConfig): SQLite path
/// - [`queue`](QueueConfig): backend mode and concurrency
/// - [`api`](ApiConfig): bind address and service key
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External fetcher settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Object storage settings
    pub storage: StorageConfig,

    /// Push gateway settings
    pub push: PushConfig,

    /// Database settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Every credential is required; a missing one is a fatal startup error
    /// naming the variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        let defaults = Config::default();
        let config = Config {
            fetcher: FetcherConfig {
                binary: env
                    .optional("FETCHER_BINARY")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.fetcher.binary),
                ffmpeg_location: Some(PathBuf::from(env.required("FFMPEG_LOCATION")?)),
                work_dir: env
                    .optional("WORK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.fetcher.work_dir),
                timeout: env
                    .seconds("FETCH_TIMEOUT_SECS")?
                    .unwrap_or(defaults.fetcher.timeout),
            },
            storage: StorageConfig {
                access_key_id: env.required("S3_ACCESS_KEY_ID")?,
                secret_access_key: env.required("S3_SECRET_ACCESS_KEY")?,
                bucket: env.required("S3_BUCKET")?,
                endpoint_url: env.required("S3_ENDPOINT_URL")?,
                region: env.optional("S3_REGION").unwrap_or_else(default_region),
                public_url: env.required("S3_PUBLIC_URL")?,
                operation_timeout: env
                    .seconds("S3_OPERATION_TIMEOUT_SECS")?
                    .unwrap_or_else(default_storage_timeout),
            },
            push: PushConfig {
                team_id: env.required("APPLE_TEAM_ID")?,
                key_id: env.required("APNS_PRIVATE_KEY_ID")?,
                private_key_base64: env.required("APNS_PRIVATE_KEY_BASE64")?,
                topic: env.required("BUNDLE_ID")?,
                sandbox: env.parsed("APNS_SANDBOX")?.unwrap_or(false),
                timeout: env
                    .seconds("APNS_TIMEOUT_SECS")?
                    .unwrap_or_else(default_push_timeout),
                max_in_flight: env
                    .parsed("APNS_MAX_IN_FLIGHT")?
                    .unwrap_or_else(default_push_concurrency),
            },
            persistence: PersistenceConfig {
                database_path: env
                    .optional("DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.persistence.database_path),
            },
            queue: QueueConfig {
                mode: env.parsed("QUEUE_MODE")?.unwrap_or_default(),
                max_concurrent: env
                    .parsed("MAX_CONCURRENT")?
                    .unwrap_or(defaults.queue.max_concurrent),
                poll_interval: env
                    .parsed("QUEUE_POLL_INTERVAL_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.queue.poll_interval),
                stale_claim_timeout: env
                    .seconds("STALE_CLAIM_TIMEOUT_SECS")?
                    .unwrap_or(defaults.queue.stale_claim_timeout),
                shutdown_timeout: env
                    .seconds("SHUTDOWN_TIMEOUT_SECS")?
                    .unwrap_or(defaults.queue.shutdown_timeout),
            },
            api: ApiConfig {
                bind_address: env
                    .parsed("BIND_ADDRESS")?
                    .unwrap_or(defaults.api.bind_address),
                api_key: env.required("API_KEY")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_concurrent == 0 {
            return Err(config_error("max_concurrent must be at least 1", "MAX_CONCURRENT"));
        }
        if self.fetcher.timeout.is_zero() {
            return Err(config_error("fetch timeout must be positive", "FETCH_TIMEOUT_SECS"));
        }
        if self.storage.operation_timeout.is_zero() {
            return Err(config_error(
                "storage operation timeout must be positive",
                "S3_OPERATION_TIMEOUT_SECS",
            ));
        }
        if self.push.max_in_flight == 0 {
            return Err(config_error("push concurrency must be at least 1", "APNS_MAX_IN_FLIGHT"));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(config_error("bucket must not be empty", "S3_BUCKET"));
        }
        if self.storage.public_url.trim().is_empty() {
            return Err(config_error("public URL must not be empty", "S3_PUBLIC_URL"));
        }
        if self.api.api_key.is_empty() {
            return Err(config_error("API key must not be empty", "API_KEY"));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| config_error(&format!("{key} is not set"), key))
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| config_error(&format!("{key} is invalid: {e}"), key))
            })
            .transpose()
    }

    fn seconds(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self.parsed::<u64>(key)?.map(Duration::from_secs))
    }
}

// Default value functions
fn default_fetcher_binary() -> PathBuf {
    PathBuf::from("youtube-dl")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_storage_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_push_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_push_concurrency() -> usize {
    16
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./episode-ingest.db")
}

fn default_max_concurrent() -> usize {
    2
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_stale_claim_timeout() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
