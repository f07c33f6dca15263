//! Common test utilities for episode-ingest integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use episode_ingest::config::{
    ApiConfig, FetcherConfig, PersistenceConfig, PushConfig, QueueConfig, StorageConfig,
};
use episode_ingest::notify::{NewEpisodeAlert, NotificationError, PushSender};
use episode_ingest::{Config, Database, EpisodeRecord, QueueMode};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const API_KEY: &str = "integration-key";
pub const PUBLIC_URL: &str = "https://cdn.example.com";
pub const BUCKET: &str = "episodes";

/// Stand-in for youtube-dl: takes the `v` query parameter of its last
/// argument as the media id and writes `{id}.mp3` and `{id}.jpg` into the
/// current directory before printing its JSON result.
pub const FAKE_FETCHER: &str = r#"#!/bin/sh
for arg; do url="$arg"; done
id=$(printf '%s' "$url" | sed -n 's/.*[?&]v=\([^&]*\).*/\1/p')
echo "[youtube] $id: Downloading webpage" >&2
printf 'ID3audio' > "$id.mp3"
printf 'JFIFimage' > "$id.jpg"
printf '{"id":"%s","title":"Episode %s","description":null,"duration":61,"thumbnail":"https://i.example.com/vi/%s/maxres.jpg?v=2"}\n' "$id" "$id" "$id"
"#;

/// Write `FAKE_FETCHER` as an executable into `dir`
#[cfg(unix)]
pub fn install_fake_fetcher(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("youtube-dl");
    std::fs::write(&path, FAKE_FETCHER).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Configuration pointing every component into `dir`
pub fn test_config(dir: &Path, endpoint_url: &str, mode: QueueMode) -> Config {
    Config {
        fetcher: FetcherConfig {
            binary: dir.join("youtube-dl"),
            ffmpeg_location: Some(PathBuf::from("/usr/bin/ffmpeg")),
            work_dir: dir.join("work"),
            timeout: Duration::from_secs(30),
        },
        storage: StorageConfig {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            bucket: BUCKET.into(),
            endpoint_url: endpoint_url.into(),
            region: "us-east-1".into(),
            public_url: PUBLIC_URL.into(),
            operation_timeout: Duration::from_secs(10),
        },
        push: PushConfig {
            team_id: "TEAM123456".into(),
            key_id: "KEY1234567".into(),
            private_key_base64: String::new(),
            topic: "com.example.podcast".into(),
            sandbox: true,
            timeout: Duration::from_secs(5),
            max_in_flight: 4,
        },
        persistence: PersistenceConfig {
            database_path: dir.join("catalog.db"),
        },
        queue: QueueConfig {
            mode,
            max_concurrent: 2,
            poll_interval: Duration::from_millis(20),
            shutdown_timeout: Duration::from_secs(10),
            ..Default::default()
        },
        api: ApiConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            api_key: API_KEY.into(),
        },
    }
}

/// Push sender that records every token it was asked to notify
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, NewEpisodeAlert)>>,
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(&self, token: &str, alert: &NewEpisodeAlert) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), alert.clone()));
        Ok(())
    }
}

/// Poll the catalog until `id` appears
pub async fn wait_for_episode(db: &Database, id: &str, timeout: Duration) -> EpisodeRecord {
    tokio::time::timeout(timeout, async {
        loop {
            if let Some(record) = db.get_episode(id).await.unwrap() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("episode {id} was not published within {timeout:?}"))
}

/// True when `dir` exists and holds no entries
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
