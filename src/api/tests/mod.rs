use super::*;
use crate::db::Database;
use crate::error::Error;
use crate::queue::{JobBackend, Submission};
use crate::storage::ObjectStore;
use crate::types::{EpisodeRecord, IngestJob};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

mod download;
mod episodes;

const API_KEY: &str = "test-api-key";
const PUBLIC_URL: &str = "https://cdn.example.com";

/// Backend that records submissions instead of running them
#[derive(Default)]
struct RecordingBackend {
    jobs: Mutex<Vec<IngestJob>>,
    next_id: AtomicI64,
    closed: AtomicBool,
    /// Refuse submissions once this many jobs were taken; zero means no limit
    capacity: AtomicUsize,
}

#[async_trait]
impl JobBackend for RecordingBackend {
    async fn submit(&self, job: IngestJob) -> crate::Result<Submission> {
        let capacity = self.capacity.load(Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap();
        if self.closed.load(Ordering::SeqCst) || (capacity > 0 && jobs.len() >= capacity) {
            return Err(Error::ShuttingDown);
        }
        jobs.push(job);
        drop(jobs);
        Ok(Submission::Persisted {
            job_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn shutdown(&self, _timeout: Duration) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        true
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[derive(Default)]
struct RecordingStore {
    fail_deletes: bool,
    deletes: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(&self, _key: &str, _file: &Path, _content_type: &str) -> crate::Result<()> {
        Ok(())
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        if self.fail_deletes {
            return Err(Error::Storage(format!("delete {key}: 503 SlowDown")));
        }
        Ok(())
    }
}

struct TestApp {
    _dir: TempDir,
    db: Arc<Database>,
    backend: Arc<RecordingBackend>,
    store: Arc<RecordingStore>,
    router: Router,
}

impl TestApp {
    async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

async fn test_app() -> TestApp {
    test_app_with_store(RecordingStore::default()).await
}

async fn test_app_with_store(store: RecordingStore) -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&dir.path().join("api.db")).await.unwrap());
    let backend = Arc::new(RecordingBackend::default());
    let store = Arc::new(store);

    let state = AppState::new(db.clone(), backend.clone(), store.clone(), PUBLIC_URL);
    let router = create_router(state, API_KEY);

    TestApp {
        _dir: dir,
        db,
        backend,
        store,
        router,
    }
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY)
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    authed(method, uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn episode(id: &str, publish_date: i64, image: bool) -> EpisodeRecord {
    EpisodeRecord {
        id: id.to_string(),
        title: format!("Episode {id}"),
        description: String::new(),
        audio: format!("{PUBLIC_URL}/{id}.mp3"),
        image: image.then(|| format!("{PUBLIC_URL}/{id}.jpg")),
        audio_length_sec: 60,
        maybe_audio_invalid: false,
        publish_date,
    }
}

#[tokio::test]
async fn health_needs_no_api_key() {
    let app = test_app().await;

    let response = app
        .request(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["queue"], "recording");
}

#[tokio::test]
async fn protected_routes_reject_missing_key() {
    let app = test_app().await;

    for (method, uri) in [
        ("POST", "/download"),
        ("GET", "/episodes"),
        ("DELETE", "/episodes/abc123"),
        ("GET", "/devices"),
        ("POST", "/devices"),
    ] {
        let response = app
            .request(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {uri} must require the API key"
        );
    }
}

#[tokio::test]
async fn api_server_binds_and_stops_on_shutdown() {
    let app = test_app().await;
    let state = AppState::new(
        app.db.clone(),
        app.backend.clone(),
        app.store.clone(),
        PUBLIC_URL,
    );
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        start_api_server(state, API_KEY, "127.0.0.1:0".parse().unwrap(), async {
            rx.await.ok();
        })
        .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
