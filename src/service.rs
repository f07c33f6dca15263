//! Service wiring: builds every component from [`Config`] and runs the
//! API server or the durable worker.

use crate::api::{self, AppState};
use crate::admission::AdmissionGuard;
use crate::catalog::CatalogRecordBuilder;
use crate::config::{Config, FetcherConfig, QueueMode};
use crate::db::Database;
use crate::error::Result;
use crate::fetcher::{CliFetcher, MediaFetcher, default_options};
use crate::notify::{ApnsSender, NotificationFanout, PushSender};
use crate::pipeline::{IngestPipeline, OrphanPolicy, PipelineComponents};
use crate::queue::{DurableQueue, DurableWorker, JobBackend, WorkerPool};
use crate::storage::{ArtifactUploader, ObjectStore, S3ObjectStore};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A fully wired ingestion service
pub struct IngestService {
    config: Config,
    db: Arc<Database>,
    store: Arc<dyn ObjectStore>,
    pipeline: IngestPipeline,
    backend: Arc<dyn JobBackend>,
}

impl IngestService {
    /// Build the production service: SQLite, S3, APNs and the external fetcher.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&config.storage));
        let sender: Arc<dyn PushSender> = Arc::new(ApnsSender::new(&config.push)?);
        let fetcher: Arc<dyn MediaFetcher> = Arc::new(build_fetcher(&config.fetcher));

        tracing::info!(
            database = %config.persistence.database_path.display(),
            bucket = %config.storage.bucket,
            queue = ?config.queue.mode,
            "service configured"
        );

        Ok(Self::from_parts(config, db, store, fetcher, sender))
    }

    /// Build the service around explicit collaborators.
    ///
    /// Must run inside a Tokio runtime: the in-process backend starts its
    /// dispatcher immediately.
    pub fn from_parts(
        config: Config,
        db: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn MediaFetcher>,
        sender: Arc<dyn PushSender>,
    ) -> Self {
        let pipeline = IngestPipeline::new(PipelineComponents {
            admission: AdmissionGuard::new(db.clone()),
            fetcher,
            uploader: ArtifactUploader::new(store.clone(), config.storage.public_url.clone()),
            records: CatalogRecordBuilder::new(db.clone()),
            notifier: NotificationFanout::new(db.clone(), sender, config.push.max_in_flight),
            orphan_policy: OrphanPolicy::Keep,
        });

        let backend: Arc<dyn JobBackend> = match config.queue.mode {
            QueueMode::InProcess => Arc::new(WorkerPool::new(
                Arc::new(pipeline.clone()),
                config.queue.max_concurrent,
            )),
            QueueMode::Durable => Arc::new(DurableQueue::new(db.clone())),
        };

        Self {
            config,
            db,
            store,
            pipeline,
            backend,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Catalog database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// The pipeline every task runs
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Submission backend selected by `queue.mode`
    pub fn backend(&self) -> &Arc<dyn JobBackend> {
        &self.backend
    }

    /// State for the API router
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.db.clone(),
            self.backend.clone(),
            self.store.clone(),
            self.config.storage.public_url.clone(),
        )
    }

    /// Serve the API until `shutdown` resolves, then drain the backend.
    pub async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let served = api::start_api_server(
            self.app_state(),
            &self.config.api.api_key,
            self.config.api.bind_address,
            shutdown,
        )
        .await;
        self.shutdown().await;
        served
    }

    /// Durable worker over this service's database and pipeline
    pub fn worker(&self) -> DurableWorker {
        DurableWorker::new(
            self.db.clone(),
            Arc::new(self.pipeline.clone()),
            &self.config.queue,
        )
    }

    /// Run the durable worker until `shutdown` is cancelled
    pub async fn run_worker(&self, shutdown: CancellationToken) -> Result<()> {
        let result = self.worker().run(shutdown).await.map(|_drained| ());
        self.db.pool().close().await;
        result
    }

    /// Stop accepting work and wait (bounded) for executing tasks.
    ///
    /// Returns false when tasks were still running at the deadline.
    pub async fn shutdown(&self) -> bool {
        let timeout = self.config.queue.shutdown_timeout;
        tracing::info!(backend = self.backend.name(), ?timeout, "shutting down");

        let drained = self.backend.shutdown(timeout).await;
        if !drained {
            tracing::warn!("tasks still executing at shutdown deadline");
        }
        self.db.pool().close().await;
        drained
    }
}

/// Resolve the fetcher binary; an unresolvable one is logged and left to
/// fail each fetch.
fn build_fetcher(config: &FetcherConfig) -> CliFetcher {
    let options = default_options(config.ffmpeg_location.clone());
    match CliFetcher::from_path(
        &config.binary,
        options.clone(),
        config.work_dir.clone(),
        config.timeout,
    ) {
        Some(fetcher) => {
            tracing::info!(binary = %fetcher.binary_path().display(), "fetcher binary found");
            fetcher
        }
        None => {
            tracing::warn!(
                binary = %config.binary.display(),
                "fetcher binary not found on PATH, every fetch will fail until it is installed"
            );
            CliFetcher::new(
                config.binary.clone(),
                options,
                config.work_dir.clone(),
                config.timeout,
            )
        }
    }
}
