//! # episode-ingest
//!
//! Turns media URLs into podcast-style episodes: fetches the source with an
//! external youtube-dl compatible tool, uploads the audio and artwork to
//! S3-compatible storage, records the episode in a SQLite catalog and pushes
//! a notification to every registered device.
//!
//! ## Architecture
//!
//! - [`pipeline::IngestPipeline`] runs one task's stages in order: admission
//!   (dedup), fetch, upload, persist, notify
//! - [`queue`] bounds how many tasks execute at once, either in-process
//!   ([`queue::WorkerPool`]) or through a durable SQLite job table
//!   ([`queue::DurableQueue`] plus [`queue::DurableWorker`])
//! - [`api`] accepts submissions and serves the catalog and device registry
//! - every external collaborator sits behind a trait ([`fetcher::MediaFetcher`],
//!   [`storage::ObjectStore`], [`notify::PushSender`], [`catalog::Catalog`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use episode_ingest::{Config, IngestService, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let service = IngestService::new(config).await?;
//!
//!     // Serve until SIGTERM/SIGINT, then drain executing tasks
//!     run_with_shutdown(service).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Media identifier extraction and duplicate admission
pub mod admission;
/// REST API module
pub mod api;
/// Catalog query/persist interface and record building
pub mod catalog;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// External media fetcher invocation
pub mod fetcher;
/// Push notifications
pub mod notify;
/// Per-task ingestion pipeline
pub mod pipeline;
/// Job submission backends
pub mod queue;
/// Production wiring
pub mod service;
/// Object storage and local artifacts
pub mod storage;
/// Task state machine
pub mod task;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, QueueMode};
pub use db::Database;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, IngestError, Result, ToHttpStatus};
pub use pipeline::{IngestPipeline, JobRunner, OrphanPolicy};
pub use queue::{JobBackend, Submission};
pub use service::IngestService;
pub use types::{EpisodeRecord, Event, FetchResult, IngestJob, MediaId, TaskId};

/// Serve the API until a termination signal, then shut the service down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(service: IngestService) -> Result<()> {
    service.serve(wait_for_signal()).await
}

/// Run the durable worker until a termination signal, then let executing jobs finish.
pub async fn run_worker_with_shutdown(service: IngestService) -> Result<()> {
    let shutdown = tokio_util::sync::CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });
    service.run_worker(shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
