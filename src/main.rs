use clap::{Parser, Subcommand};
use episode_ingest::{Config, IngestService, QueueMode, run_with_shutdown, run_worker_with_shutdown};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Fetch media, publish episodes, notify devices")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the REST API; with QUEUE_MODE=in_process jobs also run here
    Serve,
    /// Execute jobs from the durable queue
    Worker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if matches!(args.command, Command::Worker) {
        // The worker only executes; it never accepts submissions itself.
        config.queue.mode = QueueMode::Durable;
    }

    let service = match IngestService::new(config).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Command::Serve => run_with_shutdown(service).await,
        Command::Worker => run_worker_with_shutdown(service).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exited with error");
            ExitCode::FAILURE
        }
    }
}
