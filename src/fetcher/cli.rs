//! Fetcher backed by an external youtube-dl compatible binary

use super::options::{FetchOption, build_args};
use super::parser::{combined_output, parse_fetch_output};
use super::traits::MediaFetcher;
use crate::error::IngestError;
use crate::types::FetchResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

/// Runs the fetcher binary with a fixed flag set inside the working directory
///
/// # Examples
///
/// ```no_run
/// use episode_ingest::fetcher::{CliFetcher, MediaFetcher, default_options};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = CliFetcher::new(
///     PathBuf::from("/usr/local/bin/youtube-dl"),
///     default_options(None),
///     PathBuf::from("./work"),
///     Duration::from_secs(3600),
/// );
/// let url = url::Url::parse("https://www.youtube.com/watch?v=abc123")?;
/// let result = fetcher.fetch(&url).await?;
/// println!("{} ({}s)", result.title, result.duration);
/// # Ok(())
/// # }
/// ```
pub struct CliFetcher {
    binary_path: PathBuf,
    options: Vec<FetchOption>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl CliFetcher {
    /// Create a fetcher with an explicit binary path
    pub fn new(
        binary_path: PathBuf,
        options: Vec<FetchOption>,
        work_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            binary_path,
            options,
            work_dir,
            timeout,
        }
    }

    /// Resolve `binary` through PATH (or as a path) with the `which` crate.
    ///
    /// Returns `None` when it cannot be found.
    pub fn from_path(
        binary: &Path,
        options: Vec<FetchOption>,
        work_dir: PathBuf,
        timeout: Duration,
    ) -> Option<Self> {
        which::which(binary)
            .ok()
            .map(|path| Self::new(path, options, work_dir, timeout))
    }

    /// Resolved binary path
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl MediaFetcher for CliFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, IngestError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| IngestError::FetchFailed {
                reason: format!(
                    "cannot create working directory {}: {e}",
                    self.work_dir.display()
                ),
                output: String::new(),
            })?;

        let args = build_args(&self.options, url.as_str());
        tracing::debug!(binary = %self.binary_path.display(), ?args, "invoking fetcher");

        let child = Command::new(&self.binary_path)
            .args(&args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IngestError::FetchFailed {
                reason: format!("failed to execute {}: {e}", self.binary_path.display()),
                output: String::new(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(IngestError::FetchFailed {
                    reason: format!("failed waiting for fetcher: {e}"),
                    output: String::new(),
                });
            }
            Err(_) => {
                return Err(IngestError::FetchFailed {
                    reason: format!("fetcher timed out after {}s", self.timeout.as_secs()),
                    output: String::new(),
                });
            }
        };

        if !output.status.success() {
            return Err(IngestError::FetchFailed {
                reason: format!("fetcher exited with {}", output.status),
                output: combined_output(&output.stdout, &output.stderr),
            });
        }

        parse_fetch_output(&output.stdout, &output.stderr)
    }

    fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
