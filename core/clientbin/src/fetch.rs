//! Archive fetching.
//!
//! The pipeline fetches through the [`ArchiveFetcher`] trait so the transport
//! can be swapped out. [`HttpFetcher`] is the default implementation.
//!
//! ## HTTP Behavior
//!
//! - The body is streamed to `<dest>.tmp` and renamed onto `dest` only after
//!   the last byte is flushed, so `dest` never holds a partial archive
//! - Failed attempts are retried per [`RetryPolicy`]
//! - Progress reports are throttled to one per [`PROGRESS_INTERVAL`]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;

/// Fetch progress, delivered through a [`ProgressCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The server answered and the body is about to stream.
    Started {
        /// Source URL.
        url: String,
        /// Body size in bytes, `0` when unknown.
        total: u64,
    },
    /// Bytes received so far.
    Progress {
        /// Cumulative byte count for the current attempt.
        downloaded: u64,
        /// Average rate of the current attempt in bytes per second.
        speed: u64,
    },
    /// The archive is in place.
    Completed,
    /// Every attempt failed.
    Failed {
        /// The last attempt's error.
        error: String,
    },
}

/// Receives [`ProgressEvent`]s.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Fetches an archive from a URL into a local file.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Writes the body at `url` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error on any transport or filesystem failure.
    async fn fetch(&self, url: &str, dest: &Path, progress: Option<ProgressCallback>)
    -> Result<()>;
}

/// Minimum spacing between two `Progress` events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// How many times a fetch is attempted and how long to wait in between.
///
/// The wait before attempt `n` (counting from 1) is `base_delay * 2^n` with up
/// to 25% jitter either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    /// Unjittered wait before the first retry is twice this value.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy making a single attempt.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before `attempt`, where attempt `0` is the first try.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let nominal = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let spread = nominal / 4;
        let offset = rand::rng().random_range(Duration::ZERO..=spread * 2);
        nominal - spread + offset
    }
}

/// HTTP(S) fetcher built on `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher with a five minute request timeout and the default
    /// [`RetryPolicy`].
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Cannot build HTTP client")?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    /// Streams one attempt into `part`.
    async fn attempt(&self, url: &str, part: &Path, reporter: &mut Reporter<'_>) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Server answered {status} for {url}");
        }

        reporter.started(url, response.content_length().unwrap_or(0));

        let mut out = tokio::fs::File::create(part)
            .await
            .with_context(|| format!("Cannot create {}", part.display()))?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.with_context(|| format!("Connection to {url} dropped"))?;
            out.write_all(&chunk)
                .await
                .with_context(|| format!("Cannot write {}", part.display()))?;
            reporter.received(chunk.len());
        }
        out.flush()
            .await
            .with_context(|| format!("Cannot flush {}", part.display()))?;

        reporter.finish_attempt();
        Ok(())
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        let part = dest.with_extension("tmp");
        let mut reporter = Reporter::new(progress.as_ref());
        let mut failure = None;

        for attempt in 0..self.retry.max_attempts {
            tokio::time::sleep(self.retry.delay_before(attempt)).await;
            reporter.reset();

            match self.attempt(url, &part, &mut reporter).await {
                Ok(()) => {
                    tokio::fs::rename(&part, dest).await.with_context(|| {
                        format!("Cannot move {} to {}", part.display(), dest.display())
                    })?;
                    reporter.emit(ProgressEvent::Completed);
                    return Ok(());
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    failure = Some(e);
                }
            }
        }

        let error = failure.unwrap_or_else(|| anyhow::anyhow!("No attempt was made for {url}"));
        reporter.emit(ProgressEvent::Failed {
            error: format!("{error:#}"),
        });
        Err(error)
    }
}

/// Throttles `Progress` events for one fetch.
struct Reporter<'a> {
    callback: Option<&'a ProgressCallback>,
    received: u64,
    started_at: Instant,
    last_report: Option<Instant>,
}

impl<'a> Reporter<'a> {
    fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            callback,
            received: 0,
            started_at: Instant::now(),
            last_report: None,
        }
    }

    fn reset(&mut self) {
        self.received = 0;
        self.started_at = Instant::now();
        self.last_report = None;
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = self.callback {
            callback(event);
        }
    }

    fn started(&self, url: &str, total: u64) {
        self.emit(ProgressEvent::Started {
            url: url.to_string(),
            total,
        });
    }

    fn received(&mut self, bytes: usize) {
        self.received += bytes as u64;
        let due = self
            .last_report
            .is_none_or(|at| at.elapsed() >= PROGRESS_INTERVAL);
        if due {
            self.report();
        }
    }

    fn finish_attempt(&mut self) {
        self.report();
    }

    fn report(&mut self) {
        self.last_report = Some(Instant::now());
        self.emit(ProgressEvent::Progress {
            downloaded: self.received,
            speed: rate(self.received, self.started_at.elapsed()),
        });
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn rate(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}
