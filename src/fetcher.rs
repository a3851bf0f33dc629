//! Paginated fetch of the full incident collection with per-page retry

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, DEFAULT_API_RETRIES, DEFAULT_RETRY_BACKOFF_SECS};
use crate::model::{Incident, RektsEnvelope};
use crate::query::GraphQlRequest;
use crate::transport::Transport;

/// Attempt budget and pause applied to every page independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_API_RETRIES,
            backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.retry_backoff,
        }
    }
}

/// Why a single attempt did not produce a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Transport(String),
    Status(u16),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            AttemptFailure::Status(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// Progress made before a fatal failure
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Last page fully retrieved, 0 if none
    pub last_completed_page: u32,
    pub records_fetched: usize,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "last completed page {}, {} records fetched",
            self.last_completed_page, self.records_fetched
        )
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Page {page} failed after {attempts} attempts ({last_failure}); {checkpoint}")]
    RetriesExhausted {
        page: u32,
        attempts: u32,
        last_failure: AttemptFailure,
        checkpoint: Checkpoint,
    },
    #[error("Malformed response for page {page}: {reason}; {checkpoint}")]
    Malformed {
        page: u32,
        reason: String,
        checkpoint: Checkpoint,
    },
}

impl FetchError {
    pub fn page(&self) -> u32 {
        match self {
            FetchError::RetriesExhausted { page, .. } | FetchError::Malformed { page, .. } => *page,
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        match self {
            FetchError::RetriesExhausted { checkpoint, .. }
            | FetchError::Malformed { checkpoint, .. } => *checkpoint,
        }
    }
}

/// Number of pages implied by the newest record id.
pub fn total_pages(first_record_id: u64, page_size: u32) -> u32 {
    let pages = first_record_id.div_ceil(u64::from(page_size.max(1)));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Progress bar in the same style as the rest of the CLI
pub fn page_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(1);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.green/black}] {pos}/{len} pages ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}

/// Sequential page-by-page collector
pub struct Fetcher<T: Transport> {
    transport: T,
    page_size: u32,
    policy: RetryPolicy,
    progress: ProgressBar,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, page_size: u32, policy: RetryPolicy) -> Self {
        Self {
            transport,
            page_size: page_size.max(1),
            policy,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(transport, config.page_size, RetryPolicy::from_config(config))
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every page and concatenate them in page order.
    ///
    /// The first record of page 1 carries the newest id, which is also the
    /// total record count; it decides how many pages follow. Any page that
    /// exhausts its attempts aborts the whole run.
    pub fn fetch_all(&self) -> Result<Vec<Incident>, FetchError> {
        let mut records = self.fetch_page(1, Checkpoint::default())?;

        let Some(newest_id) = records.first().map(|r| r.id) else {
            tracing::info!("Page 1 is empty, nothing to fetch");
            self.progress.finish_and_clear();
            return Ok(records);
        };

        let pages = total_pages(newest_id, self.page_size);
        tracing::info!(
            "Newest incident id {} -> {} pages of {}",
            newest_id,
            pages,
            self.page_size
        );

        self.progress.set_length(u64::from(pages));
        self.progress.inc(1);

        for page in 2..=pages {
            self.progress.set_message(format!("page {}", page));
            let checkpoint = Checkpoint {
                last_completed_page: page - 1,
                records_fetched: records.len(),
            };
            let mut batch = self.fetch_page(page, checkpoint)?;
            records.append(&mut batch);
            self.progress.inc(1);
        }

        self.progress.finish_with_message("done");
        tracing::info!("Fetched {} incidents", records.len());
        Ok(records)
    }

    /// Fetch one page, retrying transport failures and non-success statuses alike.
    fn fetch_page(&self, page: u32, checkpoint: Checkpoint) -> Result<Vec<Incident>, FetchError> {
        let request = GraphQlRequest::for_page(page, self.page_size);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!("Requesting page {} (attempt {}/{})", page, attempt, max_attempts);

            let failure = match self.transport.post(&request) {
                Ok(resp) if resp.is_success() => return parse_page(page, &resp.body, checkpoint),
                Ok(resp) => AttemptFailure::Status(resp.status),
                Err(e) => AttemptFailure::Transport(e.0),
            };

            if attempt >= max_attempts {
                tracing::warn!("Page {} attempt {}/{} failed: {}", page, attempt, max_attempts, failure);
                return Err(FetchError::RetriesExhausted {
                    page,
                    attempts: attempt,
                    last_failure: failure,
                    checkpoint,
                });
            }

            tracing::warn!(
                "Page {} attempt {}/{} failed: {}, retrying in {}s",
                page,
                attempt,
                max_attempts,
                failure,
                self.policy.backoff.as_secs_f32()
            );
            if !self.policy.backoff.is_zero() {
                std::thread::sleep(self.policy.backoff);
            }
        }
    }
}

impl<T: Transport> fmt::Debug for Fetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("page_size", &self.page_size)
            .field("policy", &self.policy)
            .finish()
    }
}

fn parse_page(page: u32, body: &str, checkpoint: Checkpoint) -> Result<Vec<Incident>, FetchError> {
    let malformed = |reason: String| FetchError::Malformed {
        page,
        reason,
        checkpoint,
    };

    let envelope: RektsEnvelope =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let records = envelope.into_page().map_err(malformed)?;

    tracing::debug!("Page {} returned {} records", page, records.len());
    Ok(records)
}
