// Rate-limited, retrying HTTP client for the registry API (spec §4.3).

use parking_lot::Mutex;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{CoreError, CoreResult};

pub struct RateLimitedFetcher {
    client: reqwest::Client,
    min_interval: Duration,
    max_retries: u32,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedFetcher {
    pub fn new(min_interval: Duration, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            min_interval,
            max_retries,
            last_request: Mutex::new(None),
        }
    }

    async fn throttle(&self) {
        let wait = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let wait = match *last {
                Some(prev) => self.min_interval.saturating_sub(now.duration_since(prev)),
                None => Duration::ZERO,
            };
            *last = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// `GET url` returning the raw response bytes, with linear backoff retry
    /// on transient failures. A 4xx response is a client error no retry
    /// could fix, so it short-circuits straight to `Permanent`.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> CoreResult<Vec<u8>> {
        let mut last_error: Option<CoreError> = None;
        for attempt in 0..=self.max_retries {
            self.throttle().await;
            match self.client.get(url).send().await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => match resp.bytes().await {
                        Ok(bytes) => return Ok(bytes.to_vec()),
                        Err(e) => last_error = Some(e.into()),
                    },
                    Err(e) => {
                        if e.status().map(|s| s.is_client_error()).unwrap_or(false) {
                            return Err(CoreError::Permanent { cause: e.to_string() });
                        }
                        last_error = Some(e.into());
                    }
                },
                Err(e) => last_error = Some(e.into()),
            }
            if attempt < self.max_retries {
                let backoff = Duration::from_secs((attempt + 1) as u64);
                warn!(url, attempt, backoff_secs = backoff.as_secs(), "fetch failed, retrying");
                tokio::time::sleep(backoff).await;
            }
        }
        let cause = last_error.unwrap_or(CoreError::Permanent { cause: "request never attempted".to_string() });
        Err(CoreError::Permanent { cause: cause.to_string() })
    }

    /// `GET url`, writing the response body to `path`.
    #[instrument(skip(self), fields(url = %url, path = %path.display()))]
    pub async fn download(&self, url: &str, path: &Path) -> CoreResult<()> {
        let bytes = self.get(url).await?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| CoreError::Parse { detail: format!("failed to write {}: {e}", path.display()) })?;
        debug!(url, path = %path.display(), "downloaded");
        Ok(())
    }
}
