use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::error::MediaError;
use crate::retry::retry_with_backoff;

/// Downloads the raw bytes behind a media URL.
pub trait MediaFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, MediaError>> + Send;
}

/// [`MediaFetcher`] over plain HTTP(S) GETs.
///
/// 429 and 5xx responses, timeouts and connection failures are retried with
/// jittered exponential back-off up to `max_retries` additional attempts. A
/// 429's `Retry-After` is honored as the minimum wait.
pub struct HttpMediaFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpMediaFetcher {
    /// # Errors
    ///
    /// Returns [`MediaError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(MediaError::RateLimited {
                url: url.to_owned(),
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MediaError::NotFound {
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(MediaError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.fetch_once(url)).await
    }
}
