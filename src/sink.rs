//! Event sink client
//!
//! POSTs one envelope per request to the collector endpoint with retry
//! and capped exponential backoff. Success is any status in [200, 300).

use std::time::Duration;

use rand::Rng;

use crate::error::SinkError;
use crate::types::SinkEvent;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);
const MAX_JITTER_MS: u64 = 500;

/// Retries after the first attempt.
const MAX_RETRIES: u32 = 3;

/// Retrying HTTP client for the event collector.
pub struct SplunkClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl SplunkClient {
    /// Create a client for the collector at `url`.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            token: token.into(),
        })
    }

    /// Deliver one envelope, retrying transport and HTTP failures.
    pub async fn ship(&self, event: &SinkEvent<'_>) -> Result<(), SinkError> {
        let body = serde_json::to_vec(event)?;

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0u32;

        loop {
            match self.post(&body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    let jitter =
                        Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS));
                    tracing::warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "sink delivery failed, retrying"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(&self, body: &[u8]) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Splunk {}", self.token),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
