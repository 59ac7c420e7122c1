//! Upstream audit-event client
//!
//! Lists audit events newer than a timestamp from the deployment
//! director. The director's own authentication service hands out tokens
//! via the client-credentials grant; a fresh token is obtained per call,
//! mirroring how rarely the daemon polls.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::EventError;
use crate::types::AuditEvent;

/// Source of audit events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events with `timestamp` strictly greater than the argument, in
    /// upstream-defined (NOT necessarily sorted) order.
    async fn events_after(&self, timestamp: i64) -> Result<Vec<AuditEvent>, EventError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Event client for a BOSH director authenticated through UAA.
pub struct BoshEventClient {
    client: reqwest::Client,
    director_url: String,
    uaa_url: String,
    client_id: String,
    client_secret: String,
}

impl BoshEventClient {
    /// Create a client. `director_ca_pem` and `uaa_ca_pem` are optional
    /// PEM bundles to trust in addition to the system roots.
    pub fn new(
        director_url: impl Into<String>,
        uaa_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        director_ca_pem: Option<&[u8]>,
        uaa_ca_pem: Option<&[u8]>,
    ) -> Result<Self, EventError> {
        let mut builder = reqwest::Client::builder();
        for pem in [director_ca_pem, uaa_ca_pem].into_iter().flatten() {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| EventError::Authentication(format!("invalid CA material: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            client: builder.build()?,
            director_url: strip_slash(director_url.into()),
            uaa_url: strip_slash(uaa_url.into()),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    async fn fetch_token(&self) -> Result<String, EventError> {
        let response = self
            .client
            .post(format!("{}/oauth/token", self.uaa_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventError::Authentication(format!(
                "token endpoint answered {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

fn strip_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl EventSource for BoshEventClient {
    async fn events_after(&self, timestamp: i64) -> Result<Vec<AuditEvent>, EventError> {
        let token = self.fetch_token().await?;

        let response = self
            .client
            .get(format!("{}/events", self.director_url))
            .bearer_auth(token)
            .query(&[("after_time", rfc3339(timestamp))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let events: Vec<AuditEvent> = response.json().await?;

        // The director's time filter is inclusive at second granularity;
        // the contract here is strictly-greater.
        Ok(events
            .into_iter()
            .filter(|event| event.timestamp > timestamp)
            .collect())
    }
}
