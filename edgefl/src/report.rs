//! Fire-and-forget delivery of round reports to the collector.
//!
//! Delivery is at most once: a failed POST is logged and dropped, never retried and
//! never surfaced to the controller.

use futures::future::BoxFuture;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::error::ReportError;
use crate::types::ReportPayload;

pub const DEFAULT_ENDPOINT: &str = "https://mobile-fl-server.azurewebsites.net/update";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub trait Reporter: Send + Sync {
    /// Completes once the attempt is over, whatever its outcome.
    fn send(&self, payload: ReportPayload) -> BoxFuture<'_, ()>;
}

pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpReporter {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One POST; only a 200 counts as delivered.
    pub async fn post(&self, payload: &ReportPayload) -> Result<(), ReportError> {
        let res = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await?;
        match res.status() {
            StatusCode::OK => Ok(()),
            other => Err(ReportError::Status(other.as_u16())),
        }
    }
}

impl Reporter for HttpReporter {
    fn send(&self, payload: ReportPayload) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.post(&payload).await {
                Ok(()) => info!(device = %payload.device_id, "result sent"),
                Err(e) => warn!(device = %payload.device_id, endpoint = %self.endpoint, "report dropped: {e}"),
            }
        })
    }
}

/// Logs the payload instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn send(&self, payload: ReportPayload) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match serde_json::to_string(&payload) {
                Ok(js) => info!(payload = %js, "report (not sent)"),
                Err(e) => warn!("report serialization failed: {e}"),
            }
        })
    }
}
