// Operational feed HTTP client
//
// Wraps `reqwest::Client` with the feed's single-endpoint exchange: one GET,
// status check, body decode. Classification into retryable kinds happens
// one layer up; this module only reports what went wrong.

use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::OperationalDataset;
use crate::transport::TransportConfig;

const BODY_PREVIEW_LEN: usize = 200;

/// HTTP client for the operational data feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl FeedClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(endpoint: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, endpoint })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// The feed endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the full dataset.
    pub async fn fetch_dataset(&self) -> Result<OperationalDataset, Error> {
        debug!("GET {}", self.endpoint);

        let resp = self
            .http
            .get(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body_preview: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await?;
        trace!(bytes = body.len(), "feed body received");
        decode_dataset(&body)
    }

    /// Fetch with an outer deadline covering connect, headers, and body.
    ///
    /// Dropping the returned future aborts the in-flight request.
    pub async fn fetch_dataset_within(
        &self,
        deadline: Duration,
    ) -> Result<OperationalDataset, Error> {
        match tokio::time::timeout(deadline, self.fetch_dataset()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Decode a feed body, rejecting empty and content-free payloads.
pub fn decode_dataset(body: &str) -> Result<OperationalDataset, Error> {
    if body.trim().is_empty() {
        return Err(Error::EmptyBody);
    }

    let dataset: OperationalDataset =
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(body)),
            body: body.to_owned(),
        })?;

    if dataset.is_empty() {
        return Err(Error::EmptyDataset);
    }
    Ok(dataset)
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
