// ── Remote data source ──
//
// The seam between the orchestrator and the network. A source performs one
// bounded fetch and reports either a dataset or a classified failure; the
// orchestrator never sees transport error types.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use vigia_api::{FeedClient, OperationalDataset, TlsMode, TransportConfig};

use crate::config::{FeedConfig, TlsVerification};
use crate::error::CoreError;
use crate::state::ErrorKind;

/// A failed fetch, reduced to its category plus a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type FetchOutcome = Result<OperationalDataset, ClassifiedFailure>;

/// Fetches the operational dataset.
///
/// Implementations must return within roughly `timeout` and must tolerate
/// the returned future being dropped mid-flight.
#[async_trait]
pub trait RemoteDataSource: Send + Sync {
    async fn fetch(&self, timeout: Duration) -> FetchOutcome;
}

// ── Classification ───────────────────────────────────────────────────

impl From<&vigia_api::Error> for ErrorKind {
    fn from(err: &vigia_api::Error) -> Self {
        if err.is_connect() {
            Self::NoConnectivity
        } else if err.is_timeout() {
            Self::Timeout
        } else if err
            .status()
            .is_some_and(|s| s == 429 || (500..600).contains(&s))
        {
            Self::ServerError
        } else if err.is_payload() {
            Self::NoData
        } else {
            Self::Unknown
        }
    }
}

impl From<vigia_api::Error> for ClassifiedFailure {
    fn from(err: vigia_api::Error) -> Self {
        Self {
            kind: ErrorKind::from(&err),
            message: err.to_string(),
        }
    }
}

// ── HTTP implementation ──────────────────────────────────────────────

/// Fetches from the operational feed over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: FeedClient,
}

impl HttpDataSource {
    pub fn new(feed: &FeedConfig) -> Result<Self, CoreError> {
        let tls = match &feed.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        let transport = TransportConfig {
            tls,
            timeout: feed.request_timeout,
            auth_token: feed.auth_token.clone(),
            ..TransportConfig::default()
        };
        let client = FeedClient::new(feed.endpoint.clone(), &transport)?;
        Ok(Self { client })
    }

    pub fn from_client(client: FeedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteDataSource for HttpDataSource {
    async fn fetch(&self, timeout: Duration) -> FetchOutcome {
        match self.client.fetch_dataset_within(timeout).await {
            Ok(dataset) => Ok(dataset),
            Err(e) => {
                let failure = ClassifiedFailure::from(e);
                debug!(kind = %failure.kind, error = %failure.message, "fetch failed");
                Err(failure)
            }
        }
    }
}
