use thiserror::Error;

/// Top-level error type for the `vigia-api` crate.
///
/// Covers every failure mode of a single feed exchange: transport, HTTP
/// status, and payload decoding. `vigia-core` classifies these into the
/// sync engine's failure taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The caller's deadline elapsed before the exchange completed.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP ────────────────────────────────────────────────────────
    /// Non-success HTTP status from the feed endpoint.
    #[error("Feed returned HTTP {status}: {body_preview}")]
    Status { status: u16, body_preview: String },

    // ── Payload ─────────────────────────────────────────────────────
    /// 2xx response with an empty body.
    #[error("Feed returned an empty body")]
    EmptyBody,

    /// Body decoded but carried no operational data at all.
    #[error("Feed returned a dataset with no content")]
    EmptyDataset,

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the request never reached the server
    /// (no route, DNS failure, connection refused).
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }

    /// Returns `true` if a deadline elapsed, either the client's own
    /// timeout or an HTTP-level timeout status.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => matches!(status, 408 | 504),
            _ => false,
        }
    }

    /// HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the server answered but the payload was unusable.
    pub fn is_payload(&self) -> bool {
        matches!(
            self,
            Self::EmptyBody | Self::EmptyDataset | Self::Deserialization { .. }
        ) || matches!(self, Self::Transport(e) if e.is_decode() || e.is_body())
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        if self.is_connect() || self.is_timeout() {
            return true;
        }
        self.status()
            .is_some_and(|s| s == 429 || (500..600).contains(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> Error {
        Error::Status {
            status: code,
            body_preview: String::new(),
        }
    }

    #[test]
    fn timeout_statuses_count_as_timeouts() {
        assert!(status(408).is_timeout());
        assert!(status(504).is_timeout());
        assert!(!status(500).is_timeout());
        assert!(Error::Timeout { timeout_ms: 10 }.is_timeout());
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!Error::EmptyBody.is_transient());
    }

    #[test]
    fn payload_errors_are_flagged() {
        assert!(Error::EmptyBody.is_payload());
        assert!(Error::EmptyDataset.is_payload());
        assert!(
            Error::Deserialization {
                message: "eof".into(),
                body: "{".into(),
            }
            .is_payload()
        );
        assert!(!status(500).is_payload());
    }
}
