use std::time::Duration;

/// Coarse error category used by front ends to pick a user-facing signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Caller-supplied data is malformed, missing, oversized or references a
    /// post that does not exist. Never retried.
    InvalidInput,
    /// The service kept rate limiting until the attempt budget ran out.
    RateLimit,
    /// Any other failure: authorization, unexpected status, network fault,
    /// undecodable body.
    Api,
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum MastodonError {
    /// Input rejected locally or by the service (400/404).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// HTTP 429 on every attempt.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimited {
        attempts: usize,
        /// Total time spent waiting between attempts.
        waited: Duration,
    },
    /// HTTP 401 from the service.
    #[error("authentication failed, check your access token")]
    Unauthorized,
    /// Non-success HTTP status code with raw response body.
    #[error("api error {status}: {body}")]
    Http { status: u16, body: String },
    /// Network-level failure that persisted through the last attempt.
    #[error("request failed: {0}")]
    Transport(String),
    /// Success response whose body is not the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// The retry loop finished without an outcome.
    #[error("maximum retries exceeded")]
    RetriesExhausted,
}

impl MastodonError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Unauthorized
            | Self::Http { .. }
            | Self::Transport(_)
            | Self::Decode(_)
            | Self::RetriesExhausted => ErrorKind::Api,
        }
    }
}
