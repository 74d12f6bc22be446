//! Single-request transport and response classification.
//!
//! [`Transport`] is the network boundary: it sends one [`ApiRequest`] and
//! hands back the raw status, `Retry-After` header and body. [`classify`]
//! turns that into an [`Outcome`] without touching the network, so the
//! status-code dispatch can be tested with plain values.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode, Url};
use serde::Deserialize;

use crate::MastodonError;

/// Default API root of the flagship instance.
pub const DEFAULT_BASE_URL: &str = "https://mastodon.social/api/v1";

/// A logical client operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Create { status: String },
    Retrieve { id: String },
    Delete { id: String },
}

impl Operation {
    pub fn method(&self) -> Method {
        match self {
            Self::Create { .. } => Method::POST,
            Self::Retrieve { .. } => Method::GET,
            Self::Delete { .. } => Method::DELETE,
        }
    }

    /// Path segments below the base URL. Ids stay a single segment and are
    /// percent-encoded when the URL is built.
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Create { .. } => vec!["statuses".to_owned()],
            Self::Retrieve { id } | Self::Delete { id } => {
                vec!["statuses".to_owned(), id.clone()]
            }
        }
    }

    /// Builds the request for this operation.
    pub fn to_request(&self, timeout: Duration) -> ApiRequest {
        let form = match self {
            Self::Create { status } => Some(vec![("status".to_owned(), status.clone())]),
            Self::Retrieve { .. } | Self::Delete { .. } => None,
        };
        ApiRequest {
            method: self.method(),
            segments: self.segments(),
            form,
            timeout,
        }
    }

    fn not_found_message(&self) -> String {
        match self {
            Self::Retrieve { id } | Self::Delete { id } => {
                format!("Post with ID {id} not found")
            }
            Self::Create { .. } => "statuses endpoint not found".to_owned(),
        }
    }
}

/// An HTTP request described as plain data, relative to the base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Unencoded path segments appended to the base URL.
    pub segments: Vec<String>,
    /// URL-encoded form fields, sent as the body when present.
    pub form: Option<Vec<(String, String)>>,
    pub timeout: Duration,
}

/// The parts of an HTTP response the client looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Raw `Retry-After` header value, if the server sent one.
    pub retry_after: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }
}

/// Failure below HTTP: timeout, refused connection, DNS, truncated body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkFault(pub String);

impl fmt::Display for NetworkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<reqwest::Error> for NetworkFault {
    fn from(err: reqwest::Error) -> Self {
        let label = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_body() || err.is_decode() {
            "response body failed"
        } else {
            "request failed"
        };
        Self(format!("{label}: {err}"))
    }
}

/// Sends exactly one request. No retrying, no sleeping.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, NetworkFault>;
}

/// Why an attempt may succeed if repeated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Network(String),
}

/// Normalized result of one attempt.
#[derive(Debug)]
pub enum Outcome {
    /// 2xx with the raw body.
    Success(String),
    Retryable {
        reason: RetryReason,
        /// Server-suggested wait, parsed from `Retry-After`.
        retry_after: Option<Duration>,
    },
    Terminal(MastodonError),
}

/// Maps one transport result onto an [`Outcome`].
pub fn classify(operation: &Operation, result: Result<RawResponse, NetworkFault>) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(fault) => {
            return Outcome::Retryable {
                reason: RetryReason::Network(fault.0),
                retry_after: None,
            }
        }
    };

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_success() {
        return Outcome::Success(response.body);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Outcome::Retryable {
            reason: RetryReason::RateLimited,
            retry_after: response.retry_after.as_deref().and_then(parse_retry_after),
        },
        StatusCode::NOT_FOUND => {
            Outcome::Terminal(MastodonError::InvalidInput(operation.not_found_message()))
        }
        StatusCode::BAD_REQUEST => Outcome::Terminal(MastodonError::InvalidInput(
            server_error_message(&response.body),
        )),
        StatusCode::UNAUTHORIZED => Outcome::Terminal(MastodonError::Unauthorized),
        _ => Outcome::Terminal(MastodonError::Http {
            status: response.status,
            body: response.body,
        }),
    }
}

/// Parses a delay-seconds `Retry-After` value. Anything else yields `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn server_error_message(body: &str) -> String {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(error) }) => error,
        Ok(ErrorBody { error: None }) => "Unknown error".to_owned(),
        Err(_) if !body.trim().is_empty() => body.trim().to_owned(),
        Err(_) => "Unknown error".to_owned(),
    };
    format!("Invalid input: {message}")
}

/// `reqwest`-backed transport with a bearer credential.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    authorization: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("authorization", &"<redacted>")
            .finish()
    }
}

impl HttpTransport {
    /// `authorization` is sent verbatim as the `Authorization` header.
    pub fn new(base_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            authorization: authorization.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, NetworkFault> {
        let base = &self.base_url;
        let mut url = Url::parse(base)
            .map_err(|err| NetworkFault(format!("invalid base url {base}: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| NetworkFault(format!("base url {base} cannot carry a path")))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, NetworkFault> {
        let url = self.url_for(request)?;
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(header::AUTHORIZATION, &self.authorization)
            .timeout(request.timeout);
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
