//! `mastodon-status-http` is an async HTTP client for the Mastodon statuses API.
//!
//! The crate wraps the `/statuses` endpoints with three operations:
//! - [`MastodonClient::create`]
//! - [`MastodonClient::retrieve`]
//! - [`MastodonClient::delete`]
//!
//! Input is validated before any request is sent. Rate limiting (HTTP 429)
//! and network faults are retried up to [`ClientOptions::max_attempts`] times,
//! waiting for the server's `Retry-After` hint or the configured delay.

mod client;
mod error;
mod options;
pub mod retry;
pub mod transport;
mod types;
pub mod validate;

pub use client::MastodonClient;
pub use error::{ErrorKind, MastodonError};
pub use options::ClientOptions;
pub use retry::{Sleeper, TokioSleeper};
pub use transport::{HttpTransport, Transport, DEFAULT_BASE_URL};
pub use types::Post;

pub type Result<T> = std::result::Result<T, MastodonError>;
