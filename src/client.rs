use std::fmt;

use crate::{
    retry::{RetryCoordinator, Sleeper, TokioSleeper},
    transport::{HttpTransport, Operation, Transport, DEFAULT_BASE_URL},
    validate::{validate_post_id, validate_status_text},
    ClientOptions, MastodonError, Post, Result,
};

#[derive(Clone)]
/// Client for the statuses endpoints of a Mastodon API.
pub struct MastodonClient<T = HttpTransport, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    options: ClientOptions,
}

impl<T: fmt::Debug, S> fmt::Debug for MastodonClient<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonClient")
            .field("transport", &self.transport)
            .field("options", &self.options)
            .finish()
    }
}

impl MastodonClient {
    /// Creates a client from an API root and a bearer token.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn new(base_url: impl Into<String>, token: impl AsRef<str>) -> Self {
        let authorization = normalize_bearer_authorization(token.as_ref());
        Self::new_raw_auth(base_url, authorization)
    }

    /// Creates a client with a full raw authorization value.
    pub fn new_raw_auth(base_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self::with_transport(HttpTransport::new(base_url, authorization))
    }

    /// Creates a client for `https://mastodon.social/api/v1`.
    pub fn from_token(token: impl AsRef<str>) -> Self {
        Self::new(DEFAULT_BASE_URL, token)
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `MASTODON_ACCESS_TOKEN` (or `ACCESS_TOKEN`) — access token, required
    /// - `MASTODON_BASE_URL` — API root, defaults to `https://mastodon.social/api/v1`
    ///
    /// Returns an error if the token is missing or empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mastodon_status_http::MastodonClient;
    ///
    /// let client = MastodonClient::from_env().expect("missing MASTODON_ACCESS_TOKEN");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let token = std::env::var("MASTODON_ACCESS_TOKEN")
            .or_else(|_| std::env::var("ACCESS_TOKEN"))
            .map_err(|_| "missing MASTODON_ACCESS_TOKEN environment variable".to_owned())?;
        if token.trim().is_empty() {
            return Err("MASTODON_ACCESS_TOKEN is set but empty".to_owned());
        }
        let base_url = match std::env::var("MASTODON_BASE_URL") {
            Ok(url) if url.trim().is_empty() => {
                return Err("MASTODON_BASE_URL is set but empty".to_owned())
            }
            Ok(url) => url,
            Err(_) => DEFAULT_BASE_URL.to_owned(),
        };
        Ok(Self::new(base_url, token))
    }
}

impl<T: Transport> MastodonClient<T, TokioSleeper> {
    /// Creates a client over a custom transport with default options.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            sleeper: TokioSleeper,
            options: ClientOptions::default(),
        }
    }
}

impl<T, S> MastodonClient<T, S> {
    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Replaces the wait step used between attempts.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> MastodonClient<T, S2> {
        MastodonClient {
            transport: self.transport,
            sleeper,
            options: self.options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

impl<T: Transport, S: Sleeper> MastodonClient<T, S> {
    /// Publishes a new status and returns it as stored by the service.
    pub async fn create(&self, text: &str) -> Result<Post> {
        validate_status_text(text)?;
        let body = self
            .run(Operation::Create {
                status: text.to_owned(),
            })
            .await?;
        decode_post(&body)
    }

    /// Fetches a status by id.
    pub async fn retrieve(&self, post_id: &str) -> Result<Post> {
        validate_post_id(post_id)?;
        let body = self
            .run(Operation::Retrieve {
                id: post_id.to_owned(),
            })
            .await?;
        decode_post(&body)
    }

    /// Deletes a status by id.
    ///
    /// Returns `Ok(true)` once the service confirms; every failure is an `Err`,
    /// so `Ok(false)` is never produced.
    pub async fn delete(&self, post_id: &str) -> Result<bool> {
        validate_post_id(post_id)?;
        self.run(Operation::Delete {
            id: post_id.to_owned(),
        })
        .await?;
        Ok(true)
    }

    async fn run(&self, operation: Operation) -> Result<String> {
        RetryCoordinator {
            transport: &self.transport,
            sleeper: &self.sleeper,
            options: &self.options,
        }
        .run(&operation)
        .await
    }
}

fn decode_post(body: &str) -> Result<Post> {
    serde_json::from_str::<Post>(body).map_err(|err| {
        MastodonError::Decode(format!("invalid status JSON: {err}; body: {body}"))
    })
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
