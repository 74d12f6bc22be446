//! Bounded retry loop around [`Transport`].
//!
//! Only rate limiting and network faults are retried. Every other outcome is
//! returned from the attempt that produced it.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    transport::{classify, Operation, Outcome, RetryReason, Transport},
    ClientOptions, MastodonError, Result,
};

/// Wait step between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// State of one operation invocation.
#[derive(Debug, Default)]
struct RetryContext {
    attempt: usize,
    waited: Duration,
    last_failure: Option<RetryReason>,
}

impl RetryContext {
    /// Error reported once no attempt is left.
    fn into_exhausted_error(self) -> MastodonError {
        match self.last_failure {
            Some(RetryReason::RateLimited) => MastodonError::RateLimited {
                attempts: self.attempt,
                waited: self.waited,
            },
            Some(RetryReason::Network(message)) => MastodonError::Transport(message),
            None => MastodonError::RetriesExhausted,
        }
    }
}

pub(crate) struct RetryCoordinator<'a, T, S> {
    pub(crate) transport: &'a T,
    pub(crate) sleeper: &'a S,
    pub(crate) options: &'a ClientOptions,
}

impl<T: Transport, S: Sleeper> RetryCoordinator<'_, T, S> {
    /// Runs `operation` until it succeeds, fails terminally or the attempt
    /// budget is spent. Returns the success body.
    pub(crate) async fn run(&self, operation: &Operation) -> Result<String> {
        let request = operation.to_request(self.options.timeout());
        let max_attempts = self.options.max_attempts;
        let mut ctx = RetryContext::default();

        while ctx.attempt < max_attempts {
            ctx.attempt += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %request.method,
                segments = ?request.segments,
                attempt = ctx.attempt,
                "sending request"
            );

            let result = self.transport.send(&request).await;
            let (reason, retry_after) = match classify(operation, result) {
                Outcome::Success(body) => return Ok(body),
                Outcome::Terminal(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt = ctx.attempt, error = %err, "terminal failure");
                    return Err(err);
                }
                Outcome::Retryable {
                    reason,
                    retry_after,
                } => (reason, retry_after),
            };

            ctx.last_failure = Some(reason);
            if ctx.attempt == max_attempts {
                break;
            }

            let delay = retry_after.unwrap_or_else(|| self.options.retry_delay());

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = ctx.attempt,
                reason = ?ctx.last_failure,
                "retrying request after {} ms",
                delay.as_millis()
            );

            self.sleeper.sleep(delay).await;
            // Retry-After is server controlled and may be near u64::MAX seconds.
            ctx.waited = ctx.waited.saturating_add(delay);
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            attempts = ctx.attempt,
            waited_ms = ctx.waited.as_millis() as u64,
            last_failure = ?ctx.last_failure,
            "retry budget exhausted"
        );

        Err(ctx.into_exhausted_error())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;

    use super::{RetryCoordinator, Sleeper};
    use crate::{
        transport::{ApiRequest, NetworkFault, Operation, RawResponse, Transport},
        ClientOptions, MastodonError,
    };

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<RawResponse, NetworkFault>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<RawResponse, NetworkFault>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<RawResponse, NetworkFault> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Ok(RawResponse::new(500, "script exhausted")))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSleeper {
        waits: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        fn waits(&self) -> Vec<Duration> {
            self.waits.lock().expect("waits lock").clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().expect("waits lock").push(duration);
        }
    }

    fn retrieve() -> Operation {
        Operation::Retrieve {
            id: "123456".to_owned(),
        }
    }

    fn rate_limited() -> Result<RawResponse, NetworkFault> {
        Ok(RawResponse::new(429, "Rate limit exceeded"))
    }

    async fn run(
        transport: &ScriptedTransport,
        sleeper: &RecordingSleeper,
        options: &ClientOptions,
    ) -> crate::Result<String> {
        RetryCoordinator {
            transport,
            sleeper,
            options,
        }
        .run(&retrieve())
        .await
    }

    #[tokio::test]
    async fn success_on_first_attempt_runs_once() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(200, "ok"))]);
        let sleeper = RecordingSleeper::default();

        let body = run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect("must succeed");

        assert_eq!(body, "ok");
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_waits() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(429, "").with_retry_after("5")),
            rate_limited(),
            Ok(RawResponse::new(200, "ok")),
        ]);
        let sleeper = RecordingSleeper::default();

        run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect("third attempt must succeed");

        assert_eq!(transport.calls(), 3);
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_secs(5), Duration::from_secs(60)]
        );
    }

    #[tokio::test]
    async fn persistent_rate_limit_exhausts_budget() {
        let transport =
            ScriptedTransport::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let sleeper = RecordingSleeper::default();

        let err = run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect_err("must fail");

        match err {
            MastodonError::RateLimited { attempts, waited } => {
                assert_eq!(attempts, 3);
                assert_eq!(waited, Duration::from_secs(120));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert_eq!(transport.calls(), 3);
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[tokio::test]
    async fn huge_retry_after_hints_saturate_wait_total() {
        let huge = || Ok(RawResponse::new(429, "").with_retry_after(u64::MAX.to_string()));
        let transport = ScriptedTransport::new(vec![huge(), huge(), huge()]);
        let sleeper = RecordingSleeper::default();

        let err = run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect_err("must fail");

        match err {
            MastodonError::RateLimited { attempts, waited } => {
                assert_eq!(attempts, 3);
                assert_eq!(waited, Duration::MAX);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(u64::MAX); 2]);
    }

    #[tokio::test]
    async fn non_numeric_hint_falls_back_to_base_delay() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(429, "").with_retry_after("soon")),
            Ok(RawResponse::new(200, "ok")),
        ]);
        let sleeper = RecordingSleeper::default();
        let options = ClientOptions {
            retry_delay_ms: 1_500,
            ..ClientOptions::default()
        };

        run(&transport, &sleeper, &options)
            .await
            .expect("must succeed");

        assert_eq!(sleeper.waits(), vec![Duration::from_millis(1_500)]);
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(404, "{}"))]);
        let sleeper = RecordingSleeper::default();

        let err = run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect_err("must fail");

        assert!(matches!(err, MastodonError::InvalidInput(_)));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_fails_without_retry() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(401, ""))]);
        let sleeper = RecordingSleeper::default();

        let err = run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect_err("must fail");

        assert!(matches!(err, MastodonError::Unauthorized));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn network_fault_recovers_after_base_delay() {
        let transport = ScriptedTransport::new(vec![
            Err(NetworkFault("connection failed: refused".to_owned())),
            Ok(RawResponse::new(200, "ok")),
        ]);
        let sleeper = RecordingSleeper::default();

        run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect("must succeed");

        assert_eq!(transport.calls(), 2);
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn persistent_network_fault_surfaces_transport_error() {
        let fault = || Err(NetworkFault("timed out: deadline".to_owned()));
        let transport = ScriptedTransport::new(vec![fault(), fault(), fault()]);
        let sleeper = RecordingSleeper::default();

        let err = run(&transport, &sleeper, &ClientOptions::default())
            .await
            .expect_err("must fail");

        match err {
            MastodonError::Transport(message) => assert!(message.contains("timed out")),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[tokio::test]
    async fn zero_attempt_budget_reports_exhaustion() {
        let transport = ScriptedTransport::new(vec![]);
        let sleeper = RecordingSleeper::default();
        let options = ClientOptions {
            max_attempts: 0,
            ..ClientOptions::default()
        };

        let err = run(&transport, &sleeper, &options)
            .await
            .expect_err("must fail");

        assert!(matches!(err, MastodonError::RetriesExhausted));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn requests_carry_configured_timeout() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(200, "ok"))]);
        let sleeper = RecordingSleeper::default();
        let options = ClientOptions {
            timeout_ms: 2_500,
            ..ClientOptions::default()
        };

        run(&transport, &sleeper, &options)
            .await
            .expect("must succeed");

        let requests = transport.requests.lock().expect("requests lock");
        assert_eq!(requests[0].timeout, Duration::from_millis(2_500));
    }
}
