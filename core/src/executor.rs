//! The request executor: one logical request from descriptor to outcome.
//!
//! # Design
//! `execute_validated` composes three independent pieces:
//! - `round_trip` performs one physical attempt and classifies its result
//!   (transport error, non-2xx status, undecodable body, rejected body);
//! - `timeout::with_timeout` races that attempt against the deadline;
//! - `retry::retry` repeats the timed attempt with exponential backoff.
//!
//! The body is encoded once, before the first attempt. An encoding failure
//! is returned immediately without retrying. The executor holds no mutable
//! state, so one instance can serve any number of concurrent calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::{FailureKind, FetchError, Outcome};
use crate::http::{HttpMethod, HttpRequest};
use crate::retry::{retry, RetryPolicy};
use crate::timeout::with_timeout;
use crate::transport::Transport;
use crate::validate::{Unvalidated, Validator};

/// Longest prefix of an undecodable body kept in the failure payload.
const DECODE_SNIPPET_CHARS: usize = 200;

/// Callback invoked with each failure as it is classified.
pub type ErrorObserver = Arc<dyn Fn(&FetchError) + Send + Sync>;

#[derive(Clone)]
pub struct Executor<T> {
    transport: T,
    config: FetchConfig,
    on_error: Option<ErrorObserver>,
}

impl<T> fmt::Debug for Executor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Executor<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, FetchConfig::default())
    }

    pub fn with_config(transport: T, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            on_error: None,
        }
    }

    /// Register an error observer. Its return value is ignored and it cannot
    /// change the outcome.
    ///
    /// Status and validation failures are reported on every attempt that
    /// produces them. Every other kind is reported once, when the request
    /// finally fails.
    pub fn on_error(mut self, observer: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Execute without a validator; success carries the decoded JSON body.
    pub async fn execute<B: Serialize>(&self, descriptor: RequestDescriptor<B>) -> Outcome<Value> {
        self.execute_validated(descriptor, &Unvalidated).await
    }

    /// Execute and run `validator` over the decoded body of a 2xx response.
    pub async fn execute_validated<B, V>(&self, descriptor: RequestDescriptor<B>, validator: &V) -> Outcome<V::Output>
    where
        B: Serialize,
        V: Validator,
    {
        let RequestDescriptor {
            url,
            method,
            mut headers,
            body,
            timeout,
            max_retries,
            retry_delay,
            cancel,
        } = descriptor;

        let timeout = timeout.unwrap_or(self.config.timeout);
        let mut policy = RetryPolicy::from_config(&self.config);
        if let Some(max_retries) = max_retries {
            policy.max_retries = max_retries;
        }
        if let Some(delay) = retry_delay {
            policy.base_delay = delay;
        }

        let body = match encode_body(method, body, &url) {
            Ok(body) => body,
            Err(err) => return Err(self.finish(err)),
        };
        if body.is_some() {
            headers.insert_default("content-type", "application/json");
        }
        headers.insert_default("accept", "application/json");

        let request = HttpRequest {
            method,
            url,
            headers,
            body,
        };
        let cancel = cancel.as_ref();
        let outcome = retry(&policy, cancel, |attempt| {
            self.timed_attempt(&request, timeout, cancel, validator, attempt)
        })
        .await;

        outcome.map_err(|err| self.finish(err))
    }

    async fn timed_attempt<V: Validator>(
        &self,
        request: &HttpRequest,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
        validator: &V,
        attempt: u32,
    ) -> Outcome<V::Output> {
        debug!(method = %request.method, url = %request.url, attempt, "sending request");
        let timed = with_timeout(timeout, &request.url, attempt, self.round_trip(request, validator, attempt));
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(FetchError::new(
                        FailureKind::Cancelled,
                        "request cancelled",
                        request.url.as_str(),
                        attempt,
                    )),
                    outcome = timed => outcome,
                }
            }
            None => timed.await,
        }
    }

    async fn round_trip<V: Validator>(&self, request: &HttpRequest, validator: &V, attempt: u32) -> Outcome<V::Output> {
        let url = request.url.as_str();
        let response = self
            .transport
            .send(request.clone())
            .await
            .map_err(|e| FetchError::new(FailureKind::Transport, e.message, url, attempt))?;
        let status = response.status;

        if !response.is_success() {
            let err = FetchError::new(
                FailureKind::HttpStatus,
                format!("request failed with status {status}"),
                url,
                attempt,
            )
            .with_status(status)
            .with_payload(serde_json::from_str(&response.body).ok());
            self.observe(&err);
            return Err(err);
        }

        let value = decode_body(&response.body).map_err(|e| {
            FetchError::new(
                FailureKind::Decode,
                format!("failed to decode response body: {e}"),
                url,
                attempt,
            )
            .with_status(status)
            .with_payload(Some(Value::String(snippet(&response.body))))
        })?;

        match validator.parse(&value) {
            Ok(output) => {
                debug!(url, status, attempt, "request succeeded");
                Ok(output)
            }
            Err(problems) => {
                let err = FetchError::new(FailureKind::Validation, problems, url, attempt)
                    .with_status(status)
                    .with_payload(Some(value));
                self.observe(&err);
                Err(err)
            }
        }
    }

    /// Final boundary: report kinds that were not reported when classified.
    fn finish(&self, err: FetchError) -> FetchError {
        if !err.kind.observed_on_attempt() {
            self.observe(&err);
        }
        warn!(url = %err.url, attempt = err.attempt, kind = %err.kind, "request failed: {}", err.message);
        err
    }

    fn observe(&self, err: &FetchError) {
        if let Some(observer) = &self.on_error {
            observer(err);
        }
    }
}

fn encode_body<B: Serialize>(method: HttpMethod, body: Option<B>, url: &str) -> Outcome<Option<String>> {
    match body {
        None => Ok(None),
        Some(_) if !method.carries_body() => {
            warn!(%method, url, "ignoring request body on a method that does not send one");
            Ok(None)
        }
        Some(body) => serde_json::to_string(&body).map(Some).map_err(|e| {
            FetchError::new(
                FailureKind::Serialization,
                format!("failed to serialize request body: {e}"),
                url,
                1,
            )
        }),
    }
}

/// Empty bodies (HEAD, 204) decode to `null`.
fn decode_body(body: &str) -> Result<Value, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
}

fn snippet(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(DECODE_SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
