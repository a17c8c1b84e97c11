//! Typed HTTP fetch core: retry, timeout and response validation.
//!
//! # Overview
//! A caller describes one logical request with a `RequestDescriptor` and
//! hands it to an `Executor`. The executor encodes the body, performs up to
//! `max_retries + 1` physical attempts through a `Transport`, each raced
//! against a deadline, and returns an `Outcome`: the decoded (and optionally
//! validated) body, or a `FetchError` classified by `FailureKind`.
//!
//! # Design
//! - Networking sits behind the `Transport` trait; `ReqwestTransport` is the
//!   stock implementation and tests substitute scripted ones.
//! - Timeout (`timeout`) and retry (`retry`) are separate layers: retry
//!   repeats an attempt that is already wrapped in its deadline.
//! - Validation is a capability (`Validator`), independent of any schema
//!   library.
//! - No state is shared between calls.

pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod http;
pub mod query;
pub mod retry;
pub mod timeout;
pub mod transport;
pub mod validate;

pub use client::Client;
pub use config::{ConfigError, FetchConfig};
pub use descriptor::RequestDescriptor;
pub use error::{FailureKind, FetchError, Outcome, TransportError};
pub use executor::{ErrorObserver, Executor};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use query::{append_query, QueryParams, QueryValue};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport};
pub use validate::{Schema, Typed, Unvalidated, Validator};

pub use tokio_util::sync::CancellationToken;
