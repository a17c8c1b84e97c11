//! Request descriptors: everything one logical request needs.
//!
//! # Design
//! A descriptor is built by the caller, consumed once by
//! `Executor::execute`, and dropped. The body stays typed (`B: Serialize`)
//! until the executor encodes it, so an unencodable payload surfaces as a
//! serialization failure instead of a panic at construction time. Policy
//! fields left as `None` fall back to the executor's `FetchConfig`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::http::{Headers, HttpMethod};
use crate::query::{append_query, QueryParams};

#[derive(Debug, Clone)]
pub struct RequestDescriptor<B = Value> {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Headers,
    pub body: Option<B>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestDescriptor<Value> {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Headers::new(),
            body: None,
            timeout: None,
            max_retries: None,
            retry_delay: None,
            cancel: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn options(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Options, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    pub fn post<B: Serialize>(url: impl Into<String>, body: B) -> RequestDescriptor<B> {
        Self::new(HttpMethod::Post, url).json(body)
    }

    pub fn put<B: Serialize>(url: impl Into<String>, body: B) -> RequestDescriptor<B> {
        Self::new(HttpMethod::Put, url).json(body)
    }

    pub fn patch<B: Serialize>(url: impl Into<String>, body: B) -> RequestDescriptor<B> {
        Self::new(HttpMethod::Patch, url).json(body)
    }
}

impl<B> RequestDescriptor<B> {
    /// Attach a JSON body, replacing any previous one.
    pub fn json<B2: Serialize>(self, body: B2) -> RequestDescriptor<B2> {
        RequestDescriptor {
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: Some(body),
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            cancel: self.cancel,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, params: &QueryParams) -> Self {
        self.url = append_query(&self.url, params);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_has_no_body_and_no_policy_overrides() {
        let desc = RequestDescriptor::get("https://x/ok");
        assert_eq!(desc.method, HttpMethod::Get);
        assert_eq!(desc.url, "https://x/ok");
        assert!(desc.body.is_none());
        assert!(desc.timeout.is_none() && desc.max_retries.is_none() && desc.retry_delay.is_none());
    }

    #[test]
    fn write_constructors_fix_method_and_body() {
        let desc = RequestDescriptor::patch("https://x/item", json!({"done": true}));
        assert_eq!(desc.method, HttpMethod::Patch);
        assert_eq!(desc.body, Some(json!({"done": true})));

        let desc = RequestDescriptor::put("https://x/item", vec![1, 2]);
        assert_eq!(desc.method, HttpMethod::Put);
        assert_eq!(desc.body, Some(vec![1, 2]));
    }

    #[test]
    fn builders_set_policy_and_query() {
        let desc = RequestDescriptor::get("https://x/search")
            .query(&QueryParams::new().with("q", "rust").with("page", None::<u32>))
            .header("Accept", "application/json")
            .timeout(Duration::from_millis(50))
            .max_retries(2)
            .retry_delay(Duration::from_millis(5));
        assert_eq!(desc.url, "https://x/search?q=rust");
        assert_eq!(desc.headers.get("accept"), Some("application/json"));
        assert_eq!(desc.timeout, Some(Duration::from_millis(50)));
        assert_eq!(desc.max_retries, Some(2));
        assert_eq!(desc.retry_delay, Some(Duration::from_millis(5)));
    }
}
