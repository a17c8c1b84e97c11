//! Base-URL client with per-method convenience wrappers.
//!
//! # Design
//! `Client` holds a base URL, headers sent with every request, and an
//! `Executor`. The per-method wrappers only fix the method, resolve the
//! path against the base URL and attach the body where the method carries
//! one; everything else is `Executor::execute` / `execute_validated`.

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::error::Outcome;
use crate::executor::Executor;
use crate::http::{Headers, HttpMethod};
use crate::query::{append_query, QueryParams};
use crate::transport::Transport;
use crate::validate::Validator;

#[derive(Debug, Clone)]
pub struct Client<T> {
    base_url: String,
    headers: Headers,
    executor: Executor<T>,
}

impl<T: Transport> Client<T> {
    pub fn new(base_url: &str, executor: Executor<T>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: Headers::new(),
            executor,
        }
    }

    /// Add a header sent with every request built by this client.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }

    /// Resolve `path` against the base URL and append `query`.
    /// Absolute `http(s)://` paths are used as-is.
    pub fn endpoint(&self, path: &str, query: &QueryParams) -> String {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        append_query(&url, query)
    }

    /// Descriptor for `method` on `path` carrying the client's default headers.
    pub fn build(&self, method: HttpMethod, path: &str, query: &QueryParams) -> RequestDescriptor {
        let mut descriptor = RequestDescriptor::new(method, self.endpoint(path, query));
        descriptor.headers = self.headers.clone();
        descriptor
    }

    pub async fn send<B: Serialize>(&self, descriptor: RequestDescriptor<B>) -> Outcome<Value> {
        self.executor.execute(descriptor).await
    }

    pub async fn send_as<B, V>(&self, descriptor: RequestDescriptor<B>, validator: &V) -> Outcome<V::Output>
    where
        B: Serialize,
        V: Validator,
    {
        self.executor.execute_validated(descriptor, validator).await
    }

    pub async fn get(&self, path: &str, query: &QueryParams) -> Outcome<Value> {
        self.send(self.build(HttpMethod::Get, path, query)).await
    }

    pub async fn get_as<V: Validator>(&self, path: &str, query: &QueryParams, validator: &V) -> Outcome<V::Output> {
        self.send_as(self.build(HttpMethod::Get, path, query), validator).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: B) -> Outcome<Value> {
        self.send(self.with_body(HttpMethod::Post, path, body)).await
    }

    pub async fn post_as<B, V>(&self, path: &str, body: B, validator: &V) -> Outcome<V::Output>
    where
        B: Serialize,
        V: Validator,
    {
        self.send_as(self.with_body(HttpMethod::Post, path, body), validator).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: B) -> Outcome<Value> {
        self.send(self.with_body(HttpMethod::Put, path, body)).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: B) -> Outcome<Value> {
        self.send(self.with_body(HttpMethod::Patch, path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Outcome<Value> {
        self.send(self.build(HttpMethod::Delete, path, &QueryParams::new())).await
    }

    pub async fn head(&self, path: &str) -> Outcome<Value> {
        self.send(self.build(HttpMethod::Head, path, &QueryParams::new())).await
    }

    pub async fn options(&self, path: &str) -> Outcome<Value> {
        self.send(self.build(HttpMethod::Options, path, &QueryParams::new())).await
    }

    fn with_body<B: Serialize>(&self, method: HttpMethod, path: &str, body: B) -> RequestDescriptor<B> {
        self.build(method, path, &QueryParams::new()).json(body)
    }
}
