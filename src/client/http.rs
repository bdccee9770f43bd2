// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! HTTP plumbing between the driver and the engine.
//!
//! The transport never talks to the network directly. It builds a complete
//! [`HttpRequest`] for every call and hands it to an [`HttpBackend`]. The
//! production backend is [`ReqwestBackend`]; tests substitute
//! [`ScriptedBackend`](super::ScriptedBackend).

use crate::error::{Result, TrinoErrorHelper};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::trace;

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("trino-driver-rust/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A fully specified outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut request = Self::new(HttpMethod::Post, url);
        request.body = Some(body.into());
        request
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    /// Adds a header, replacing any existing header with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response. Header names are lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Builds a response whose body is `value` serialised as JSON.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserialises the body.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Executes requests on behalf of a connection.
pub trait HttpBackend: Send + Debug {
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse>;

    /// Drops any pooled connections. The next request reconnects.
    fn close(&mut self) {}
}

/// [`HttpBackend`] on a blocking `reqwest` client.
///
/// The client is built on first use and kept for the lifetime of the
/// connection so TLS sessions and sockets are reused.
#[derive(Debug)]
pub struct ReqwestBackend {
    config: HttpClientConfig,
    client: Option<reqwest::blocking::Client>,
}

impl ReqwestBackend {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Whether a client is currently built.
    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn client(&mut self) -> Result<&reqwest::blocking::Client> {
        if self.client.is_none() {
            let client = reqwest::blocking::Client::builder()
                .timeout(self.config.timeout)
                .user_agent(self.config.user_agent.clone())
                .gzip(true)
                .deflate(true)
                .build()
                .map_err(|e| {
                    TrinoErrorHelper::io()
                        .message(e.to_string())
                        .context("create HTTP client")
                })?;
            self.client = Some(client);
        }
        self.client.as_ref().ok_or_else(|| {
            TrinoErrorHelper::internal()
                .message("HTTP client missing after creation")
                .context("create HTTP client")
        })
    }
}

impl Default for ReqwestBackend {
    fn default() -> Self {
        Self::new(HttpClientConfig::default())
    }
}

impl HttpBackend for ReqwestBackend {
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let client = self.client()?;
        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        trace!(method = request.method.as_str(), url = %request.url, "sending request");
        let response = builder.send().map_err(|e| {
            TrinoErrorHelper::io()
                .message(e.to_string())
                .context(format!("{} {}", request.method.as_str(), request.url))
        })?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text()?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn close(&mut self) {
        self.client = None;
    }
}
