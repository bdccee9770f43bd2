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


//! Per-connection transport.
//!
//! A [`Transport`] owns the connection's HTTP backend and auth provider.
//! Every request passes through [`Transport::send`], which refreshes the
//! credential when it has expired, attaches the provider's headers, and
//! records the response.
//!
//! Queries share the transport as `Arc<Mutex<Transport>>` and subscribe to
//! disconnect so they can stop server-side work before the connection goes
//! away.

use super::http::{HttpBackend, HttpRequest, HttpResponse};
use crate::auth::AuthProvider;
use crate::error::{Result, TrinoErrorHelper};
use crate::types::ServerInfo;
use std::fmt;
use tracing::{debug, info};

/// Handle returned by [`Transport::subscribe_disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type DisconnectCallback = Box<dyn FnMut(&mut Transport) + Send>;

pub struct Transport {
    hostname: String,
    port: u16,
    auth: Box<dyn AuthProvider>,
    backend: Box<dyn HttpBackend>,
    last_response: Option<HttpResponse>,
    subscribers: Vec<(SubscriptionId, DisconnectCallback)>,
    next_subscription: u64,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("auth", &self.auth)
            .field("backend", &self.backend)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Transport {
    pub fn new(
        hostname: impl Into<String>,
        port: u16,
        auth: Box<dyn AuthProvider>,
        backend: Box<dyn HttpBackend>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            auth,
            backend,
            last_response: None,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `{hostname}:{port}`; the hostname carries the scheme.
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn statement_url(&self) -> String {
        format!("{}/v1/statement", self.base_url())
    }

    pub fn auth(&self) -> &dyn AuthProvider {
        self.auth.as_ref()
    }

    /// The most recent response received on this connection.
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.last_response.as_ref()
    }

    /// Sends `request`, refreshing the credential first if it has expired.
    pub fn send(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        if self.auth.is_expired() {
            debug!("credential expired, refreshing");
            self.auth.refresh(self.backend.as_mut())?;
        }
        let mut request = request;
        for (name, value) in self.auth.headers() {
            request = request.header(name, value);
        }
        let response = self.backend.execute(&request)?;
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            status = response.status,
            "request completed"
        );
        self.last_response = Some(response.clone());
        Ok(response)
    }

    /// Queries `/v1/info` for the engine version.
    pub fn server_version(&mut self) -> Result<String> {
        let url = format!("{}/v1/info", self.base_url());
        let response = self.send(HttpRequest::get(url))?;
        if response.status != 200 {
            return Err(TrinoErrorHelper::io()
                .message(format!("HTTP {}", response.status))
                .context("read server info"));
        }
        let info: ServerInfo = response.parse_json()?;
        Ok(info.node_version.version)
    }

    /// Registers `callback` to run when the connection disconnects.
    pub fn subscribe_disconnect(
        &mut self,
        callback: impl FnMut(&mut Transport) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a disconnect subscription. Returns whether it existed.
    pub fn unsubscribe_disconnect(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Notifies subscribers, then releases the HTTP client.
    ///
    /// Subscriptions stay registered; a later disconnect notifies them again.
    pub fn disconnect(&mut self) {
        info!(host = %self.hostname, subscribers = self.subscribers.len(), "disconnecting");
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for (_, callback) in subscribers.iter_mut() {
            callback(self);
        }
        // Callbacks may have subscribed while running.
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
        self.backend.close();
        self.last_response = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::client::ScriptedBackend;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn transport(backend: &ScriptedBackend) -> Transport {
        Transport::new(
            "http://localhost",
            8080,
            Box::new(NoAuth::new("tester")),
            Box::new(backend.clone()),
        )
    }

    #[test]
    fn test_urls() {
        let t = transport(&ScriptedBackend::new());
        assert_eq!(t.statement_url(), "http://localhost:8080/v1/statement");
    }

    #[test]
    fn test_send_applies_auth_headers() {
        let backend = ScriptedBackend::new();
        backend.push(HttpResponse::new(200, "ok"));
        let mut t = transport(&backend);
        t.send(HttpRequest::get("http://localhost:8080/x")).unwrap();
        let request = &backend.requests()[0];
        assert_eq!(request.header_value("X-Trino-User"), Some("tester"));
        assert_eq!(request.header_value("X-Trino-Source"), Some("TrinoODBCDriver"));
        assert_eq!(t.last_response().unwrap().body, "ok");
    }

    #[test]
    fn test_server_version() {
        let backend = ScriptedBackend::new();
        backend.push_json(200, json!({"nodeVersion": {"version": "443"}}));
        let mut t = transport(&backend);
        assert_eq!(t.server_version().unwrap(), "443");
        assert_eq!(backend.requests()[0].url, "http://localhost:8080/v1/info");
    }

    #[test]
    fn test_disconnect_notifies_subscribers() {
        let backend = ScriptedBackend::new();
        backend.push(HttpResponse::new(204, ""));
        let mut t = transport(&backend);
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let id = t.subscribe_disconnect(move |transport| {
            *counter.lock() += 1;
            transport
                .send(HttpRequest::delete("http://localhost:8080/v1/statement/q/1"))
                .unwrap();
        });
        t.disconnect();
        assert_eq!(*calls.lock(), 1);
        assert_eq!(backend.close_count(), 1);
        assert_eq!(backend.request_count(), 1);

        assert!(t.unsubscribe_disconnect(id));
        assert!(!t.unsubscribe_disconnect(id));
        t.disconnect();
        assert_eq!(*calls.lock(), 1);
    }
}
