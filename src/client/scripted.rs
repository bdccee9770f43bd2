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


//! An [`HttpBackend`] that replays canned responses.
//!
//! Useful for exercising the driver without a live engine. Clones share
//! the same script and request log, so a test can keep one handle while
//! the connection owns another.

use super::http::{HttpBackend, HttpRequest, HttpResponse};
use crate::error::{Error, Result, TrinoErrorHelper};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Result<HttpResponse>>,
    requests: Vec<HttpRequest>,
    closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push(&self, response: HttpResponse) -> &Self {
        self.script.lock().responses.push_back(Ok(response));
        self
    }

    /// Queues a JSON response.
    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(HttpResponse::json(status, &body))
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: Error) -> &Self {
        self.script.lock().responses.push_back(Err(error));
        self
    }

    /// Every request executed so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().requests.len()
    }

    /// Responses queued but not yet consumed.
    pub fn pending(&self) -> usize {
        self.script.lock().responses.len()
    }

    /// Number of times the backend was closed.
    pub fn close_count(&self) -> usize {
        self.script.lock().closes
    }
}

impl HttpBackend for ScriptedBackend {
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut script = self.script.lock();
        script.requests.push(request.clone());
        script.responses.pop_front().unwrap_or_else(|| {
            Err(TrinoErrorHelper::io()
                .message(format!("no scripted response for {}", request.url))
                .context(format!("{} {}", request.method.as_str(), request.url)))
        })
    }

    fn close(&mut self) {
        self.script.lock().closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::http::HttpMethod;

    #[test]
    fn test_replays_in_order() {
        let backend = ScriptedBackend::new();
        backend.push(HttpResponse::new(200, "one"));
        backend.push_json(404, serde_json::json!({"two": 2}));

        let mut handle = backend.clone();
        assert_eq!(handle.execute(&HttpRequest::get("a")).unwrap().body, "one");
        assert_eq!(handle.execute(&HttpRequest::delete("b")).unwrap().status, 404);
        assert!(handle.execute(&HttpRequest::get("c")).is_err());

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].method, HttpMethod::Delete);
        assert_eq!(backend.pending(), 0);
    }
}
