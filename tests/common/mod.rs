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


//! Replaying HTTP backend shared by the integration tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use trino_driver::client::{HttpBackend, HttpRequest, HttpResponse};
use trino_driver::{Result, TrinoErrorHelper};

#[derive(Debug, Default)]
struct Log {
    responses: VecDeque<HttpResponse>,
    requests: Vec<HttpRequest>,
    closes: usize,
}

/// Answers requests from a queue. Clones share the queue and the request log.
#[derive(Debug, Clone, Default)]
pub struct ReplayBackend {
    log: Arc<Mutex<Log>>,
}

impl ReplayBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.log.lock().responses.push_back(HttpResponse::json(status, &body));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().requests.len()
    }

    pub fn close_count(&self) -> usize {
        self.log.lock().closes
    }
}

impl HttpBackend for ReplayBackend {
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut log = self.log.lock();
        log.requests.push(request.clone());
        log.responses.pop_front().ok_or_else(|| {
            TrinoErrorHelper::io()
                .message(format!("no response queued for {}", request.url))
                .context("replay request")
        })
    }

    fn close(&mut self) {
        self.log.lock().closes += 1;
    }
}
