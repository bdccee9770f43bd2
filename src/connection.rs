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


//! Connection implementation for the Trino driver.

use crate::auth::AuthProvider;
use crate::client::{HttpBackend, Transport};
use crate::database::DriverConfig;
use crate::error::{Result, TrinoErrorHelper};
use crate::statement::Statement;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Represents an active connection to a Trino coordinator.
///
/// A Connection is created from a Database and is used to create Statements
/// for executing SQL queries. Statements share the connection's transport;
/// disconnecting terminates any query still running on it.
#[derive(Debug)]
pub struct Connection {
    config: DriverConfig,
    transport: Arc<Mutex<Transport>>,
    connected: bool,
}

impl Connection {
    pub(crate) fn new(
        config: DriverConfig,
        auth: Box<dyn AuthProvider>,
        backend: Box<dyn HttpBackend>,
    ) -> Self {
        let transport = Transport::new(config.hostname.clone(), config.port, auth, backend);
        Self {
            config,
            transport: Arc::new(Mutex::new(transport)),
            connected: true,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Returns the configured hostname.
    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    /// Returns the configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn transport(&self) -> Arc<Mutex<Transport>> {
        Arc::clone(&self.transport)
    }

    pub fn new_statement(&self) -> Result<Statement> {
        if !self.connected {
            return Err(TrinoErrorHelper::invalid_state()
                .message("connection is closed")
                .context("create statement"));
        }
        Ok(Statement::new(Arc::clone(&self.transport)))
    }

    /// Engine version reported by `/v1/info`.
    pub fn server_version(&self) -> Result<String> {
        self.transport.lock().server_version()
    }

    /// Terminates running queries and releases the HTTP client.
    ///
    /// Calling this more than once is harmless.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        debug!(host = %self.config.hostname, "closing connection");
        self.transport.lock().disconnect();
        self.connected = false;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::client::{HttpMethod, ScriptedBackend};
    use serde_json::json;

    fn connection(backend: &ScriptedBackend) -> Connection {
        Connection::new(
            DriverConfig::default(),
            Box::new(NoAuth::new("odbc")),
            Box::new(backend.clone()),
        )
    }

    #[test]
    fn test_connection_accessors() {
        let conn = connection(&ScriptedBackend::new());
        assert_eq!(conn.hostname(), "localhost");
        assert_eq!(conn.port(), 8080);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_server_version() {
        let backend = ScriptedBackend::new();
        backend.push_json(
            200,
            json!({"nodeVersion": {"version": "435"}, "environment": "test", "starting": false}),
        );
        let conn = connection(&backend);
        assert_eq!(conn.server_version().unwrap(), "435");
        assert!(backend.requests()[0].url.ends_with("/v1/info"));
    }

    #[test]
    fn test_disconnect_terminates_running_query() {
        let backend = ScriptedBackend::new();
        let mut conn = connection(&backend);
        let mut statement = conn.new_statement().unwrap();

        backend.push_json(
            200,
            json!({"id": "q1", "nextUri": "http://localhost:8080/v1/statement/q1/1", "stats": {"state": "QUEUED"}}),
        );
        statement.query_mut().set_query("SELECT 1");
        statement.query_mut().post().unwrap();

        backend.push_json(204, json!({}));
        conn.disconnect();
        conn.disconnect();

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, HttpMethod::Delete);
        assert_eq!(backend.close_count(), 1);
        assert!(statement.query().is_completed());
        assert!(conn.new_statement().is_err());
    }
}
