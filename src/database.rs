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


//! Database configuration for the Trino driver.
//!
//! A [`Database`] holds a [`DriverConfig`] built from key/value options,
//! either one at a time with [`Database::set_option`] or from a
//! `key=value;key=value` connection string. Keys are case-insensitive.
//!
//! | Key                     | Meaning                                            | Default     |
//! |-------------------------|----------------------------------------------------|-------------|
//! | `dsn`                   | Connection name, part of the token cache identity  | empty       |
//! | `hostname`              | Engine URL including scheme                        | `localhost` |
//! | `port`                  | Engine port                                        | `8080`      |
//! | `user`                  | `X-Trino-User` for unauthenticated connections     | `odbc`      |
//! | `authmethod`            | `No Auth`, `External Auth`, `OIDC Client Cred Auth`| `No Auth`   |
//! | `oidcDiscoveryUrl`      | OpenID Connect discovery document                  | empty       |
//! | `clientId`              | OAuth client id                                    | empty       |
//! | `clientSecret`          | OAuth client secret                                | empty       |
//! | `oidcScope`             | OAuth scope                                        | empty       |
//! | `secretEncryptionLevel` | `user` or `system`                                 | `user`      |
//! | `tokenCachePath`        | Token cache file                                   | per platform|
//! | `loglevel`              | `None`, `Error`, `Warn`, `Info`, `Debug`, `Trace`  | `None`      |
//! | `logfile`               | Append logs to this file instead of stderr         | stderr      |

use crate::auth::{self, AuthMethod};
use crate::client::{HttpBackend, HttpClientConfig, ReqwestBackend};
use crate::connection::Connection;
use crate::error::{Result, TrinoErrorHelper};
use crate::telemetry::{init_logging, LogLevel, LoggingConfig};
use crate::token_cache::SecretEncryptionLevel;
use crate::util::{parse_delimited_kvps, SEMICOLON_STYLE};
use std::path::PathBuf;
use tracing::debug;

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub connection_name: String,
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub auth_method: AuthMethod,
    pub oidc_discovery_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub oidc_scope: String,
    pub secret_encryption_level: SecretEncryptionLevel,
    pub token_cache_path: Option<PathBuf>,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            connection_name: String::new(),
            hostname: "localhost".to_string(),
            port: 8080,
            user: "odbc".to_string(),
            auth_method: AuthMethod::NoAuth,
            oidc_discovery_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            oidc_scope: String::new(),
            secret_encryption_level: SecretEncryptionLevel::User,
            token_cache_path: None,
            log_level: LogLevel::None,
            log_file: None,
        }
    }
}

impl DriverConfig {
    /// Applies one option. Keys are matched case-insensitively.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key.trim().to_ascii_lowercase().as_str() {
            "dsn" => self.connection_name = value.to_string(),
            "hostname" | "host" => self.hostname = value.trim_end_matches('/').to_string(),
            "port" => {
                self.port = value.trim().parse().map_err(|_| {
                    TrinoErrorHelper::invalid_argument()
                        .message(format!("invalid port '{value}'"))
                        .context("set option 'port'")
                })?
            }
            "user" | "uid" => self.user = value.to_string(),
            "authmethod" => self.auth_method = value.parse()?,
            "oidcdiscoveryurl" => self.oidc_discovery_url = value.to_string(),
            "clientid" => self.client_id = value.to_string(),
            "clientsecret" => self.client_secret = value.to_string(),
            "oidcscope" => self.oidc_scope = value.to_string(),
            "secretencryptionlevel" => self.secret_encryption_level = value.parse()?,
            "tokencachepath" => {
                self.token_cache_path = non_empty(value).map(PathBuf::from);
            }
            "loglevel" => self.log_level = value.parse()?,
            "logfile" => self.log_file = non_empty(value).map(PathBuf::from),
            "driver" => {}
            other => {
                return Err(TrinoErrorHelper::invalid_argument()
                    .message(format!("unknown option '{other}'"))
                    .context("set option"))
            }
        }
        Ok(())
    }

    /// Parses `key=value;key=value`.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in parse_delimited_kvps(connection_string, SEMICOLON_STYLE) {
            config.set(&key, &value)?;
        }
        Ok(config)
    }

    /// The settings as key/value pairs accepted by [`DriverConfig::set`].
    pub fn to_kvps(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("dsn", self.connection_name.clone()),
            ("hostname", self.hostname.clone()),
            ("port", self.port.to_string()),
            ("user", self.user.clone()),
            ("authmethod", self.auth_method.to_string()),
            ("oidcDiscoveryUrl", self.oidc_discovery_url.clone()),
            ("clientId", self.client_id.clone()),
            ("clientSecret", self.client_secret.clone()),
            ("oidcScope", self.oidc_scope.clone()),
            ("secretEncryptionLevel", self.secret_encryption_level.to_string()),
            ("loglevel", self.log_level.to_string()),
        ];
        if let Some(path) = &self.token_cache_path {
            pairs.push(("tokenCachePath", path.display().to_string()));
        }
        if let Some(path) = &self.log_file {
            pairs.push(("logfile", path.display().to_string()));
        }
        pairs
    }

    pub fn to_connection_string(&self) -> String {
        self.to_kvps()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level,
            log_file: self.log_file.clone(),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Represents a database instance that holds connection configuration.
///
/// A Database is created from a Driver and is used to establish Connections.
#[derive(Debug, Default)]
pub struct Database {
    config: DriverConfig,
}

impl Database {
    /// Creates a new Database instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        Ok(Self::from_config(DriverConfig::from_connection_string(
            connection_string,
        )?))
    }

    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set(key, value)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Opens a connection using the network.
    pub fn new_connection(&self) -> Result<Connection> {
        self.new_connection_with_backend(Box::new(ReqwestBackend::new(
            HttpClientConfig::default(),
        )))
    }

    /// Opens a connection that sends requests through `backend`.
    pub fn new_connection_with_backend(&self, backend: Box<dyn HttpBackend>) -> Result<Connection> {
        let logging = init_logging(&self.config.logging())?;
        debug!(
            host = %self.config.hostname,
            port = self.config.port,
            auth = %self.config.auth_method,
            subscriber_installed = logging.installed(),
            "opening connection"
        );
        let auth = auth::from_config(&self.config)?;
        Ok(Connection::new(self.config.clone(), auth, backend))
    }
}
