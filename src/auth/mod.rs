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


//! Authentication mechanisms for the Trino driver.
//!
//! The transport consults the connection's [`AuthProvider`] before every
//! request: if [`AuthProvider::is_expired`] reports true it calls
//! [`AuthProvider::refresh`] once, then attaches [`AuthProvider::headers`].
//!
//! | `authmethod` value      | Provider                                     |
//! |-------------------------|----------------------------------------------|
//! | `No Auth`               | [`NoAuth`]                                   |
//! | `External Auth`         | [`TokenCacheAuth`] over [`ExternalAuth`]     |
//! | `OIDC Client Cred Auth` | [`TokenCacheAuth`] over [`ClientCredentials`]|

pub mod cached;
pub mod external;
pub mod none;
pub mod oauth;

pub use cached::{TokenCacheAuth, TokenSource};
pub use external::{BrowserLauncher, ExternalAuth, SystemBrowser};
pub use none::NoAuth;
pub use oauth::ClientCredentials;

use crate::client::HttpBackend;
use crate::database::DriverConfig;
use crate::error::{Result, TrinoErrorHelper};
use crate::token_cache::{identity, TokenCache};
use std::fmt::{self, Debug};
use std::str::FromStr;

/// Header identifying the client application to the engine.
pub const SOURCE_HEADER: &str = "X-Trino-Source";
pub const SOURCE_NAME: &str = "TrinoODBCDriver";
pub const USER_HEADER: &str = "X-Trino-User";

/// Trait for authentication providers.
pub trait AuthProvider: Send + Debug {
    /// Whether the current credential must be refreshed before use.
    fn is_expired(&self) -> bool;

    /// Obtains a usable credential, performing network calls if needed.
    fn refresh(&mut self, backend: &mut dyn HttpBackend) -> Result<()>;

    /// Headers to attach to every request.
    fn headers(&self) -> Vec<(String, String)>;
}

/// Authentication strategies selectable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    #[default]
    NoAuth,
    External,
    ClientCredentials,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::NoAuth => "No Auth",
            AuthMethod::External => "External Auth",
            AuthMethod::ClientCredentials => "OIDC Client Cred Auth",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "noauth" | "" => Ok(AuthMethod::NoAuth),
            "externalauth" => Ok(AuthMethod::External),
            "oidcclientcredauth" => Ok(AuthMethod::ClientCredentials),
            _ => Err(TrinoErrorHelper::invalid_argument()
                .message(format!("unknown authentication method '{s}'"))),
        }
    }
}

/// Builds the provider selected by `config`.
pub fn from_config(config: &DriverConfig) -> Result<Box<dyn AuthProvider>> {
    match config.auth_method {
        AuthMethod::NoAuth => Ok(Box::new(NoAuth::new(config.user.clone()))),
        AuthMethod::External => {
            let cache = token_cache(config);
            let key = identity(&config.connection_name, &config.hostname, config.port);
            let source = ExternalAuth::new(&config.hostname, config.port);
            Ok(Box::new(TokenCacheAuth::new(source, cache, key)))
        }
        AuthMethod::ClientCredentials => {
            if config.oidc_discovery_url.is_empty() || config.client_id.is_empty() {
                return Err(TrinoErrorHelper::invalid_argument()
                    .message("oidcDiscoveryUrl and clientId are required")
                    .context("configure client credential authentication"));
            }
            let cache = token_cache(config);
            let key = identity(
                &client_credentials_connection_name(config),
                &config.hostname,
                config.port,
            );
            let source = ClientCredentials::new(
                &config.oidc_discovery_url,
                &config.client_id,
                &config.client_secret,
                &config.oidc_scope,
            );
            Ok(Box::new(TokenCacheAuth::new(source, cache, key)))
        }
    }
}

fn token_cache(config: &DriverConfig) -> TokenCache {
    let path = config
        .token_cache_path
        .clone()
        .unwrap_or_else(TokenCache::default_path);
    TokenCache::new(path, config.secret_encryption_level)
}

/// Cache name for client credential sessions without a DSN.
fn client_credentials_connection_name(config: &DriverConfig) -> String {
    if config.connection_name.is_empty() {
        format!("{}__{}", config.client_id, config.oidc_scope)
    } else {
        config.connection_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_parsing() {
        assert_eq!("No Auth".parse::<AuthMethod>().unwrap(), AuthMethod::NoAuth);
        assert_eq!(
            "external auth".parse::<AuthMethod>().unwrap(),
            AuthMethod::External
        );
        assert_eq!(
            "OIDC Client Cred Auth".parse::<AuthMethod>().unwrap(),
            AuthMethod::ClientCredentials
        );
        assert!("Kerberos".parse::<AuthMethod>().is_err());
        for method in [
            AuthMethod::NoAuth,
            AuthMethod::External,
            AuthMethod::ClientCredentials,
        ] {
            assert_eq!(method.to_string().parse::<AuthMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_client_credentials_identity_fallback() {
        let mut config = DriverConfig {
            client_id: "svc".into(),
            oidc_scope: "trino".into(),
            ..DriverConfig::default()
        };
        assert_eq!(client_credentials_connection_name(&config), "svc__trino");
        config.connection_name = "warehouse".into();
        assert_eq!(client_credentials_connection_name(&config), "warehouse");
    }

    #[test]
    fn test_client_credentials_requires_parameters() {
        let config = DriverConfig {
            auth_method: AuthMethod::ClientCredentials,
            ..DriverConfig::default()
        };
        assert!(from_config(&config).is_err());
    }

    #[test]
    fn test_no_auth_from_config() {
        let provider = from_config(&DriverConfig::default()).unwrap();
        assert!(!provider.is_expired());
    }
}
