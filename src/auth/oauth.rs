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


//! OAuth 2.0 client credentials authentication.

use super::cached::TokenSource;
use crate::client::{HttpBackend, HttpRequest};
use crate::error::Result;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    token_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// OAuth 2.0 client credentials token source.
///
/// The token endpoint is read from the OpenID Connect discovery document
/// on every refresh, so rotated endpoints are picked up without
/// reconfiguration.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    discovery_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientCredentials {
    pub fn new(discovery_url: &str, client_id: &str, client_secret: &str, scope: &str) -> Self {
        Self {
            discovery_url: discovery_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
        }
    }

    /// Returns the client ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The `application/x-www-form-urlencoded` token request body.
    pub fn form_body(&self) -> String {
        let encode = |v: &str| urlencoding::encode(v).into_owned();
        format!(
            "grant_type=client_credentials&client_id={}&client_secret={}&scope={}",
            encode(&self.client_id),
            encode(&self.client_secret),
            encode(&self.scope)
        )
    }

    fn token_endpoint(&self, backend: &mut dyn HttpBackend) -> Result<Option<String>> {
        let response = backend.execute(&HttpRequest::get(&self.discovery_url))?;
        if response.status != 200 {
            error!(url = %self.discovery_url, status = response.status, "discovery document request failed");
            return Ok(None);
        }
        let document: DiscoveryDocument = response.parse_json()?;
        Ok(document.token_endpoint.filter(|e| !e.is_empty()))
    }
}

impl TokenSource for ClientCredentials {
    fn name(&self) -> &'static str {
        "client credentials"
    }

    fn obtain_access_token(&mut self, backend: &mut dyn HttpBackend) -> Result<String> {
        let Some(endpoint) = self.token_endpoint(backend)? else {
            error!(url = %self.discovery_url, "discovery document has no token_endpoint");
            return Ok(String::new());
        };
        debug!(%endpoint, client_id = %self.client_id, "requesting client credentials token");
        let request = HttpRequest::post(&endpoint, self.form_body())
            .header("Content-Type", "application/x-www-form-urlencoded");
        let response = backend.execute(&request)?;
        if response.status != 200 {
            error!(%endpoint, status = response.status, body = %response.body, "token request failed");
            return Ok(String::new());
        }
        let token: TokenResponse = response.parse_json()?;
        Ok(token.access_token.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HttpMethod, ScriptedBackend};
    use serde_json::json;

    fn credentials() -> ClientCredentials {
        ClientCredentials::new(
            "https://idp/.well-known/openid-configuration",
            "svc account",
            "s3cr&t=",
            "trino:read",
        )
    }

    #[test]
    fn test_form_body_is_encoded() {
        assert_eq!(
            credentials().form_body(),
            "grant_type=client_credentials&client_id=svc%20account&client_secret=s3cr%26t%3D&scope=trino%3Aread"
        );
    }

    #[test]
    fn test_client_credentials_flow() {
        let backend = ScriptedBackend::new();
        backend.push_json(200, json!({"token_endpoint": "https://idp/token"}));
        backend.push_json(200, json!({"access_token": "abc", "token_type": "Bearer"}));

        let mut source = credentials();
        assert_eq!(source.obtain_access_token(&mut backend.clone()).unwrap(), "abc");

        let requests = backend.requests();
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[1].method, HttpMethod::Post);
        assert_eq!(requests[1].url, "https://idp/token");
        assert_eq!(
            requests[1].header_value("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_token_failure_yields_empty() {
        let backend = ScriptedBackend::new();
        backend.push_json(200, json!({"token_endpoint": "https://idp/token"}));
        backend.push_json(401, json!({"error": "invalid_client"}));
        let mut source = credentials();
        assert_eq!(source.obtain_access_token(&mut backend.clone()).unwrap(), "");

        let backend = ScriptedBackend::new();
        backend.push_json(200, json!({"issuer": "https://idp"}));
        assert_eq!(source.obtain_access_token(&mut backend.clone()).unwrap(), "");
        assert_eq!(backend.request_count(), 1);
    }
}
