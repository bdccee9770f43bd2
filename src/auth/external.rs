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


//! Interactive browser-based authentication.
//!
//! The flow is driven by the engine:
//!
//! 1. An unauthenticated statement is posted; the engine answers 401 with
//!    `WWW-Authenticate: Bearer x_redirect_server="...", x_token_server="..."`.
//! 2. The redirect URL is opened in the user's browser.
//! 3. The token server is polled until it hands out a token, following any
//!    `next_uri` it returns.

use super::cached::TokenSource;
use crate::client::{HttpBackend, HttpRequest};
use crate::error::Result;
use crate::util::{parse_delimited_kvps, COMMA_STYLE};
use serde::Deserialize;
use std::fmt::Debug;
use tracing::{error, info, trace, warn};

/// Number of additional token-server polls after the first one.
pub const MAX_AUTH_TOKEN_RETRIES: usize = 2;

const TRIGGER_QUERY: &str = "SELECT 'authenticating...'";

/// Opens URLs for the user to complete sign-in.
pub trait BrowserLauncher: Send + Debug {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

#[derive(Debug, Deserialize)]
struct TokenPoll {
    token: Option<String>,
    next_uri: Option<String>,
}

/// Servers advertised in a `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub redirect_server: String,
    pub token_server: String,
}

impl AuthChallenge {
    /// Parses `Bearer x_redirect_server="...", x_token_server="..."`.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim_start();
        let params = match header.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &header[7..],
            _ => header,
        };
        let kvps = parse_delimited_kvps(params, COMMA_STYLE);
        Some(Self {
            redirect_server: kvps.get("x_redirect_server")?.clone(),
            token_server: kvps.get("x_token_server")?.clone(),
        })
    }
}

/// Token source for the engine's external authentication.
#[derive(Debug)]
pub struct ExternalAuth {
    hostname: String,
    port: u16,
    browser: Box<dyn BrowserLauncher>,
}

impl ExternalAuth {
    pub fn new(hostname: &str, port: u16) -> Self {
        Self {
            hostname: hostname.to_string(),
            port,
            browser: Box::new(SystemBrowser),
        }
    }

    /// Replaces the browser launcher.
    pub fn with_browser(mut self, browser: Box<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    fn trigger_url(&self) -> String {
        format!("{}:{}/v1/statement", self.hostname, self.port)
    }
}

impl TokenSource for ExternalAuth {
    fn name(&self) -> &'static str {
        "external authentication"
    }

    fn obtain_access_token(&mut self, backend: &mut dyn HttpBackend) -> Result<String> {
        let url = self.trigger_url();
        trace!(%url, "triggering external authentication");
        // No credentials on the trigger, so the engine issues a new challenge.
        let response = backend.execute(&HttpRequest::post(&url, TRIGGER_QUERY))?;
        let Some(challenge) = response
            .header("www-authenticate")
            .and_then(AuthChallenge::parse)
        else {
            error!(%url, status = response.status, "unauthenticated request did not return an authentication challenge");
            return Ok(String::new());
        };

        info!(redirect = %challenge.redirect_server, "authenticating in browser");
        if let Err(e) = self.browser.open(&challenge.redirect_server) {
            warn!(error = %e, url = %challenge.redirect_server, "could not open browser");
        }

        let mut token_server = challenge.token_server;
        for attempt in 0..=MAX_AUTH_TOKEN_RETRIES {
            let response = backend.execute(&HttpRequest::get(&token_server))?;
            match response.parse_json::<TokenPoll>() {
                Ok(TokenPoll {
                    token: Some(token), ..
                }) => {
                    info!("authentication completed");
                    return Ok(token);
                }
                Ok(TokenPoll {
                    next_uri: Some(next),
                    ..
                }) => token_server = next,
                Ok(_) => {}
                Err(e) => warn!(attempt, error = %e, "unreadable token server response"),
            }
        }
        error!("external authentication did not produce a token");
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HttpMethod, HttpResponse, ScriptedBackend};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    struct RecordingBrowser {
        opened: Arc<Mutex<Vec<String>>>,
    }

    impl BrowserLauncher for RecordingBrowser {
        fn open(&self, url: &str) -> std::io::Result<()> {
            self.opened.lock().push(url.to_string());
            Ok(())
        }
    }

    fn challenge() -> HttpResponse {
        HttpResponse::new(401, "").with_header(
            "WWW-Authenticate",
            r#"Bearer x_redirect_server="https://trino/oauth2/redirect", x_token_server="https://trino/oauth2/token/1""#,
        )
    }

    #[test]
    fn test_parse_challenge() {
        let parsed = AuthChallenge::parse(
            r#"Bearer x_redirect_server="https://r", x_token_server="https://t""#,
        )
        .unwrap();
        assert_eq!(parsed.redirect_server, "https://r");
        assert_eq!(parsed.token_server, "https://t");
        assert!(AuthChallenge::parse(r#"Bearer realm="trino""#).is_none());
    }

    #[test]
    fn test_external_auth_flow() {
        let backend = ScriptedBackend::new();
        backend.push(challenge());
        backend.push_json(200, json!({"next_uri": "https://trino/oauth2/token/2"}));
        backend.push_json(200, json!({"token": "tok"}));

        let browser = RecordingBrowser::default();
        let mut source = ExternalAuth::new("https://trino", 443).with_browser(Box::new(browser.clone()));
        let token = source.obtain_access_token(&mut backend.clone()).unwrap();
        assert_eq!(token, "tok");
        assert_eq!(*browser.opened.lock(), vec!["https://trino/oauth2/redirect".to_string()]);

        let requests = backend.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://trino:443/v1/statement");
        assert_eq!(requests[0].body.as_deref(), Some("SELECT 'authenticating...'"));
        assert!(requests[0].header_value("Authorization").is_none());
        assert_eq!(requests[1].url, "https://trino/oauth2/token/1");
        assert_eq!(requests[2].url, "https://trino/oauth2/token/2");
    }

    #[test]
    fn test_gives_up_after_bounded_retries() {
        let backend = ScriptedBackend::new();
        backend.push(challenge());
        for _ in 0..5 {
            backend.push_json(200, json!({}));
        }
        let mut source =
            ExternalAuth::new("https://trino", 443).with_browser(Box::new(RecordingBrowser::default()));
        let token = source.obtain_access_token(&mut backend.clone()).unwrap();
        assert!(token.is_empty());
        assert_eq!(backend.request_count(), 1 + MAX_AUTH_TOKEN_RETRIES + 1);
    }

    #[test]
    fn test_missing_challenge() {
        let backend = ScriptedBackend::new();
        backend.push(HttpResponse::new(200, "{}"));
        let mut source =
            ExternalAuth::new("https://trino", 443).with_browser(Box::new(RecordingBrowser::default()));
        assert_eq!(source.obtain_access_token(&mut backend.clone()).unwrap(), "");
        assert_eq!(backend.request_count(), 1);
    }
}
