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


//! Bearer-token authentication backed by the persistent token cache.

use super::{AuthProvider, SOURCE_HEADER, SOURCE_NAME};
use crate::client::HttpBackend;
use crate::error::{Result, TrinoErrorHelper};
use crate::token_cache::{TokenCache, TokenCacheEntry};
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// A way of obtaining a fresh access token.
pub trait TokenSource: Send + Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetches a new access token. An empty string means no token could be
    /// obtained; network failures are returned as errors.
    fn obtain_access_token(&mut self, backend: &mut dyn HttpBackend) -> Result<String>;
}

/// Applies cached tokens and refreshes them through a [`TokenSource`].
///
/// On construction the cached entry for the identity is loaded, and if it
/// is still valid it is used right away. A refresh reuses the cached token
/// while it is valid; otherwise it asks the source for a new one, persists
/// it, and applies it.
#[derive(Debug)]
pub struct TokenCacheAuth<S: TokenSource> {
    source: S,
    cache: TokenCache,
    entry: TokenCacheEntry,
    bearer: Option<String>,
}

impl<S: TokenSource> TokenCacheAuth<S> {
    pub fn new(source: S, cache: TokenCache, identity: impl Into<String>) -> Self {
        let entry = cache.load(&identity.into());
        let bearer = if entry.is_expired() {
            debug!(identity = %entry.identity, "cached token missing or expired");
            None
        } else {
            debug!(identity = %entry.identity, "using cached token");
            Some(entry.access_token.clone())
        };
        Self {
            source,
            cache,
            entry,
            bearer,
        }
    }

    pub fn identity(&self) -> &str {
        &self.entry.identity
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The token currently attached to requests, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

impl<S: TokenSource> AuthProvider for TokenCacheAuth<S> {
    fn is_expired(&self) -> bool {
        self.entry.is_expired()
    }

    fn refresh(&mut self, backend: &mut dyn HttpBackend) -> Result<()> {
        if !self.entry.is_expired() {
            self.bearer = Some(self.entry.access_token.clone());
            return Ok(());
        }

        info!(identity = %self.entry.identity, source = self.source.name(), "refreshing access token");
        let token = self.source.obtain_access_token(backend)?;
        if token.is_empty() {
            self.bearer = None;
            return Err(TrinoErrorHelper::unauthenticated()
                .message(format!("{} did not return an access token", self.source.name()))
                .context("authenticate"));
        }

        self.entry.access_token = token;
        if let Err(e) = self.cache.store(&self.entry) {
            warn!(identity = %self.entry.identity, error = %e, "could not persist access token");
        }
        self.bearer = Some(self.entry.access_token.clone());
        Ok(())
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(SOURCE_HEADER.to_string(), SOURCE_NAME.to_string())];
        if let Some(token) = &self.bearer {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }
}
