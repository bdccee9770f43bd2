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


//! Unauthenticated access with a fixed user name.

use super::{AuthProvider, SOURCE_HEADER, SOURCE_NAME, USER_HEADER};
use crate::client::HttpBackend;
use crate::error::Result;

/// Provider for engines that accept any caller.
///
/// Identifies itself with `X-Trino-User` and never performs network
/// activity on refresh.
#[derive(Debug, Clone)]
pub struct NoAuth {
    user: String,
}

impl NoAuth {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

impl AuthProvider for NoAuth {
    fn is_expired(&self) -> bool {
        false
    }

    fn refresh(&mut self, _backend: &mut dyn HttpBackend) -> Result<()> {
        Ok(())
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (SOURCE_HEADER.to_string(), SOURCE_NAME.to_string()),
            (USER_HEADER.to_string(), self.user.clone()),
        ]
    }
}
