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


//! Client layer: HTTP backends and the per-connection transport.

pub mod http;
#[cfg(test)]
pub(crate) mod scripted;
pub mod transport;

pub use http::{HttpBackend, HttpClientConfig, HttpMethod, HttpRequest, HttpResponse, ReqwestBackend};
#[cfg(test)]
pub(crate) use scripted::ScriptedBackend;
pub use transport::{SubscriptionId, Transport};
