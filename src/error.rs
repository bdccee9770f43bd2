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


//! Error types for the Trino driver.
//!
//! Errors are built with [`TrinoErrorHelper`] in the builder style used
//! throughout the crate:
//!
//! ```
//! use trino_driver::TrinoErrorHelper;
//!
//! let err = TrinoErrorHelper::io()
//!     .message("connection refused")
//!     .context("post query");
//! assert_eq!(err.to_string(), "Trino: could not post query: connection refused");
//! ```

use std::fmt;

/// Broad classification of a driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller supplied a bad value (configuration, column index, target type).
    InvalidArgument,
    /// The operation is not valid in the current state.
    InvalidState,
    /// Network failure or an unexpected HTTP status.
    Io,
    /// The engine answered with something that does not follow the protocol.
    Protocol,
    /// No usable credential could be obtained.
    Unauthenticated,
    /// The feature is not supported by this driver.
    NotImplemented,
    /// A failure inside the driver itself.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Io => "io",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// The error type for Trino driver operations.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Trino: {}", describe(.context, .message))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Option<String>,
}

fn describe(context: &Option<String>, message: &str) -> String {
    match context {
        Some(context) if message.is_empty() => format!("could not {context}"),
        Some(context) => format!("could not {context}: {message}"),
        None => message.to_string(),
    }
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: String::new(),
            context: None,
        }
    }

    /// Sets the human-readable message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the operation that failed, rendered as "could not {context}".
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message without the driver prefix or context.
    pub fn detail(&self) -> &str {
        &self.message
    }
}

/// Constructors for [`Error`] values, one per [`ErrorKind`].
#[derive(Clone)]
pub struct TrinoErrorHelper;

impl TrinoErrorHelper {
    pub fn invalid_argument() -> Error {
        Error::new(ErrorKind::InvalidArgument)
    }

    pub fn invalid_state() -> Error {
        Error::new(ErrorKind::InvalidState)
    }

    pub fn io() -> Error {
        Error::new(ErrorKind::Io)
    }

    pub fn protocol() -> Error {
        Error::new(ErrorKind::Protocol)
    }

    pub fn unauthenticated() -> Error {
        Error::new(ErrorKind::Unauthenticated)
    }

    pub fn not_implemented() -> Error {
        Error::new(ErrorKind::NotImplemented)
    }

    pub fn internal() -> Error {
        Error::new(ErrorKind::Internal)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        TrinoErrorHelper::io().message(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        TrinoErrorHelper::protocol().message(format!("malformed JSON: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        TrinoErrorHelper::io().message(err.to_string())
    }
}

/// A convenient alias for Results with Trino errors.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TrinoErrorHelper::invalid_argument().message("invalid port 'abc'");
        let display = format!("{error}");
        assert!(display.contains("Trino"));
        assert!(display.contains("invalid port 'abc'"));
    }

    #[test]
    fn test_error_with_context() {
        let error = TrinoErrorHelper::io()
            .message("connection refused")
            .context("connect to server");
        let display = format!("{error}");
        assert!(display.contains("could not connect to server"));
        assert!(display.contains("connection refused"));
        assert_eq!(error.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_context_without_message() {
        let error = TrinoErrorHelper::unauthenticated().context("obtain access token");
        assert_eq!(error.to_string(), "Trino: could not obtain access token");
        assert_eq!(error.detail(), "");
    }

    #[test]
    fn test_json_error_is_protocol() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
