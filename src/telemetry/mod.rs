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


//! Logging and timing for the Trino driver.
//!
//! Logging is opt-in: the driver installs a `tracing` subscriber only when
//! [`init_logging`] is called with a level other than [`LogLevel::None`].
//! Applications that already install their own subscriber keep it.

use crate::error::{Result, TrinoErrorHelper};
use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Driver log verbosity, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    #[default]
    None,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "Trace",
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Warn => "Warn",
            LogLevel::Error => "Error",
            LogLevel::None => "None",
        }
    }

    /// The `EnvFilter` directive for this level, or `None` when disabled.
    fn directive(&self) -> Option<&'static str> {
        match self {
            LogLevel::Trace => Some("trace"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Info => Some("info"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Error => Some("error"),
            LogLevel::None => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "none" | "off" | "" => Ok(LogLevel::None),
            other => Err(TrinoErrorHelper::invalid_argument()
                .message(format!("unknown log level '{other}'"))),
        }
    }
}

/// Where and how much the driver logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Append to this file instead of writing to stderr.
    pub log_file: Option<PathBuf>,
}

/// Result of [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingHandle {
    level: LogLevel,
    installed: bool,
}

impl LoggingHandle {
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether this call installed the global subscriber. False when logging
    /// is disabled or a subscriber was already present.
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// Installs the driver's log subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingHandle> {
    let Some(directive) = config.level.directive() else {
        return Ok(LoggingHandle {
            level: LogLevel::None,
            installed: false,
        });
    };
    let filter = EnvFilter::try_new(format!("trino_driver={directive}")).map_err(|e| {
        TrinoErrorHelper::invalid_argument()
            .message(e.to_string())
            .context("configure logging")
    })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(config.level == LogLevel::Trace);

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    TrinoErrorHelper::io()
                        .message(format!("{}: {e}", path.display()))
                        .context("open log file")
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => builder.with_writer(std::io::stderr).try_init().is_ok(),
    };
    Ok(LoggingHandle {
        level: config.level,
        installed,
    })
}

/// A timer for measuring operation durations.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed duration since the timer was started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
