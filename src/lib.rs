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


//! Trino Driver for Rust
//!
//! This crate is the core of a Trino database driver: it submits SQL over
//! Trino's HTTP statement protocol, authenticates, caches OAuth tokens on
//! disk, and marshals result cells into C-layout buffers or Arrow batches.
//!
//! ## Overview
//!
//! - [`Driver`] - Entry point for creating databases
//! - [`Database`] - Holds connection configuration
//! - [`Connection`] - Transport to a Trino coordinator
//! - [`Statement`] - SQL statement execution and row cursor
//!
//! ## Example
//!
//! ```no_run
//! use trino_driver::statement::FetchOutcome;
//! use trino_driver::Driver;
//!
//! # fn main() -> trino_driver::Result<()> {
//! let driver = Driver::new();
//! let database = driver.new_database_from_connection_string(
//!     "hostname=https://trino.example.com;port=443;authmethod=External Auth",
//! )?;
//! let connection = database.new_connection()?;
//! let mut statement = connection.new_statement()?;
//! statement.execute("SELECT name FROM system.runtime.nodes")?;
//! while statement.fetch()? == FetchOutcome::Row {
//!     let mut buf = [0u8; 256];
//!     let mut len = 0isize;
//!     statement.get_data(1, 1, &mut buf, Some(&mut len))?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod catalog;
pub mod client;
pub mod codec;
pub mod connection;
pub mod database;
pub mod driver;
pub mod error;
pub mod query;
pub mod result;
pub mod statement;
pub mod telemetry;
pub mod token_cache;
pub mod types;
pub mod util;

pub use connection::Connection;
pub use database::{Database, DriverConfig};
pub use driver::Driver;
pub use error::{Error, ErrorKind, Result, TrinoErrorHelper};
pub use statement::Statement;
