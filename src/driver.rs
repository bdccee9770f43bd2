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


//! Driver entry point for Trino.

use crate::database::Database;
use crate::error::Result;
use crate::telemetry::{init_logging, LoggingConfig, LoggingHandle};

/// The main entry point for the Trino driver.
///
/// The Driver is responsible for creating Database instances, which in turn
/// create Connections.
#[derive(Debug, Default)]
pub struct Driver {
    logging: Option<LoggingHandle>,
}

impl Driver {
    /// Creates a new Driver instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a driver and installs the process-wide log subscriber.
    pub fn with_logging(config: &LoggingConfig) -> Result<Self> {
        Ok(Self {
            logging: Some(init_logging(config)?),
        })
    }

    pub fn logging(&self) -> Option<&LoggingHandle> {
        self.logging.as_ref()
    }

    pub fn new_database(&self) -> Result<Database> {
        Ok(Database::new())
    }

    pub fn new_database_with_opts<K, V>(
        &self,
        opts: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Database>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut database = Database::new();
        for (key, value) in opts {
            database.set_option(key.as_ref(), value.as_ref())?;
        }
        Ok(database)
    }

    /// Builds a database from a `key=value;key=value` string.
    pub fn new_database_from_connection_string(&self, connection_string: &str) -> Result<Database> {
        Database::from_connection_string(connection_string)
    }
}
