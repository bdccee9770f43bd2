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


//! Statement implementation for the Trino driver.
//!
//! A [`Statement`] owns one [`Query`] and a forward-only cursor over its
//! rows. [`Statement::fetch`] advances the cursor, polling the engine for
//! more rows when the buffer runs dry and releasing rows already read.
//! [`Statement::get_data`] marshals a cell of the current row into a caller
//! buffer through the [`RowCodec`].

use crate::catalog;
use crate::client::Transport;
use crate::codec::{CellTarget, NumericMeta, RowCodec, SQL_NULL_DATA};
use crate::error::{Result, TrinoErrorHelper};
use crate::query::{PollMode, Query, QueryState};
use crate::types::mapping::{
    SQL_ALL_TYPES, SQL_BIGINT, SQL_BIT, SQL_DATE, SQL_DECIMAL, SQL_DOUBLE, SQL_GUID, SQL_INTEGER,
    SQL_REAL, SQL_SMALLINT, SQL_TIME, SQL_TIMESTAMP, SQL_TINYINT, SQL_TYPE_TIMESTAMP,
    SQL_VARBINARY, SQL_VARCHAR, SQL_WVARCHAR,
};
use crate::types::{ColumnDescriptor, DescribedColumn, QueryResults, QueryStats, Row};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// SQLSTATE reported when character data did not fit the caller buffer.
pub const RIGHT_TRUNCATION_STATE: &str = "01004";

const DECIMAL_MAX_PRECISION: u8 = 38;

/// Result of advancing the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Row,
    NoData,
}

/// Result of reading one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    Success,
    SuccessWithInfo {
        sqlstate: &'static str,
        message: &'static str,
    },
}

/// Represents a SQL statement that can be executed against Trino.
///
/// A Statement is created from a Connection and is used to execute SQL
/// queries and retrieve results. Dropping it terminates a running query.
#[derive(Debug)]
pub struct Statement {
    query: Query,
    codec: RowCodec,
    fetched_position: i64,
    fetch_poll_mode: PollMode,
    described: Arc<Mutex<Vec<DescribedColumn>>>,
}

impl Statement {
    pub(crate) fn new(transport: Arc<Mutex<Transport>>) -> Self {
        let mut query = Query::new(transport);
        let described = Arc::new(Mutex::new(Vec::new()));
        let table = Arc::clone(&described);
        query.subscribe_columns_changed(move |columns| {
            *table.lock() = columns.iter().map(DescribedColumn::from_descriptor).collect();
        });
        Self {
            query,
            codec: RowCodec::new(),
            fetched_position: -1,
            fetch_poll_mode: PollMode::default(),
            described,
        }
    }

    /// Returns the current SQL query.
    pub fn sql_query(&self) -> &str {
        self.query.query()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Query {
        &mut self.query
    }

    pub fn set_fetch_poll_mode(&mut self, mode: PollMode) {
        self.fetch_poll_mode = mode;
    }

    /// Global index of the row the cursor is on, or -1 before the first fetch.
    pub fn fetched_position(&self) -> i64 {
        self.fetched_position
    }

    /// Submits `sql` and waits until the result columns are known.
    ///
    /// Any previous query on this statement is terminated first.
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        self.query.terminate()?;
        self.fetched_position = -1;
        self.query.set_query(sql);
        self.query.post()?;
        self.query.poll(PollMode::UntilColumnsLoaded)?;
        self.check_query_error("execute query")?;
        debug!(
            query_id = %self.query.query_id(),
            columns = self.query.columns().len(),
            "statement executed"
        );
        Ok(())
    }

    /// Column metadata, polling for it if the engine has not sent it yet.
    pub fn column_descriptions(&mut self) -> Result<&[ColumnDescriptor]> {
        self.query.column_descriptions()
    }

    /// SQL attributes of the 1-based `column` of the current result.
    pub fn describe_column(&self, column: usize) -> Result<DescribedColumn> {
        let column_count = self.query.columns().len();
        if column == 0 || column > column_count {
            return Err(TrinoErrorHelper::invalid_argument()
                .message(format!("column {column} is out of range 1..={column_count}"))
                .context("describe column"));
        }
        self.described.lock().get(column - 1).cloned().ok_or_else(|| {
            TrinoErrorHelper::invalid_state()
                .message("column metadata has not been loaded")
                .context("describe column")
        })
    }

    /// Lists catalogs, schemas, tables or table types.
    ///
    /// See [`catalog::tables_query`] for how the arguments are interpreted.
    pub fn tables(&mut self, catalog: &str, schema: &str, table: &str, table_type: &str) -> Result<()> {
        trace!(catalog, schema, table, table_type, "listing tables");
        self.execute(&catalog::tables_query(catalog, schema, table, table_type))
    }

    /// Lists the columns of matching tables, ordered by table and position.
    pub fn columns(&mut self, catalog: &str, schema: &str, table: &str, column: &str) -> Result<()> {
        trace!(catalog, schema, table, column, "listing columns");
        self.execute(&catalog::columns_query(catalog, schema, table, column))
    }

    /// Moves the cursor to the next row.
    pub fn fetch(&mut self) -> Result<FetchOutcome> {
        if self.query.state() == QueryState::Idle {
            return Err(TrinoErrorHelper::invalid_state()
                .message("no query has been executed")
                .context("fetch"));
        }
        loop {
            let last_row = self.query.current_row_count() - 1;
            if self.fetched_position < last_row {
                self.fetched_position += 1;
                trace!(position = self.fetched_position, "fetched row");
                return Ok(FetchOutcome::Row);
            }
            // Everything up to the cursor has been read.
            self.query.checkpoint_row_position(self.fetched_position);
            if self.query.is_completed() {
                self.check_query_error("fetch")?;
                return Ok(FetchOutcome::NoData);
            }
            self.query.poll(self.fetch_poll_mode)?;
            self.check_query_error("fetch")?;
        }
    }

    /// The row under the cursor.
    pub fn current_row(&self) -> Option<&Row> {
        self.query.row_at_index(self.fetched_position)
    }

    /// Writes the 1-based `column` of the current row into `buffer` as the
    /// ODBC C type `c_type`.
    ///
    /// Nulls set the indicator to [`SQL_NULL_DATA`]. Character data longer
    /// than the buffer is truncated and reported as
    /// [`DataStatus::SuccessWithInfo`].
    pub fn get_data(
        &mut self,
        column: usize,
        c_type: i16,
        buffer: &mut [u8],
        mut indicator: Option<&mut isize>,
    ) -> Result<DataStatus> {
        let column_count = self.query.columns().len();
        if column == 0 || column > column_count {
            if let Some(ind) = indicator.as_deref_mut() {
                *ind = SQL_NULL_DATA;
            }
            return Err(TrinoErrorHelper::invalid_argument()
                .message(format!("column {column} is out of range 1..={column_count}"))
                .context("get data"));
        }
        let meta = numeric_meta(&self.query.columns()[column - 1]);
        let Some(row) = self.query.row_at_index(self.fetched_position) else {
            return Err(TrinoErrorHelper::invalid_state()
                .message("no current row")
                .context("get data"));
        };

        let capacity = buffer.len() as isize;
        let status = self.codec.write_cell(
            c_type,
            row,
            column,
            CellTarget::new(buffer, indicator.as_deref_mut()),
            meta,
        );
        if !status.success {
            return Err(TrinoErrorHelper::invalid_argument()
                .message(format!("cannot convert column {column} to C type {c_type}"))
                .context("get data"));
        }
        let written = indicator.as_deref().copied();
        match written {
            Some(len) if status.is_variable_length && len >= capacity => {
                Ok(DataStatus::SuccessWithInfo {
                    sqlstate: RIGHT_TRUNCATION_STATE,
                    message: "String data, right truncated",
                })
            }
            _ => Ok(DataStatus::Success),
        }
    }

    /// Total rows once the query has completed, otherwise -1.
    pub fn row_count(&self) -> i64 {
        self.query.absolute_row_count()
    }

    /// Requests partial cancellation and drains the query.
    pub fn cancel(&mut self) -> Result<()> {
        self.query.cancel()
    }

    /// Terminates the query and discards its results.
    pub fn close_cursor(&mut self) -> Result<()> {
        self.query.terminate()?;
        self.fetched_position = -1;
        Ok(())
    }

    /// Replaces the result set with a locally produced response body.
    pub fn sideload(&mut self, body: &str) -> Result<()> {
        self.query.sideload_response(body)?;
        self.fetched_position = -1;
        Ok(())
    }

    /// Loads the table of SQL types the driver supports, filtered by
    /// `data_type` (0 for all).
    pub fn type_info(&mut self, data_type: i16) -> Result<()> {
        let data = type_info_rows(data_type).ok_or_else(|| {
            TrinoErrorHelper::not_implemented()
                .message(format!("type info for SQL type {data_type}"))
                .context("get type info")
        })?;
        let results = QueryResults {
            columns: Some(type_info_columns()),
            data: Some(data),
            stats: Some(QueryStats {
                state: "FINISHED".to_string(),
            }),
            ..QueryResults::default()
        };
        self.sideload(&serde_json::to_string(&results)?)
    }

    fn check_query_error(&self, context: &str) -> Result<()> {
        match self.query.error() {
            Some(error) => {
                let message = match &error.error_name {
                    Some(name) => format!("{name}: {}", error.message),
                    None => error.message.clone(),
                };
                Err(TrinoErrorHelper::protocol().message(message).context(context))
            }
            None => Ok(()),
        }
    }
}

fn numeric_meta(column: &ColumnDescriptor) -> NumericMeta {
    NumericMeta {
        precision: column.precision().unwrap_or(DECIMAL_MAX_PRECISION),
        scale: column.scale().unwrap_or(0),
    }
}

fn type_info_columns() -> Vec<ColumnDescriptor> {
    const VARCHAR_MAX: i64 = 2_147_483_647;
    let varchar = |name: &str| ColumnDescriptor::new(name, "varchar", "varchar", &[VARCHAR_MAX]);
    let smallint = |name: &str| ColumnDescriptor::new(name, "smallint", "smallint", &[]);
    let integer = |name: &str| ColumnDescriptor::new(name, "integer", "integer", &[]);
    vec![
        varchar("TYPE_NAME"),
        smallint("DATA_TYPE"),
        integer("COLUMN_SIZE"),
        varchar("LITERAL_PREFIX"),
        varchar("LITERAL_SUFFIX"),
        varchar("CREATE_PARAMS"),
        smallint("NULLABLE"),
        smallint("CASE_SENSITIVE"),
        smallint("SEARCHABLE"),
        smallint("UNSIGNED_ATTRIBUTE"),
        smallint("FIXED_PREC_SCALE"),
        smallint("AUTO_UNIQUE_VALUE"),
        varchar("LOCAL_TYPE_NAME"),
        smallint("MINIMUM_SCALE"),
        smallint("MAXIMUM_SCALE"),
        smallint("SQL_DATA_TYPE"),
        smallint("SQL_DATETIME_SUB"),
        integer("NUM_PREC_RADIX"),
        smallint("INTERVAL_PRECISION"),
    ]
}

/// One row of the type table. Unset optional attributes are null.
struct TypeInfo {
    name: &'static str,
    data_type: i16,
    column_size: i64,
    literal_prefix: Option<&'static str>,
    create_params: Option<&'static str>,
    case_sensitive: bool,
    searchable: i16,
    fixed_prec_scale: bool,
    scale_range: Option<(i16, i16)>,
    datetime_sub: Option<i16>,
    radix: Option<i64>,
}

impl TypeInfo {
    fn basic(name: &'static str, data_type: i16, column_size: i64) -> Self {
        Self {
            name,
            data_type,
            column_size,
            literal_prefix: None,
            create_params: None,
            case_sensitive: false,
            searchable: 2,
            fixed_prec_scale: false,
            scale_range: None,
            datetime_sub: None,
            radix: None,
        }
    }

    fn integral(name: &'static str, data_type: i16, bits: i64) -> Self {
        let mut info = Self::basic(name, data_type, bits);
        info.fixed_prec_scale = true;
        info.scale_range = Some((0, 0));
        info.radix = Some(2);
        info
    }

    fn to_row(&self) -> Row {
        let (min_scale, max_scale) = match self.scale_range {
            Some((min, max)) => (json!(min), json!(max)),
            None => (Value::Null, Value::Null),
        };
        vec![
            json!(self.name),
            json!(self.data_type),
            json!(self.column_size),
            json!(self.literal_prefix),
            Value::Null,
            json!(self.create_params),
            json!(1),
            json!(i16::from(self.case_sensitive)),
            json!(self.searchable),
            Value::Null,
            json!(i16::from(self.fixed_prec_scale)),
            Value::Null,
            json!(self.name),
            min_scale,
            max_scale,
            json!(self.data_type),
            json!(self.datetime_sub),
            json!(self.radix),
            Value::Null,
        ]
    }
}

fn supported_types() -> Vec<TypeInfo> {
    let mut varchar = TypeInfo::basic("VARCHAR", SQL_VARCHAR, 2_147_483_647);
    varchar.create_params = Some("length");
    varchar.case_sensitive = true;
    varchar.searchable = 3;

    let mut varbinary = TypeInfo::basic("VARBINARY", SQL_VARBINARY, 2_147_483_647);
    varbinary.literal_prefix = Some("x");
    varbinary.searchable = 0;

    let mut bit = TypeInfo::basic("BIT", SQL_BIT, 1);
    bit.fixed_prec_scale = true;
    bit.scale_range = Some((0, 0));

    let mut real = TypeInfo::integral("REAL", SQL_REAL, 32);
    real.fixed_prec_scale = false;
    real.scale_range = Some((0, 7));

    let mut double = TypeInfo::integral("DOUBLE", SQL_DOUBLE, 64);
    double.fixed_prec_scale = false;
    double.scale_range = Some((0, 16));

    let mut timestamp = TypeInfo::basic("TIMESTAMP", SQL_TIMESTAMP, 23);
    timestamp.datetime_sub = Some(9);

    let mut decimal = TypeInfo::integral("DECIMAL", SQL_DECIMAL, 39);
    decimal.scale_range = Some((0, 38));
    decimal.radix = Some(10);

    vec![
        varchar,
        varbinary,
        bit,
        TypeInfo::integral("TINYINT", SQL_TINYINT, 8),
        TypeInfo::integral("SMALLINT", SQL_SMALLINT, 16),
        TypeInfo::integral("INTEGER", SQL_INTEGER, 32),
        TypeInfo::integral("BIGINT", SQL_BIGINT, 64),
        real,
        double,
        TypeInfo::basic("GUID", SQL_GUID, 36),
        TypeInfo::basic("DATE", SQL_DATE, 10),
        TypeInfo::basic("TIME", SQL_TIME, 21),
        timestamp,
        decimal,
    ]
}

fn type_info_rows(data_type: i16) -> Option<Vec<Row>> {
    let wanted = match data_type {
        SQL_ALL_TYPES => None,
        SQL_VARCHAR | SQL_WVARCHAR => Some(SQL_VARCHAR),
        SQL_VARBINARY => Some(SQL_VARBINARY),
        SQL_TIMESTAMP | SQL_TYPE_TIMESTAMP => Some(SQL_TIMESTAMP),
        _ => return None,
    };
    Some(
        supported_types()
            .iter()
            .filter(|info| wanted.map_or(true, |ty| info.data_type == ty))
            .map(TypeInfo::to_row)
            .collect(),
    )
}
