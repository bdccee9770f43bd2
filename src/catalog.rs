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


//! Metadata queries against the engine's `system.jdbc` tables.
//!
//! [`tables_query`] and [`columns_query`] build the SQL behind
//! [`Statement::tables`](crate::statement::Statement::tables) and
//! [`Statement::columns`](crate::statement::Statement::columns). Patterns
//! containing `%` are matched with `LIKE`; anything else uses `=`, which
//! the engine evaluates much faster.

/// Pattern that matches every catalog, schema or table type.
pub const SEARCH_ALL: &str = "%";

const ALL_CATALOGS_QUERY: &str = "\
SELECT
    table_cat,
    CAST(NULL AS VARCHAR) AS table_schem,
    CAST(NULL AS VARCHAR) AS table_name,
    CAST(NULL AS VARCHAR) AS table_type,
    CAST(NULL AS VARCHAR) AS remarks
FROM system.jdbc.catalogs";

const ALL_SCHEMAS_QUERY: &str = "\
SELECT
    CAST(NULL AS VARCHAR) AS table_cat,
    table_schem,
    CAST(NULL AS VARCHAR) AS table_name,
    CAST(NULL AS VARCHAR) AS table_type,
    CAST(NULL AS VARCHAR) AS remarks
FROM system.jdbc.schemas";

const ALL_TABLE_TYPES_QUERY: &str = "\
SELECT
    CAST(NULL AS VARCHAR) AS table_cat,
    CAST(NULL AS VARCHAR) AS table_schem,
    CAST(NULL AS VARCHAR) AS table_name,
    table_type,
    CAST(NULL AS VARCHAR) AS remarks
FROM system.jdbc.table_types";

const TABLES_QUERY: &str = "\
SELECT
    table_cat,
    table_schem,
    table_name,
    table_type,
    remarks
FROM system.jdbc.tables
WHERE 1 = 1
";

// Type 2014 is the JDBC code for timestamp with time zone; it is reported
// as an ODBC timestamp. Integral types carry 0 decimal digits, not NULL.
const COLUMNS_QUERY: &str = "\
SELECT
    table_cat,
    table_schem,
    table_name,
    column_name,
    CASE data_type
        WHEN 2014 THEN 93
        ELSE data_type
    END AS data_type,
    CASE data_type
        WHEN 2014 THEN 'timestamp'
        ELSE type_name
    END AS type_name,
    CASE data_type
        WHEN 2014 THEN 16
        ELSE column_size
    END AS column_size,
    buffer_length,
    CASE
        WHEN type_name IN ('bigint', 'integer', 'smallint', 'tinyint') THEN 0
        ELSE decimal_digits
    END AS decimal_digits,
    num_prec_radix,
    nullable,
    remarks,
    column_def,
    sql_data_type,
    sql_datetime_sub,
    char_octet_length,
    ordinal_position,
    is_nullable
FROM system.jdbc.columns
WHERE 1 = 1
";

/// Builds the table listing query.
///
/// Three argument shapes enumerate instead of filtering: a catalog of `%`
/// with everything else empty lists catalogs, a schema of `%` with empty
/// catalog and table lists schemas, and a table type of `%` with empty
/// names lists table types. Otherwise empty arguments match everything.
/// `table_type` is a comma separated list such as `'TABLE','VIEW'`.
pub fn tables_query(catalog: &str, schema: &str, table: &str, table_type: &str) -> String {
    if catalog == SEARCH_ALL && schema.is_empty() && table.is_empty() && table_type.is_empty() {
        return ALL_CATALOGS_QUERY.to_string();
    }
    if schema == SEARCH_ALL && catalog.is_empty() && table.is_empty() {
        return ALL_SCHEMAS_QUERY.to_string();
    }
    if table_type == SEARCH_ALL && catalog.is_empty() && schema.is_empty() && table.is_empty() {
        return ALL_TABLE_TYPES_QUERY.to_string();
    }

    let mut query = TABLES_QUERY.to_string();
    push_filter(&mut query, "table_cat", or_all(catalog));
    push_filter(&mut query, "table_schem", or_all(schema));
    push_filter(&mut query, "table_name", or_all(table));

    let types: Vec<&str> = table_type
        .split(',')
        .map(|t| t.trim().trim_matches('\''))
        .filter(|t| !t.is_empty())
        .collect();
    if types.is_empty() || types == [SEARCH_ALL] {
        query.push_str("AND table_type LIKE '%'\n");
    } else {
        let list: Vec<String> = types.iter().map(|t| quote(t)).collect();
        query.push_str(&format!("AND table_type IN ({})\n", list.join(", ")));
    }
    query
}

/// Builds the column listing query. Empty arguments are not filtered on.
pub fn columns_query(catalog: &str, schema: &str, table: &str, column: &str) -> String {
    let mut query = COLUMNS_QUERY.to_string();
    for (name, pattern) in [
        ("table_cat", catalog),
        ("table_schem", schema),
        ("table_name", table),
        ("column_name", column),
    ] {
        if !pattern.is_empty() {
            push_filter(&mut query, name, pattern);
        }
    }
    query.push_str("ORDER BY table_cat, table_schem, table_name, ordinal_position\n");
    query
}

fn or_all(pattern: &str) -> &str {
    if pattern.is_empty() {
        SEARCH_ALL
    } else {
        pattern
    }
}

fn push_filter(query: &mut String, column: &str, pattern: &str) {
    let op = if pattern.contains('%') { "LIKE" } else { "=" };
    query.push_str(&format!("AND {column} {op} {}\n", quote(pattern)));
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
