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


//! Mapping from engine column types to ODBC SQL type attributes.

use super::ColumnDescriptor;

// SQL type codes.
pub const SQL_ALL_TYPES: i16 = 0;
pub const SQL_DECIMAL: i16 = 3;
pub const SQL_INTEGER: i16 = 4;
pub const SQL_SMALLINT: i16 = 5;
pub const SQL_REAL: i16 = 7;
pub const SQL_DOUBLE: i16 = 8;
pub const SQL_DATE: i16 = 9;
pub const SQL_TIME: i16 = 10;
pub const SQL_TIMESTAMP: i16 = 11;
pub const SQL_VARCHAR: i16 = 12;
pub const SQL_TYPE_DATE: i16 = 91;
pub const SQL_TYPE_TIME: i16 = 92;
pub const SQL_TYPE_TIMESTAMP: i16 = 93;
pub const SQL_VARBINARY: i16 = -3;
pub const SQL_BIGINT: i16 = -5;
pub const SQL_TINYINT: i16 = -6;
pub const SQL_BIT: i16 = -7;
pub const SQL_WVARCHAR: i16 = -9;
pub const SQL_GUID: i16 = -11;

/// Column size reported when the length is unknown.
pub const SQL_NO_TOTAL: i64 = -4;

const DATE_STRUCT_SIZE: i64 = 6;
const TIME_STRUCT_SIZE: i64 = 6;
const TIMESTAMP_STRUCT_SIZE: i64 = 16;
const GUID_STRUCT_SIZE: i64 = 16;

/// Fixed SQL attributes of an engine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTypeMapping {
    pub sql_type: i16,
    /// Size in bytes, or [`SQL_NO_TOTAL`] for variable-length types.
    pub size: i64,
    pub unsigned: bool,
    pub radix: Option<i16>,
    /// Precision in bits for binary numeric types.
    pub precision: Option<u8>,
}

impl SqlTypeMapping {
    const fn fixed(sql_type: i16, size: i64) -> Self {
        Self {
            sql_type,
            size,
            unsigned: true,
            radix: None,
            precision: None,
        }
    }

    const fn binary_numeric(sql_type: i16, size: i64, bits: u8) -> Self {
        Self {
            sql_type,
            size,
            unsigned: false,
            radix: Some(2),
            precision: Some(bits),
        }
    }
}

/// Looks up the SQL attributes of an unparameterised engine type such as
/// `bigint` or `timestamp with time zone`.
pub fn sql_type_mapping(raw_type: &str) -> Option<SqlTypeMapping> {
    let mapping = match raw_type {
        "bigint" => SqlTypeMapping::binary_numeric(SQL_BIGINT, 8, 64),
        "integer" => SqlTypeMapping::binary_numeric(SQL_INTEGER, 4, 32),
        "smallint" => SqlTypeMapping::binary_numeric(SQL_SMALLINT, 2, 16),
        "tinyint" => SqlTypeMapping::binary_numeric(SQL_TINYINT, 1, 8),
        "double" => SqlTypeMapping::binary_numeric(SQL_DOUBLE, 8, 53),
        "real" => SqlTypeMapping::binary_numeric(SQL_REAL, 4, 24),
        "boolean" => SqlTypeMapping::fixed(SQL_BIT, 1),
        "varchar" => SqlTypeMapping::fixed(SQL_VARCHAR, SQL_NO_TOTAL),
        "uuid" => SqlTypeMapping::fixed(SQL_GUID, GUID_STRUCT_SIZE),
        "decimal" => SqlTypeMapping {
            sql_type: SQL_DECIMAL,
            size: SQL_NO_TOTAL,
            unsigned: false,
            radix: Some(10),
            precision: None,
        },
        "date" => SqlTypeMapping::fixed(SQL_TYPE_DATE, DATE_STRUCT_SIZE),
        "time" => SqlTypeMapping::fixed(SQL_TYPE_TIME, TIME_STRUCT_SIZE),
        "timestamp" | "timestamp with time zone" => {
            SqlTypeMapping::fixed(SQL_TYPE_TIMESTAMP, TIMESTAMP_STRUCT_SIZE)
        }
        _ => return None,
    };
    Some(mapping)
}

/// What a caller learns about a result column when describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedColumn {
    pub name: String,
    pub raw_type: String,
    /// `None` for engine types with no SQL mapping.
    pub sql_type: Option<i16>,
    pub column_size: Option<i64>,
    pub decimal_digits: i16,
    pub precision: u8,
    pub radix: Option<i16>,
    pub unsigned: bool,
    /// The engine does not report nullability, so every column is nullable.
    pub nullable: bool,
}

impl DescribedColumn {
    pub fn from_descriptor(column: &ColumnDescriptor) -> Self {
        let raw_type = column.raw_type();
        let mapping = sql_type_mapping(raw_type);
        let column_size = match raw_type {
            "varchar" => Some(column.length().unwrap_or(SQL_NO_TOTAL)),
            "decimal" => column.precision().map(i64::from).or(Some(SQL_NO_TOTAL)),
            _ => mapping.map(|m| m.size),
        };
        let precision = match raw_type {
            "decimal" => column.precision().unwrap_or(0),
            _ => mapping.and_then(|m| m.precision).unwrap_or(0),
        };
        Self {
            name: column.name.clone(),
            raw_type: raw_type.to_string(),
            sql_type: mapping.map(|m| m.sql_type),
            column_size,
            decimal_digits: column.scale().map(i16::from).unwrap_or(0),
            precision,
            radix: mapping.and_then(|m| m.radix),
            unsigned: mapping.is_some_and(|m| m.unsigned),
            nullable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_and_float_mappings() {
        let bigint = sql_type_mapping("bigint").unwrap();
        assert_eq!(bigint.sql_type, SQL_BIGINT);
        assert_eq!(bigint.size, 8);
        assert_eq!(bigint.radix, Some(2));
        assert_eq!(bigint.precision, Some(64));
        assert!(!bigint.unsigned);

        let double = sql_type_mapping("double").unwrap();
        assert_eq!(double.precision, Some(53));
        assert_eq!(sql_type_mapping("boolean").unwrap().sql_type, SQL_BIT);
        assert_eq!(sql_type_mapping("uuid").unwrap().size, 16);
    }

    #[test]
    fn test_zoned_timestamp_maps_like_timestamp() {
        assert_eq!(
            sql_type_mapping("timestamp with time zone"),
            sql_type_mapping("timestamp")
        );
        assert_eq!(sql_type_mapping("timestamp").unwrap().size, 16);
        assert!(sql_type_mapping("array").is_none());
    }

    #[test]
    fn test_describe_decimal_and_varchar() {
        let amount = DescribedColumn::from_descriptor(&ColumnDescriptor::new(
            "amount",
            "decimal(10,2)",
            "decimal",
            &[10, 2],
        ));
        assert_eq!(amount.sql_type, Some(SQL_DECIMAL));
        assert_eq!(amount.column_size, Some(10));
        assert_eq!(amount.precision, 10);
        assert_eq!(amount.decimal_digits, 2);
        assert_eq!(amount.radix, Some(10));

        let name = DescribedColumn::from_descriptor(&ColumnDescriptor::new(
            "name",
            "varchar(40)",
            "varchar",
            &[40],
        ));
        assert_eq!(name.sql_type, Some(SQL_VARCHAR));
        assert_eq!(name.column_size, Some(40));
        assert_eq!(name.decimal_digits, 0);
        assert!(name.unsigned);
        assert!(name.nullable);

        let unbounded = DescribedColumn::from_descriptor(&ColumnDescriptor::new(
            "v", "varchar", "varchar", &[],
        ));
        assert_eq!(unbounded.column_size, Some(SQL_NO_TOTAL));
    }

    #[test]
    fn test_describe_unmapped_type() {
        let tags = DescribedColumn::from_descriptor(&ColumnDescriptor::new(
            "tags",
            "array(varchar)",
            "array",
            &[],
        ));
        assert_eq!(tags.name, "tags");
        assert_eq!(tags.sql_type, None);
        assert_eq!(tags.column_size, None);
        assert!(!tags.unsigned);
    }
}
