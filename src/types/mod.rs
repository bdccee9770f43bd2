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


//! Wire types for the engine's statement and info endpoints.

pub mod mapping;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use mapping::{sql_type_mapping, DescribedColumn, SqlTypeMapping};

/// One result row, in column order.
pub type Row = Vec<Value>;

/// Body of every `/v1/statement` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    #[serde(default, alias = "id")]
    pub query_id: Option<String>,
    #[serde(default)]
    pub info_uri: Option<String>,
    #[serde(default)]
    pub next_uri: Option<String>,
    #[serde(default)]
    pub partial_cancel_uri: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<ColumnDescriptor>>,
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub stats: Option<QueryStats>,
    #[serde(default)]
    pub error: Option<QueryError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    #[serde(default)]
    pub state: String,
}

/// Failure reported by the engine for a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// A result column: display name, declared type and parsed signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub type_signature: TypeSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSignature {
    #[serde(default)]
    pub raw_type: String,
    #[serde(default)]
    pub arguments: Vec<TypeArgument>,
}

/// A type parameter such as a decimal's precision, as `{kind, value}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeArgument {
    pub kind: String,
    pub value: Value,
}

impl ColumnDescriptor {
    pub fn new(name: &str, type_name: &str, raw_type: &str, arguments: &[i64]) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            type_signature: TypeSignature {
                raw_type: raw_type.to_string(),
                arguments: arguments
                    .iter()
                    .map(|v| TypeArgument {
                        kind: "LONG".to_string(),
                        value: Value::from(*v),
                    })
                    .collect(),
            },
        }
    }

    /// Unparameterised type name, e.g. `decimal` for `decimal(10,2)`.
    pub fn raw_type(&self) -> &str {
        if self.type_signature.raw_type.is_empty() {
            self.type_name
                .split('(')
                .next()
                .unwrap_or(&self.type_name)
        } else {
            &self.type_signature.raw_type
        }
    }

    fn long_argument(&self, index: usize) -> Option<i64> {
        self.type_signature
            .arguments
            .iter()
            .filter(|a| a.kind.eq_ignore_ascii_case("long"))
            .nth(index)
            .and_then(|a| a.value.as_i64())
    }

    /// Declared precision of a decimal column.
    pub fn precision(&self) -> Option<u8> {
        match self.raw_type() {
            "decimal" => self.long_argument(0).and_then(|p| u8::try_from(p).ok()),
            _ => None,
        }
    }

    /// Declared scale of a decimal column.
    pub fn scale(&self) -> Option<i8> {
        match self.raw_type() {
            "decimal" => self.long_argument(1).and_then(|s| i8::try_from(s).ok()),
            _ => None,
        }
    }

    /// Declared length of a bounded character column.
    pub fn length(&self) -> Option<i64> {
        match self.raw_type() {
            "varchar" | "char" | "varbinary" => self.long_argument(0),
            _ => None,
        }
    }
}

/// Body of `/v1/info`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    #[serde(default)]
    pub node_version: NodeVersion,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub starting: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeVersion {
    #[serde(default)]
    pub version: String,
}
