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


//! Result set handling for query results.
//!
//! [`ResultSet::from_query`] drains a posted [`Query`] into Arrow record
//! batches. Rows are released from the query as each batch is built, so at
//! most one engine page plus one batch is held at a time.

use crate::error::{Result, TrinoErrorHelper};
use crate::query::{PollMode, Query};
use crate::types::{ColumnDescriptor, Row};
use arrow_array::builder::{
    BooleanBuilder, Float32Builder, Float64Builder, Int16Builder, Int32Builder, Int64Builder,
    Int8Builder, StringBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Represents a result set from a query execution.
#[derive(Debug)]
pub struct ResultSet {
    schema: Option<SchemaRef>,
    batches: Vec<RecordBatch>,
    current_index: usize,
}

impl ResultSet {
    /// Creates an empty result set.
    pub fn empty() -> Self {
        Self {
            schema: None,
            batches: Vec::new(),
            current_index: 0,
        }
    }

    /// Creates a result set with the given schema and batches.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            schema: Some(schema),
            batches,
            current_index: 0,
        }
    }

    /// Reads every remaining row of a posted query into batches of at most
    /// `batch_size` rows.
    pub fn from_query(query: &mut Query, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(TrinoErrorHelper::invalid_argument()
                .message("batch size must be positive")
                .context("build result set"));
        }
        let schema = schema_for(query.column_descriptions()?);
        let mut batches = Vec::new();
        let mut next_index = query.row_offset_position() + 1;
        loop {
            if let Some(error) = query.error() {
                return Err(TrinoErrorHelper::protocol()
                    .message(error.message.clone())
                    .context("build result set"));
            }
            let available = usize::try_from(query.current_row_count() - next_index).unwrap_or(0);
            if available >= batch_size || (available > 0 && query.is_completed()) {
                let take = available.min(batch_size);
                let rows: Vec<&Row> = (next_index..next_index + take as i64)
                    .filter_map(|i| query.row_at_index(i))
                    .collect();
                batches.push(build_batch(&schema, &rows)?);
                next_index += take as i64;
                query.checkpoint_row_position(next_index - 1);
                continue;
            }
            if query.is_completed() {
                break;
            }
            query.poll(PollMode::UntilNewData)?;
        }
        debug!(
            query_id = %query.query_id(),
            batches = batches.len(),
            rows = next_index,
            "built result set"
        );
        Ok(Self::new(schema, batches))
    }

    /// Returns the schema of the result set.
    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    /// Returns the total number of batches.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Returns the total number of rows across all batches.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Fetches the next record batch.
    pub fn next_batch(&mut self) -> Result<Option<&RecordBatch>> {
        if self.current_index >= self.batches.len() {
            return Ok(None);
        }
        let batch = &self.batches[self.current_index];
        self.current_index += 1;
        Ok(Some(batch))
    }

    /// Resets the iterator to the beginning.
    pub fn reset(&mut self) {
        self.current_index = 0;
    }

    /// Closes the result set and releases resources.
    pub fn close(&mut self) -> Result<()> {
        self.batches.clear();
        self.current_index = 0;
        Ok(())
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Arrow type for a Trino type. Types without a native mapping are text.
pub fn arrow_type(raw_type: &str) -> DataType {
    match raw_type {
        "boolean" => DataType::Boolean,
        "tinyint" => DataType::Int8,
        "smallint" => DataType::Int16,
        "integer" => DataType::Int32,
        "bigint" => DataType::Int64,
        "real" => DataType::Float32,
        "double" => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn schema_for(columns: &[ColumnDescriptor]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.raw_type()), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn build_batch(schema: &SchemaRef, rows: &[&Row]) -> Result<RecordBatch> {
    let arrays = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| build_array(field, i, rows))
        .collect::<Result<Vec<_>>>()?;
    RecordBatch::try_new(Arc::clone(schema), arrays).map_err(|e| {
        TrinoErrorHelper::internal()
            .message(e.to_string())
            .context("build record batch")
    })
}

static NULL: Value = Value::Null;

fn build_array(field: &Field, index: usize, rows: &[&Row]) -> Result<ArrayRef> {
    let cells = rows.iter().map(|row| row.get(index).unwrap_or(&NULL));
    let array: ArrayRef = match field.data_type() {
        DataType::Boolean => {
            let mut b = BooleanBuilder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, Value::as_bool)?);
            }
            Arc::new(b.finish())
        }
        DataType::Int8 => {
            let mut b = Int8Builder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, |v| v.as_i64().and_then(|n| i8::try_from(n).ok()))?);
            }
            Arc::new(b.finish())
        }
        DataType::Int16 => {
            let mut b = Int16Builder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, |v| v.as_i64().and_then(|n| i16::try_from(n).ok()))?);
            }
            Arc::new(b.finish())
        }
        DataType::Int32 => {
            let mut b = Int32Builder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, |v| v.as_i64().and_then(|n| i32::try_from(n).ok()))?);
            }
            Arc::new(b.finish())
        }
        DataType::Int64 => {
            let mut b = Int64Builder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, Value::as_i64)?);
            }
            Arc::new(b.finish())
        }
        DataType::Float32 => {
            let mut b = Float32Builder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, |v| float(v).map(|f| f as f32))?);
            }
            Arc::new(b.finish())
        }
        DataType::Float64 => {
            let mut b = Float64Builder::with_capacity(rows.len());
            for cell in cells {
                b.append_option(convert(field, cell, float)?);
            }
            Arc::new(b.finish())
        }
        _ => {
            let mut b = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
            for cell in cells {
                match cell {
                    Value::Null => b.append_null(),
                    Value::String(s) => b.append_value(s),
                    other => b.append_value(other.to_string()),
                }
            }
            Arc::new(b.finish())
        }
    };
    Ok(array)
}

fn convert<T>(field: &Field, cell: &Value, f: impl Fn(&Value) -> Option<T>) -> Result<Option<T>> {
    if cell.is_null() {
        return Ok(None);
    }
    f(cell).map(Some).ok_or_else(|| {
        TrinoErrorHelper::protocol()
            .message(format!("value {cell} does not fit {}", field.data_type()))
            .context(format!("read column '{}'", field.name()))
    })
}

// Non-finite doubles arrive as strings.
fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::client::{ScriptedBackend, Transport};
    use arrow_array::{Array, Float64Array, Int32Array, StringArray};
    use parking_lot::Mutex;
    use serde_json::json;

    const NEXT: &str = "http://trino:8080/v1/statement/executing/q1";

    #[test]
    fn test_empty_result_set() {
        let mut rs = ResultSet::empty();
        assert!(rs.schema().is_none());
        assert_eq!(rs.batch_count(), 0);
        assert_eq!(rs.row_count(), 0);
        assert!(rs.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_result_set_close() {
        let mut rs = ResultSet::empty();
        assert!(rs.close().is_ok());
    }

    #[test]
    fn test_arrow_type_mapping() {
        assert_eq!(arrow_type("integer"), DataType::Int32);
        assert_eq!(arrow_type("double"), DataType::Float64);
        assert_eq!(arrow_type("decimal"), DataType::Utf8);
        assert_eq!(arrow_type("timestamp"), DataType::Utf8);
    }

    fn posted_query(backend: &ScriptedBackend) -> Query {
        let transport = Transport::new(
            "http://trino",
            8080,
            Box::new(NoAuth::new("tester")),
            Box::new(backend.clone()),
        );
        let mut query = Query::new(Arc::new(Mutex::new(transport)));
        query.set_sleep_fn(|_| {});
        backend.push_json(200, json!({"id": "q1", "nextUri": format!("{NEXT}/1")}));
        query.set_query("SELECT n, x, label FROM t");
        query.post().unwrap();
        query
    }

    fn columns() -> Value {
        json!([
            {"name": "n", "type": "integer", "typeSignature": {"rawType": "integer", "arguments": []}},
            {"name": "x", "type": "double", "typeSignature": {"rawType": "double", "arguments": []}},
            {"name": "label", "type": "array(varchar)", "typeSignature": {"rawType": "array", "arguments": []}}
        ])
    }

    #[test]
    fn test_from_query_batches_and_releases_rows() {
        let backend = ScriptedBackend::new();
        let mut query = posted_query(&backend);
        backend.push_json(200, json!({
            "id": "q1",
            "nextUri": format!("{NEXT}/2"),
            "columns": columns(),
            "data": [[1, 1.5, ["a"]], [2, "NaN", null], [3, null, ["b", "c"]]]
        }));
        backend.push_json(200, json!({"id": "q1", "data": [[4, 0.0, []]]}));

        let mut rs = ResultSet::from_query(&mut query, 2).unwrap();
        assert_eq!(rs.batch_count(), 2);
        assert_eq!(rs.row_count(), 4);
        assert_eq!(query.buffered_row_count(), 0);

        let schema = rs.schema().unwrap().clone();
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);

        let first = rs.next_batch().unwrap().unwrap();
        assert_eq!(first.num_rows(), 2);
        let n = first.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(n.value(1), 2);
        let x = first.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert!(x.value(1).is_nan());
        let label = first.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(label.value(0), r#"["a"]"#);
        assert!(label.is_null(1));

        let second = rs.next_batch().unwrap().unwrap();
        assert_eq!(second.num_rows(), 2);
        assert!(rs.next_batch().unwrap().is_none());
        rs.reset();
        assert!(rs.next_batch().unwrap().is_some());
    }

    #[test]
    fn test_from_query_rejects_mismatched_value() {
        let backend = ScriptedBackend::new();
        let mut query = posted_query(&backend);
        backend.push_json(200, json!({"id": "q1", "columns": columns(), "data": [["one", 1.0, null]]}));
        let err = ResultSet::from_query(&mut query, 10).unwrap_err();
        assert!(err.to_string().contains("read column 'n'"));
    }

    #[test]
    fn test_from_query_zero_batch_size() {
        let backend = ScriptedBackend::new();
        let mut query = posted_query(&backend);
        assert!(ResultSet::from_query(&mut query, 0).is_err());
    }
}
