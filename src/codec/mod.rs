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


//! Row marshalling into caller-supplied buffers.
//!
//! A [`RowCodec`] writes one JSON cell of a result row into a byte buffer
//! using the binary layout implied by an ODBC C data type code. Fixed-width
//! targets are written in native byte order; character targets are always
//! null-terminated and report the full source length so the caller can
//! detect right truncation.
//!
//! [`write_cell_raw`] is the only entry point that touches raw memory. All
//! other code works on slices.

pub mod datetime;
pub mod decimal;
pub mod guid;

use datetime::{parse_date, parse_time, DateParts, DateTimeParser, TimeParts, TimestampParts};
use decimal::{SqlNumeric, NUMERIC_STRUCT_LEN};
use guid::{SqlGuid, GUID_STRUCT_LEN};
use serde_json::Value;

/// Indicator value reporting a null cell.
pub const SQL_NULL_DATA: isize = -1;

pub const DATE_STRUCT_LEN: usize = 6;
pub const TIME_STRUCT_LEN: usize = 6;
pub const TIMESTAMP_STRUCT_LEN: usize = 16;

/// Target encodings understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CDataType {
    Char,
    Numeric,
    Guid,
    Date,
    Time,
    Timestamp,
    Bit,
    TinyInt,
    Short,
    Long,
    BigInt,
    Float,
    Double,
}

impl CDataType {
    /// Maps an ODBC `SQL_C_*` code to a target encoding.
    pub fn from_code(code: i16) -> Option<Self> {
        let ty = match code {
            1 => CDataType::Char,
            2 => CDataType::Numeric,
            -11 => CDataType::Guid,
            9 | 91 => CDataType::Date,
            10 | 92 => CDataType::Time,
            11 | 93 => CDataType::Timestamp,
            -7 => CDataType::Bit,
            -6 | -26 => CDataType::TinyInt,
            5 | -15 => CDataType::Short,
            4 | -16 => CDataType::Long,
            -5 | -25 => CDataType::BigInt,
            7 => CDataType::Float,
            8 => CDataType::Double,
            _ => return None,
        };
        Some(ty)
    }

    /// Size of the encoded value, or `None` for variable-length targets.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            CDataType::Char => None,
            CDataType::Numeric => Some(NUMERIC_STRUCT_LEN),
            CDataType::Guid => Some(GUID_STRUCT_LEN),
            CDataType::Date => Some(DATE_STRUCT_LEN),
            CDataType::Time => Some(TIME_STRUCT_LEN),
            CDataType::Timestamp => Some(TIMESTAMP_STRUCT_LEN),
            CDataType::Bit | CDataType::TinyInt => Some(1),
            CDataType::Short => Some(2),
            CDataType::Long | CDataType::Float => Some(4),
            CDataType::BigInt | CDataType::Double => Some(8),
        }
    }

    pub fn is_variable_length(&self) -> bool {
        self.fixed_width().is_none()
    }
}

/// Declared precision and scale of the source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericMeta {
    pub precision: u8,
    pub scale: i8,
}

/// Where a cell is written.
#[derive(Debug)]
pub struct CellTarget<'a> {
    pub buffer: &'a mut [u8],
    pub indicator: Option<&'a mut isize>,
}

impl<'a> CellTarget<'a> {
    pub fn new(buffer: &'a mut [u8], indicator: Option<&'a mut isize>) -> Self {
        Self { buffer, indicator }
    }

    fn set_indicator(&mut self, value: isize) {
        if let Some(indicator) = self.indicator.as_deref_mut() {
            *indicator = value;
        }
    }

    fn put(&mut self, bytes: &[u8]) -> bool {
        match self.buffer.get_mut(..bytes.len()) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                self.set_indicator(bytes.len() as isize);
                true
            }
            None => false,
        }
    }
}

/// Outcome of writing a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStatus {
    pub success: bool,
    pub is_variable_length: bool,
}

impl CellStatus {
    fn failed() -> Self {
        Self::default()
    }
}

/// Writes cells of one result set. Holds the time zone cache used by
/// timestamp conversion.
#[derive(Debug, Default)]
pub struct RowCodec {
    parser: DateTimeParser,
}

impl RowCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the 1-based `column` of `row` into `target` as `c_type`.
    ///
    /// A JSON null sets the indicator to [`SQL_NULL_DATA`] and leaves the
    /// buffer untouched. Unknown type codes, out-of-range columns, and values
    /// that cannot be represented in the target report `success: false`.
    pub fn write_cell(
        &mut self,
        c_type: i16,
        row: &[Value],
        column: usize,
        mut target: CellTarget<'_>,
        meta: NumericMeta,
    ) -> CellStatus {
        let Some(value) = column.checked_sub(1).and_then(|i| row.get(i)) else {
            return CellStatus::failed();
        };
        let Some(ty) = CDataType::from_code(c_type) else {
            return CellStatus::failed();
        };
        let is_variable_length = ty.is_variable_length();
        if value.is_null() {
            target.set_indicator(SQL_NULL_DATA);
            return CellStatus {
                success: true,
                is_variable_length,
            };
        }
        let success = match ty {
            CDataType::Char => write_char(value, &mut target),
            CDataType::Numeric => numeric_text(value)
                .and_then(|text| SqlNumeric::parse(&text, meta.precision, meta.scale))
                .is_some_and(|n| target.put(&n.to_bytes())),
            CDataType::Guid => value
                .as_str()
                .and_then(SqlGuid::parse)
                .is_some_and(|g| target.put(&g.to_bytes())),
            CDataType::Date => value
                .as_str()
                .and_then(|s| parse_date(s).ok())
                .is_some_and(|d| target.put(&date_bytes(&d))),
            CDataType::Time => value
                .as_str()
                .and_then(|s| parse_time(s).ok())
                .is_some_and(|t| target.put(&time_bytes(&t))),
            CDataType::Timestamp => value
                .as_str()
                .and_then(|s| self.timestamp(s))
                .is_some_and(|ts| target.put(&timestamp_bytes(&ts))),
            CDataType::Bit => bit_value(value).is_some_and(|v| target.put(&v.to_ne_bytes())),
            CDataType::TinyInt => int_value::<i8>(value).is_some_and(|v| target.put(&v.to_ne_bytes())),
            CDataType::Short => int_value::<i16>(value).is_some_and(|v| target.put(&v.to_ne_bytes())),
            CDataType::Long => int_value::<i32>(value).is_some_and(|v| target.put(&v.to_ne_bytes())),
            CDataType::BigInt => int_value::<i64>(value).is_some_and(|v| target.put(&v.to_ne_bytes())),
            CDataType::Float => float_value(value)
                .and_then(narrow_f32)
                .is_some_and(|v| target.put(&v.to_ne_bytes())),
            CDataType::Double => float_value(value).is_some_and(|v| target.put(&v.to_ne_bytes())),
        };
        CellStatus {
            success,
            is_variable_length,
        }
    }

    fn timestamp(&mut self, text: &str) -> Option<TimestampParts> {
        if text.len() == 10 {
            let date = parse_date(text).ok()?;
            return Some(TimestampParts {
                date,
                ..TimestampParts::default()
            });
        }
        self.parser.parse_timestamp(text).ok()
    }
}

/// Writes a cell into raw caller memory.
///
/// `capacity` is only consulted for variable-length targets; fixed-width
/// targets are written with their own size.
///
/// # Safety
///
/// `buffer` must be valid for writes of `capacity` bytes for character
/// targets, and of the target's fixed width otherwise. `indicator` must be
/// null or valid for a single `isize` write. Neither may alias `row`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn write_cell_raw(
    codec: &mut RowCodec,
    c_type: i16,
    row: &[Value],
    column: usize,
    buffer: *mut u8,
    capacity: isize,
    indicator: *mut isize,
    meta: NumericMeta,
) -> CellStatus {
    let Some(ty) = CDataType::from_code(c_type) else {
        return CellStatus::failed();
    };
    let len = ty
        .fixed_width()
        .unwrap_or_else(|| usize::try_from(capacity).unwrap_or(0));
    let buffer: &mut [u8] = if buffer.is_null() || len == 0 {
        &mut []
    } else {
        // SAFETY: the caller guarantees `buffer` is writable for `len` bytes.
        unsafe { std::slice::from_raw_parts_mut(buffer, len) }
    };
    // SAFETY: the caller guarantees `indicator` is null or writable.
    let indicator = unsafe { indicator.as_mut() };
    codec.write_cell(c_type, row, column, CellTarget::new(buffer, indicator), meta)
}

fn write_char(value: &Value, target: &mut CellTarget<'_>) -> bool {
    let rendered;
    let text = match value {
        Value::String(s) => s.as_str(),
        other => {
            rendered = other.to_string();
            rendered.as_str()
        }
    };
    let bytes = text.as_bytes();
    if let Some(room) = target.buffer.len().checked_sub(1) {
        let copied = bytes.len().min(room);
        target.buffer[..copied].copy_from_slice(&bytes[..copied]);
        target.buffer[copied] = 0;
    }
    target.set_indicator(bytes.len() as isize);
    true
}

fn numeric_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bit_value(value: &Value) -> Option<i8> {
    match value {
        Value::Bool(b) => Some(i8::from(*b)),
        other => int_value::<i8>(other),
    }
}

fn int_value<T: TryFrom<i64>>(value: &Value) -> Option<T> {
    let wide = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    T::try_from(wide).ok()
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.trim().parse().ok(),
        },
        _ => None,
    }
}

fn narrow_f32(value: f64) -> Option<f32> {
    let narrowed = value as f32;
    if value.is_finite() && narrowed.is_infinite() {
        return None;
    }
    Some(narrowed)
}

fn date_bytes(date: &DateParts) -> [u8; DATE_STRUCT_LEN] {
    let mut out = [0u8; DATE_STRUCT_LEN];
    out[0..2].copy_from_slice(&date.year.to_ne_bytes());
    out[2..4].copy_from_slice(&date.month.to_ne_bytes());
    out[4..6].copy_from_slice(&date.day.to_ne_bytes());
    out
}

fn time_bytes(time: &TimeParts) -> [u8; TIME_STRUCT_LEN] {
    let mut out = [0u8; TIME_STRUCT_LEN];
    out[0..2].copy_from_slice(&time.hour.to_ne_bytes());
    out[2..4].copy_from_slice(&time.minute.to_ne_bytes());
    out[4..6].copy_from_slice(&time.second.to_ne_bytes());
    out
}

fn timestamp_bytes(ts: &TimestampParts) -> [u8; TIMESTAMP_STRUCT_LEN] {
    let mut out = [0u8; TIMESTAMP_STRUCT_LEN];
    out[0..6].copy_from_slice(&date_bytes(&ts.date));
    out[6..12].copy_from_slice(&time_bytes(&ts.time));
    out[12..16].copy_from_slice(&ts.fraction.to_ne_bytes());
    out
}
