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


//! Packed exact-numeric encoding (`SQL_NUMERIC_STRUCT`).

/// Width of the little-endian magnitude field.
pub const NUMERIC_VALUE_LEN: usize = 16;

/// Size in bytes of the encoded structure.
pub const NUMERIC_STRUCT_LEN: usize = 3 + NUMERIC_VALUE_LEN;

/// An exact numeric value in the ODBC numeric layout.
///
/// `val` holds the unscaled magnitude in little-endian order; `sign` is 1
/// for positive values (including zero) and 0 for negative ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlNumeric {
    pub precision: u8,
    pub scale: i8,
    pub sign: u8,
    pub val: [u8; NUMERIC_VALUE_LEN],
}

impl SqlNumeric {
    /// Parses a textual decimal using the column's declared precision and scale.
    ///
    /// The fractional digits are padded with zeros or truncated so the
    /// magnitude is expressed in units of `10^-scale`. Returns `None` for
    /// malformed text or magnitudes that do not fit in 128 bits.
    pub fn parse(text: &str, precision: u8, scale: i8) -> Option<Self> {
        let text = text.trim();
        let (negative, unsigned) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        let digits_ok = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !digits_ok(whole) || !digits_ok(fraction) {
            return None;
        }

        let scale_digits = scale.max(0) as usize;
        let mut magnitude: u128 = 0;
        let fraction_digits = fraction
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(scale_digits);
        for digit in whole.bytes().chain(fraction_digits) {
            magnitude = magnitude
                .checked_mul(10)?
                .checked_add(u128::from(digit - b'0'))?;
        }

        Some(Self {
            precision,
            scale,
            sign: u8::from(!negative || magnitude == 0),
            val: magnitude.to_le_bytes(),
        })
    }

    /// Serialises the structure in its C layout.
    pub fn to_bytes(&self) -> [u8; NUMERIC_STRUCT_LEN] {
        let mut out = [0u8; NUMERIC_STRUCT_LEN];
        out[0] = self.precision;
        out[1] = self.scale as u8;
        out[2] = self.sign;
        out[3..].copy_from_slice(&self.val);
        out
    }
}
