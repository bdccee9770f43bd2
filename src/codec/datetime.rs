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


//! Parsing of the engine's textual date, time and timestamp values.
//!
//! The engine renders temporal values with fixed-width fields:
//!
//! - dates as `YYYY-MM-DD`
//! - times as `HH:MM:SS[.fraction]`
//! - timestamps as `YYYY-MM-DD HH:MM:SS[.fraction][ Zone/Name]`
//!
//! Timestamps carrying an IANA zone are normalised to UTC. Fractions of up
//! to twelve digits are accepted and reduced to nanoseconds by truncation.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Maximum number of fractional-second digits the engine emits.
pub const MAX_FRACTION_DIGITS: usize = 12;

const NANOS_DIGITS: usize = 9;

/// Failure to interpret a temporal literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateTimeError {
    #[error("'{0}' is too short for the expected layout")]
    TooShort(String),
    #[error("field '{field}' of '{input}' is not a number")]
    InvalidField { field: &'static str, input: String },
    #[error("'{0}' is not a valid calendar date or clock time")]
    OutOfRange(String),
    #[error("fraction '{0}' has more than 12 digits")]
    FractionTooLong(String),
    #[error("unknown time zone '{0}'")]
    UnknownZone(String),
    #[error("'{0}' does not exist in its time zone")]
    NonexistentLocalTime(String),
    #[error("unexpected trailing text in '{0}'")]
    TrailingText(String),
}

/// Calendar fields of a date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateParts {
    pub year: i16,
    pub month: u16,
    pub day: u16,
}

/// Clock fields of a time value. Fractional seconds are not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeParts {
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

/// A timestamp normalised to UTC with nanosecond fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampParts {
    pub date: DateParts,
    pub time: TimeParts,
    pub fraction: u32,
}

fn field<T: std::str::FromStr>(
    input: &str,
    range: std::ops::Range<usize>,
    name: &'static str,
) -> Result<T, DateTimeError> {
    input
        .get(range)
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DateTimeError::InvalidField {
            field: name,
            input: input.to_string(),
        })
}

/// Converts a string of fractional-second digits to nanoseconds.
///
/// Shorter fractions are scaled up, longer ones are truncated to nine
/// digits. Returns `None` if `digits` contains a non-digit or is longer
/// than [`MAX_FRACTION_DIGITS`].
pub fn fraction_to_nanos(digits: &str) -> Option<u32> {
    if digits.len() > MAX_FRACTION_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let kept = &digits[..digits.len().min(NANOS_DIGITS)];
    if kept.is_empty() {
        return Some(0);
    }
    let value: u32 = kept.parse().ok()?;
    Some(value * 10u32.pow((NANOS_DIGITS - kept.len()) as u32))
}

/// Parses `YYYY-MM-DD`.
pub fn parse_date(input: &str) -> Result<DateParts, DateTimeError> {
    if input.len() < 10 {
        return Err(DateTimeError::TooShort(input.to_string()));
    }
    let year: i32 = field(input, 0..4, "year")?;
    let month: u32 = field(input, 5..7, "month")?;
    let day: u32 = field(input, 8..10, "day")?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DateTimeError::OutOfRange(input.to_string()))?;
    date_parts(&date, input)
}

/// Parses `HH:MM:SS[.fraction]`, discarding the fraction.
pub fn parse_time(input: &str) -> Result<TimeParts, DateTimeError> {
    if input.len() < 8 {
        return Err(DateTimeError::TooShort(input.to_string()));
    }
    let hour: u32 = field(input, 0..2, "hour")?;
    let minute: u32 = field(input, 3..5, "minute")?;
    let second: u32 = field(input, 6..8, "second")?;
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| DateTimeError::OutOfRange(input.to_string()))?;
    Ok(TimeParts {
        hour: hour as u16,
        minute: minute as u16,
        second: second as u16,
    })
}

fn date_parts(date: &NaiveDate, input: &str) -> Result<DateParts, DateTimeError> {
    let year =
        i16::try_from(date.year()).map_err(|_| DateTimeError::OutOfRange(input.to_string()))?;
    Ok(DateParts {
        year,
        month: date.month() as u16,
        day: date.day() as u16,
    })
}

/// Timestamp parser holding a cache of resolved time zones.
///
/// A single result set tends to repeat the same zone on every row, so the
/// parser is meant to live as long as the result it decodes.
#[derive(Debug, Default)]
pub struct DateTimeParser {
    zones: HashMap<String, Tz>,
}

impl DateTimeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct zones resolved so far.
    pub fn cached_zone_count(&self) -> usize {
        self.zones.len()
    }

    fn zone(&mut self, name: &str) -> Result<Tz, DateTimeError> {
        if let Some(tz) = self.zones.get(name) {
            return Ok(*tz);
        }
        let tz: Tz = name
            .parse()
            .map_err(|_| DateTimeError::UnknownZone(name.to_string()))?;
        self.zones.insert(name.to_string(), tz);
        Ok(tz)
    }

    /// Parses a timestamp and normalises it to UTC.
    pub fn parse_timestamp(&mut self, input: &str) -> Result<TimestampParts, DateTimeError> {
        if input.len() < 19 {
            return Err(DateTimeError::TooShort(input.to_string()));
        }
        let year: i32 = field(input, 0..4, "year")?;
        let month: u32 = field(input, 5..7, "month")?;
        let day: u32 = field(input, 8..10, "day")?;
        let hour: u32 = field(input, 11..13, "hour")?;
        let minute: u32 = field(input, 14..16, "minute")?;
        let second: u32 = field(input, 17..19, "second")?;

        let mut rest = &input[19..];
        let mut nanos = 0;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let digit_count = after_dot
                .bytes()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let digits = &after_dot[..digit_count];
            nanos = fraction_to_nanos(digits)
                .ok_or_else(|| DateTimeError::FractionTooLong(digits.to_string()))?;
            rest = &after_dot[digit_count..];
        }

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_nano_opt(hour, minute, second, nanos))
            .ok_or_else(|| DateTimeError::OutOfRange(input.to_string()))?;

        let utc = if rest.is_empty() {
            naive
        } else {
            let zone_name = rest
                .strip_prefix(' ')
                .filter(|z| !z.is_empty())
                .ok_or_else(|| DateTimeError::TrailingText(input.to_string()))?;
            self.to_utc(naive, zone_name, input)?
        };

        Ok(TimestampParts {
            date: date_parts(&utc.date(), input)?,
            time: TimeParts {
                hour: utc.hour() as u16,
                minute: utc.minute() as u16,
                second: utc.second() as u16,
            },
            fraction: utc.nanosecond(),
        })
    }

    fn to_utc(
        &mut self,
        local: NaiveDateTime,
        zone_name: &str,
        input: &str,
    ) -> Result<NaiveDateTime, DateTimeError> {
        let tz = self.zone(zone_name)?;
        let zoned = tz
            .from_local_datetime(&local)
            .earliest()
            .ok_or_else(|| DateTimeError::NonexistentLocalTime(input.to_string()))?;
        Ok(zoned.naive_utc())
    }
}
