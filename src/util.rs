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


//! Delimited key/value parsing shared by connection strings and
//! `WWW-Authenticate` challenges.

use std::collections::BTreeMap;

/// Options controlling [`parse_delimited_kvps`].
#[derive(Debug, Clone, Copy)]
pub struct KvpStyle {
    pub delimiter: char,
    pub lowercase_keys: bool,
    pub trim_keys: bool,
    pub strip_double_quotes: bool,
}

/// `key=value;key2=value2`, as used by connection strings.
pub const SEMICOLON_STYLE: KvpStyle = KvpStyle {
    delimiter: ';',
    lowercase_keys: true,
    trim_keys: true,
    strip_double_quotes: false,
};

/// `key="value", key2="value2"`, as used by authentication challenges.
pub const COMMA_STYLE: KvpStyle = KvpStyle {
    delimiter: ',',
    lowercase_keys: true,
    trim_keys: true,
    strip_double_quotes: true,
};

/// Parses a delimited list of `key=value` pairs.
///
/// Parsing stops at the first segment without an `=`. Values keep any
/// `=` characters after the first one. Later duplicates win.
pub fn parse_delimited_kvps(input: &str, style: KvpStyle) -> BTreeMap<String, String> {
    let mut kvps = BTreeMap::new();
    for segment in input.split(style.delimiter) {
        if segment.is_empty() {
            break;
        }
        let Some((key, value)) = segment.split_once('=') else {
            break;
        };
        let mut key = if style.trim_keys { key.trim() } else { key };
        let mut value = value;
        if style.strip_double_quotes {
            key = strip_quotes(key);
            value = strip_quotes(value);
        }
        let key = if style.lowercase_keys {
            key.to_ascii_lowercase()
        } else {
            key.to_string()
        };
        kvps.insert(key, value.to_string());
    }
    kvps
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_kvps() {
        let kvps = parse_delimited_kvps(" HostName=https://trino;Port=8443;", SEMICOLON_STYLE);
        assert_eq!(kvps.get("hostname").map(String::as_str), Some("https://trino"));
        assert_eq!(kvps.get("port").map(String::as_str), Some("8443"));
    }

    #[test]
    fn test_comma_kvps_strip_quotes() {
        let header = r#"x_redirect_server="https://a/redirect", x_token_server="https://a/token?x=1""#;
        let kvps = parse_delimited_kvps(header, COMMA_STYLE);
        assert_eq!(kvps["x_redirect_server"], "https://a/redirect");
        assert_eq!(kvps["x_token_server"], "https://a/token?x=1");
    }

    #[test]
    fn test_stops_at_segment_without_equals() {
        let kvps = parse_delimited_kvps("a=1;broken;b=2", SEMICOLON_STYLE);
        assert_eq!(kvps.len(), 1);
        assert!(kvps.contains_key("a"));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_delimited_kvps("", COMMA_STYLE).is_empty());
    }
}
