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


//! Binary GUID encoding (`SQLGUID`).

/// Size in bytes of the encoded structure.
pub const GUID_STRUCT_LEN: usize = 16;

/// A GUID split into the Windows `Data1..Data4` groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl SqlGuid {
    /// Parses the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    pub fn parse(text: &str) -> Option<Self> {
        let groups: Vec<&str> = text.trim().split('-').collect();
        let [g1, g2, g3, g4, g5] = groups.as_slice() else {
            return None;
        };
        if g1.len() != 8 || g2.len() != 4 || g3.len() != 4 || g4.len() != 4 || g5.len() != 12 {
            return None;
        }
        let data1 = u32::from_str_radix(g1, 16).ok()?;
        let data2 = u16::from_str_radix(g2, 16).ok()?;
        let data3 = u16::from_str_radix(g3, 16).ok()?;

        // Data4 keeps the textual byte order of the last two groups.
        let mut data4 = [0u8; 8];
        let tail = format!("{g4}{g5}");
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(tail.get(i * 2..i * 2 + 2)?, 16).ok()?;
        }
        Some(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }

    /// Serialises the structure in its native-endian C layout.
    pub fn to_bytes(&self) -> [u8; GUID_STRUCT_LEN] {
        let mut out = [0u8; GUID_STRUCT_LEN];
        out[0..4].copy_from_slice(&self.data1.to_ne_bytes());
        out[4..6].copy_from_slice(&self.data2.to_ne_bytes());
        out[6..8].copy_from_slice(&self.data3.to_ne_bytes());
        out[8..].copy_from_slice(&self.data4);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guid() {
        let guid = SqlGuid::parse("12345678-9abc-def0-1234-56789abcdef0").unwrap();
        assert_eq!(guid.data1, 0x1234_5678);
        assert_eq!(guid.data2, 0x9abc);
        assert_eq!(guid.data3, 0xdef0);
        assert_eq!(guid.data4, [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]);
    }

    #[test]
    fn test_guid_bytes() {
        let guid = SqlGuid::parse("00000001-0002-0003-0405-060708090a0b").unwrap();
        let bytes = guid.to_bytes();
        assert_eq!(&bytes[0..4], &1u32.to_ne_bytes());
        assert_eq!(&bytes[8..], &[4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(SqlGuid::parse("not-a-guid").is_none());
        assert!(SqlGuid::parse("12345678-9abc-def0-1234-56789abcdefz").is_none());
        assert!(SqlGuid::parse("1234567-89abc-def0-1234-56789abcdef0").is_none());
    }
}
