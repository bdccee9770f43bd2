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


//! Scoped encryption of persisted secrets.
//!
//! Secrets are sealed with AES-256-GCM under a key derived from local
//! machine and account identifiers:
//!
//! - [`SecretEncryptionLevel::User`] mixes in the OS user name and home
//!   directory, so only the same account on the same machine can decrypt.
//! - [`SecretEncryptionLevel::System`] uses machine identifiers only, so any
//!   account on the machine can decrypt.
//!
//! The stored form is `<level>:<base64(nonce || ciphertext)>`, which lets
//! secrets sealed at different levels live side by side in one file.

use crate::error::{Result, TrinoErrorHelper};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const NONCE_LEN: usize = 12;

/// Who may decrypt a persisted secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretEncryptionLevel {
    #[default]
    User,
    System,
}

impl SecretEncryptionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretEncryptionLevel::User => "user",
            SecretEncryptionLevel::System => "system",
        }
    }
}

impl fmt::Display for SecretEncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretEncryptionLevel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(SecretEncryptionLevel::User),
            "system" => Ok(SecretEncryptionLevel::System),
            other => Err(TrinoErrorHelper::invalid_argument()
                .message(format!("unknown secret encryption level '{other}'"))),
        }
    }
}

fn machine_identity() -> String {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn user_identity() -> String {
    let name = ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_default();
    let home = dirs::home_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!("{name}\0{home}")
}

fn derive_key(level: SecretEncryptionLevel) -> Key<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(b"trino-driver secret v1\0");
    hasher.update(level.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(machine_identity().as_bytes());
    if level == SecretEncryptionLevel::User {
        hasher.update(b"\0");
        hasher.update(user_identity().as_bytes());
    }
    hasher.finalize()
}

/// Encrypts `plaintext` at `level`. Empty secrets are stored as empty strings.
pub fn encrypt_secret(plaintext: &str, level: SecretEncryptionLevel) -> Result<String> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    let cipher = Aes256Gcm::new(&derive_key(level));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|_| {
        TrinoErrorHelper::internal()
            .message("cipher rejected input")
            .context("encrypt secret")
    })?;
    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(format!("{level}:{}", STANDARD.encode(sealed)))
}

/// Decrypts a value produced by [`encrypt_secret`].
pub fn decrypt_secret(stored: &str) -> Result<String> {
    if stored.is_empty() {
        return Ok(String::new());
    }
    let (level, payload) = stored.split_once(':').ok_or_else(|| {
        TrinoErrorHelper::invalid_argument()
            .message("missing encryption level prefix")
            .context("decrypt secret")
    })?;
    let level: SecretEncryptionLevel = level.parse()?;
    let sealed = STANDARD.decode(payload).map_err(|e| {
        TrinoErrorHelper::invalid_argument()
            .message(e.to_string())
            .context("decrypt secret")
    })?;
    if sealed.len() < NONCE_LEN {
        return Err(TrinoErrorHelper::invalid_argument()
            .message("sealed secret is truncated")
            .context("decrypt secret"));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(&derive_key(level));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            TrinoErrorHelper::unauthenticated()
                .message(format!("secret was sealed for a different {level}"))
                .context("decrypt secret")
        })?;
    String::from_utf8(plaintext).map_err(|e| {
        TrinoErrorHelper::invalid_argument()
            .message(e.to_string())
            .context("decrypt secret")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_both_levels() {
        for level in [SecretEncryptionLevel::User, SecretEncryptionLevel::System] {
            let sealed = encrypt_secret("eyJ.token.sig", level).unwrap();
            assert!(sealed.starts_with(&format!("{level}:")));
            assert!(!sealed.contains("eyJ.token.sig"));
            assert_eq!(decrypt_secret(&sealed).unwrap(), "eyJ.token.sig");
        }
    }

    #[test]
    fn test_nonce_is_fresh() {
        let a = encrypt_secret("same", SecretEncryptionLevel::User).unwrap();
        let b = encrypt_secret("same", SecretEncryptionLevel::User).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_secret() {
        assert_eq!(encrypt_secret("", SecretEncryptionLevel::System).unwrap(), "");
        assert_eq!(decrypt_secret("").unwrap(), "");
    }

    #[test]
    fn test_tampered_secret_fails() {
        let sealed = encrypt_secret("secret", SecretEncryptionLevel::User).unwrap();
        let swapped = sealed.replacen("user:", "system:", 1);
        assert!(decrypt_secret(&swapped).is_err());
        assert!(decrypt_secret("user:not base64!").is_err());
        assert!(decrypt_secret("no-prefix").is_err());
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(
            "System".parse::<SecretEncryptionLevel>().unwrap(),
            SecretEncryptionLevel::System
        );
        assert!("machine".parse::<SecretEncryptionLevel>().is_err());
    }
}
