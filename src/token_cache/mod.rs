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


//! Encrypted on-disk cache of access and refresh tokens.
//!
//! All connections share one JSON file keyed by identity:
//!
//! ```json
//! {
//!   "analytics__https://trino.example.com__443": {
//!     "encryptedAccessToken": "user:...",
//!     "encryptedRefreshToken": ""
//!   }
//! }
//! ```
//!
//! Every write loads the whole file, replaces one entry, and atomically
//! renames a fresh file into place. Concurrent writers are last-writer-wins.

pub mod crypt;

pub use crypt::{decrypt_secret, encrypt_secret, SecretEncryptionLevel};

use crate::error::{Result, TrinoErrorHelper};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Tokens expiring within this many seconds are treated as expired.
pub const TOKEN_GRACE_PERIOD_SECS: i64 = 600;

const CACHE_FILE_NAME: &str = "TrinoODBCTokenCache.json";

/// Builds the cache key for one connection.
pub fn identity(connection_name: &str, hostname: &str, port: u16) -> String {
    format!("{connection_name}__{hostname}__{port}")
}

/// Reads the `exp` claim of a JWT without verifying its signature.
pub fn token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The current credential for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCacheEntry {
    pub identity: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenCacheEntry {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    /// Expiry claim of the access token, in seconds since the epoch.
    pub fn expiry(&self) -> Option<i64> {
        token_expiry(&self.access_token)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }

    /// Whether the token is expired at `now`, including the grace period.
    /// A token without an expiry claim is always expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        let exp = self.expiry().unwrap_or(0);
        exp - now <= TOKEN_GRACE_PERIOD_SECS
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    #[serde(default)]
    encrypted_access_token: String,
    #[serde(default)]
    encrypted_refresh_token: String,
}

type CacheFile = BTreeMap<String, StoredEntry>;

/// Handle to the shared token cache file.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
    level: SecretEncryptionLevel,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>, level: SecretEncryptionLevel) -> Self {
        Self {
            path: path.into(),
            level,
        }
    }

    /// Default cache file location.
    /// - Windows: `%LOCALAPPDATA%\Temp\TrinoODBCTokenCache.json`
    /// - elsewhere: `~/.cache/trino-driver/TrinoODBCTokenCache.json`
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            dirs::data_local_dir()
                .map(|dir| dir.join("Temp"))
                .unwrap_or_else(std::env::temp_dir)
                .join(CACHE_FILE_NAME)
        }

        #[cfg(not(target_os = "windows"))]
        {
            dirs::cache_dir()
                .map(|dir| dir.join("trino-driver"))
                .unwrap_or_else(std::env::temp_dir)
                .join(CACHE_FILE_NAME)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> SecretEncryptionLevel {
        self.level
    }

    fn read_file(&self) -> Result<CacheFile> {
        if !self.path.exists() {
            return Ok(CacheFile::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(CacheFile::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_file(&self, file: &CacheFile) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let contents = serde_json::to_string_pretty(file)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(&self.path).map_err(|e| {
            TrinoErrorHelper::io()
                .message(e.error.to_string())
                .context("write token cache")
        })?;
        Ok(())
    }

    /// Loads the entry for `identity`.
    ///
    /// Unknown identities, unreadable files and undecryptable secrets all
    /// produce empty tokens.
    pub fn load(&self, identity: &str) -> TokenCacheEntry {
        let mut entry = TokenCacheEntry::new(identity);
        let file = match self.read_file() {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable token cache");
                return entry;
            }
        };
        let Some(stored) = file.get(identity) else {
            debug!(identity, "no cached token");
            return entry;
        };
        entry.access_token = decrypt_or_empty(&stored.encrypted_access_token, identity);
        entry.refresh_token = decrypt_or_empty(&stored.encrypted_refresh_token, identity);
        entry
    }

    /// Encrypts and persists `entry`, replacing any previous value.
    pub fn store(&self, entry: &TokenCacheEntry) -> Result<()> {
        let mut file = self.read_file().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "overwriting unreadable token cache");
            CacheFile::new()
        });
        let stored = StoredEntry {
            encrypted_access_token: encrypt_secret(&entry.access_token, self.level)?,
            encrypted_refresh_token: encrypt_secret(&entry.refresh_token, self.level)?,
        };
        file.insert(entry.identity.clone(), stored);
        self.write_file(&file)?;
        debug!(identity = %entry.identity, "stored token");
        Ok(())
    }

    /// Removes the entry for `identity`. Returns whether one existed.
    pub fn remove(&self, identity: &str) -> Result<bool> {
        let mut file = self.read_file()?;
        let existed = file.remove(identity).is_some();
        if existed {
            self.write_file(&file)?;
        }
        Ok(existed)
    }
}

fn decrypt_or_empty(stored: &str, identity: &str) -> String {
    decrypt_secret(stored).unwrap_or_else(|e| {
        warn!(identity, error = %e, "discarding undecryptable cached secret");
        String::new()
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    /// Builds an unsigned JWT with the given `exp` claim.
    pub(crate) fn jwt_expiring_at(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{exp}}}"#));
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn test_identity() {
        assert_eq!(
            identity("prod", "https://trino", 443),
            "prod__https://trino__443"
        );
    }

    #[test]
    fn test_expiry_grace_period() {
        let now = 1_700_000_000;
        let mut entry = TokenCacheEntry::new("id");
        entry.access_token = jwt_expiring_at(now + 300);
        assert!(entry.is_expired_at(now));
        entry.access_token = jwt_expiring_at(now + 900);
        assert!(!entry.is_expired_at(now));
        entry.access_token = jwt_expiring_at(now + 600);
        assert!(entry.is_expired_at(now));
    }

    #[test]
    fn test_missing_claim_is_expired() {
        let mut entry = TokenCacheEntry::new("id");
        assert!(entry.is_expired());
        entry.access_token = "opaque-token".into();
        assert!(entry.is_expired());
        assert_eq!(entry.expiry(), None);
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("cache.json"), SecretEncryptionLevel::User);

        assert_eq!(cache.load("a__h__1"), TokenCacheEntry::new("a__h__1"));

        let entry = TokenCacheEntry {
            identity: "a__h__1".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
        };
        cache.store(&entry).unwrap();
        let mut other = TokenCacheEntry::new("b__h__1");
        other.access_token = "other".into();
        cache.store(&other).unwrap();

        assert_eq!(cache.load("a__h__1"), entry);
        assert_eq!(cache.load("b__h__1").access_token, "other");

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        assert!(raw.contains("encryptedAccessToken"));
        assert!(!raw.contains("\"access\""));
    }

    #[test]
    fn test_mixed_levels_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let user = TokenCache::new(&path, SecretEncryptionLevel::User);
        let system = TokenCache::new(&path, SecretEncryptionLevel::System);

        let mut a = TokenCacheEntry::new("a");
        a.access_token = "from-user".into();
        user.store(&a).unwrap();
        let mut b = TokenCacheEntry::new("b");
        b.access_token = "from-system".into();
        system.store(&b).unwrap();

        assert_eq!(system.load("a").access_token, "from-user");
        assert_eq!(user.load("b").access_token, "from-system");
    }

    #[test]
    fn test_corrupt_file_yields_empty_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        let cache = TokenCache::new(&path, SecretEncryptionLevel::User);
        assert!(cache.load("x").access_token.is_empty());

        let mut entry = TokenCacheEntry::new("x");
        entry.access_token = "fresh".into();
        cache.store(&entry).unwrap();
        assert_eq!(cache.load("x").access_token, "fresh");
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("c.json"), SecretEncryptionLevel::User);
        let mut entry = TokenCacheEntry::new("x");
        entry.access_token = "t".into();
        cache.store(&entry).unwrap();
        assert!(cache.remove("x").unwrap());
        assert!(!cache.remove("x").unwrap());
        assert!(cache.load("x").access_token.is_empty());
    }
}
