// Copyright (c) 2026 Veltaros
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node identity key load-or-create.
//!
//! `identity.key` holds the ASCII hex of a raw 64-byte Ed25519 private key
//! (`seed(32) || pubkey(32)`), mode 0600. `identity.json` mirrors the public
//! key for operators and is rewritten only when it does not match the
//! loaded private key, per the documented overwrite-only-on-mismatch rule.
//!
//! The key is process-wide and read-only after load: callers hold
//! an [`Identity`] by value or shared reference, never mutate it.

use crate::core::crypto::{ed25519_public_from_seed, generate_ed25519_seed, CryptoError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Identity load/create errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// `identity.key` existed but was not valid ASCII hex of 64 bytes.
    #[error("invalid identity key file")]
    InvalidKeyFile,
    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(String),
    /// The embedded Ed25519 seed was rejected by the signature library.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<std::io::Error> for IdentityError {
    fn from(e: std::io::Error) -> Self {
        IdentityError::Io(e.to_string())
    }
}

/// The node's loaded Ed25519 identity.
pub struct Identity {
    /// Raw 64-byte private key: `seed(32) || pubkey(32)`.
    pub private_key: [u8; 64],
    /// Raw 32-byte public key.
    pub public_key: [u8; 32],
}

/// `identity.json` mirror record.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct IdentityRecord {
    #[serde(rename = "publicKeyHex")]
    public_key_hex: String,
    #[serde(rename = "createdAt")]
    created_at: i64,
    #[serde(rename = "updatedAt")]
    updated_at: i64,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut f = fs::OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
    f.write_all(bytes)?;
    let _ = f.sync_all();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Load the identity key from `key_path`, generating and persisting a fresh
/// one if the file does not exist. `record_path` is kept in sync with the
/// loaded public key, rewritten only on mismatch (including on first
/// creation, where no record yet exists).
pub fn load_or_create(key_path: &Path, record_path: &Path) -> Result<Identity, IdentityError> {
    let private_key = match fs::read_to_string(key_path) {
        Ok(hex_str) => parse_private_key_hex(hex_str.trim())?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let (seed, pk) = generate_ed25519_seed()?;
            let mut key = [0u8; 64];
            key[..32].copy_from_slice(&seed);
            key[32..].copy_from_slice(&pk);
            write_private_file(key_path, hex::encode(key).as_bytes())?;
            key
        }
        Err(e) => return Err(IdentityError::Io(e.to_string())),
    };

    let seed: [u8; 32] = private_key[..32].try_into().expect("private_key is 64 bytes");
    let public_key = ed25519_public_from_seed(&seed)?;

    sync_record(record_path, &public_key)?;

    Ok(Identity { private_key, public_key })
}

fn parse_private_key_hex(s: &str) -> Result<[u8; 64], IdentityError> {
    let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidKeyFile)?;
    if bytes.len() != 64 {
        return Err(IdentityError::InvalidKeyFile);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn sync_record(record_path: &Path, public_key: &[u8; 32]) -> Result<(), IdentityError> {
    let public_key_hex = hex::encode(public_key);
    let now = now_unix();

    let existing: Option<IdentityRecord> = fs::read(record_path)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    if let Some(existing) = &existing {
        if existing.public_key_hex == public_key_hex {
            return Ok(());
        }
    }

    let record = IdentityRecord {
        public_key_hex,
        created_at: existing.map(|e| e.created_at).unwrap_or(now),
        updated_at: now,
    };
    let bytes = serde_json::to_vec_pretty(&record).map_err(|e| IdentityError::Io(e.to_string()))?;
    if let Some(parent) = record_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(record_path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_key_and_record_on_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("identity.key");
        let record_path = dir.path().join("identity.json");

        let id = load_or_create(&key_path, &record_path).unwrap();
        assert!(key_path.exists());
        assert!(record_path.exists());

        let hex_contents = fs::read_to_string(&key_path).unwrap();
        assert_eq!(hex_contents.trim().len(), 128);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key_path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }

        let record: IdentityRecord = serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
        assert_eq!(record.public_key_hex, hex::encode(id.public_key));
    }

    #[test]
    fn reloading_an_existing_key_is_stable_and_does_not_rewrite_record() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("identity.key");
        let record_path = dir.path().join("identity.json");

        let first = load_or_create(&key_path, &record_path).unwrap();
        let record_bytes_before = fs::read(&record_path).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = load_or_create(&key_path, &record_path).unwrap();
        let record_bytes_after = fs::read(&record_path).unwrap();

        assert_eq!(first.private_key, second.private_key);
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(record_bytes_before, record_bytes_after);
    }

    #[test]
    fn record_is_rewritten_when_it_does_not_match_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("identity.key");
        let record_path = dir.path().join("identity.json");

        load_or_create(&key_path, &record_path).unwrap();
        fs::write(&record_path, br#"{"publicKeyHex":"00","createdAt":0,"updatedAt":0}"#).unwrap();

        let id = load_or_create(&key_path, &record_path).unwrap();
        let record: IdentityRecord = serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
        assert_eq!(record.public_key_hex, hex::encode(id.public_key));
    }

    #[test]
    fn invalid_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("identity.key");
        let record_path = dir.path().join("identity.json");
        fs::write(&key_path, b"not-hex").unwrap();
        assert!(load_or_create(&key_path, &record_path).is_err());
    }
}
