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

//! Shared atomic tmp+rename JSON persistence, used by every on-disk store.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors common to every JSON-file-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not read the file (other than "does not exist").
    #[error("read failed: {0}")]
    Read(String),
    /// File contents did not parse as the expected JSON shape.
    #[error("parse failed: {0}")]
    Parse(String),
    /// Could not write or rename the file.
    #[error("write failed: {0}")]
    Write(String),
}

/// Read and parse a JSON file. A missing file is treated as an empty `Vec`;
/// any other read error, or a parse failure, is a hard error.
pub fn read_json_or_empty<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::Read(e.to_string())),
    };
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse(e.to_string()))
}

/// Serialize `value` and write it atomically: write `<path>.tmp` at mode
/// 0600, then rename over `path`. On rename failure the tmp file is
/// removed and an error is returned.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write(e.to_string()))?;
        }
    }

    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Write(e.to_string()))?;

    let tmp_path = tmp_path_for(path);
    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp_path)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        f.write_all(&bytes).map_err(|e| StoreError::Write(e.to_string()))?;
        f.write_all(b"\n").map_err(|e| StoreError::Write(e.to_string()))?;
        let _ = f.sync_all();
    }
    set_private_perms(&tmp_path);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Write(e.to_string()));
    }
    set_private_perms(path);
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.to_path_buf();
    let name = tmp
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tmp.set_file_name(format!("{name}.tmp"));
    tmp
}

fn set_private_perms(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
