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

//! Per-account nonce tracker and its atomic JSON-file persistence.

use crate::core::store::{atomic_write_json, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One persisted nonce entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NonceRecord {
    /// Sender address.
    pub addr: String,
    /// Highest accepted nonce for this address.
    #[serde(rename = "lastNonce")]
    pub last_nonce: u64,
    /// Unix seconds of the last update.
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// Thread-safe strictly-increasing per-sender nonce tracker.
#[derive(Default)]
pub struct NonceTracker {
    state: RwLock<BTreeMap<String, u64>>,
}

impl NonceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self { state: RwLock::new(BTreeMap::new()) }
    }

    /// Highest accepted nonce for `addr`, or 0 if never seen.
    pub fn get(&self, addr: &str) -> u64 {
        self.state.read().expect("nonce lock poisoned").get(addr).copied().unwrap_or(0)
    }

    /// Next nonce this sender is expected to use.
    pub fn expected_next(&self, addr: &str) -> u64 {
        self.get(addr) + 1
    }

    /// Atomically accept `n` if strictly greater than the current value.
    pub fn check_and_update(&self, addr: &str, n: u64) -> bool {
        let mut guard = self.state.write().expect("nonce lock poisoned");
        let current = guard.get(addr).copied().unwrap_or(0);
        if n > current {
            guard.insert(addr.to_string(), n);
            true
        } else {
            false
        }
    }

    /// Snapshot all entries, sorted by address.
    pub fn snapshot(&self) -> Vec<NonceRecord> {
        let guard = self.state.read().expect("nonce lock poisoned");
        let now = now_unix();
        guard
            .iter()
            .map(|(addr, last)| NonceRecord { addr: addr.clone(), last_nonce: *last, updated_at: now })
            .collect()
    }

    /// Merge a snapshot in, keeping the maximum nonce per address.
    pub fn apply_snapshot(&self, records: &[NonceRecord]) {
        let mut guard = self.state.write().expect("nonce lock poisoned");
        for r in records {
            let entry = guard.entry(r.addr.clone()).or_insert(0);
            if r.last_nonce > *entry {
                *entry = r.last_nonce;
            }
        }
    }
}

/// Atomic on-disk persistence for the nonce tracker (`nonces.json`).
pub struct NonceStore {
    path: PathBuf,
}

impl NonceStore {
    /// Bind a store to a path without touching disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load records from disk, deduplicating by address (keeping the
    /// highest nonce). A missing file loads as empty; a parse failure is a
    /// hard error.
    pub fn load(&self) -> Result<Vec<NonceRecord>, StoreError> {
        let records: Vec<NonceRecord> = crate::core::store::read_json_or_empty(&self.path)?;
        let mut by_addr: BTreeMap<String, NonceRecord> = BTreeMap::new();
        for r in records {
            by_addr
                .entry(r.addr.clone())
                .and_modify(|existing| {
                    if r.last_nonce > existing.last_nonce {
                        *existing = r.clone();
                    }
                })
                .or_insert(r);
        }
        Ok(by_addr.into_values().collect())
    }

    /// Load directly into a [`NonceTracker`].
    pub fn load_into(&self, tracker: &NonceTracker) -> Result<(), StoreError> {
        let records = self.load()?;
        tracker.apply_snapshot(&records);
        Ok(())
    }

    /// Persist a tracker's snapshot, sorted by address, via tmp+rename at mode 0600.
    pub fn save(&self, tracker: &NonceTracker) -> Result<(), StoreError> {
        let mut records = tracker.snapshot();
        records.sort_by(|a, b| a.addr.cmp(&b.addr));
        atomic_write_json(&self.path, &records)
    }
}
