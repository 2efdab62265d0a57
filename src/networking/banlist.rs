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

//! Persisted banlist with expiry pruning.
//!
//! Entries with `until <= now` are pruned on load and on save; `is_banned`
//! also treats an expired entry as absent without requiring a prior prune.

use crate::core::store::{atomic_write_json, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// One persisted ban entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BanEntry {
    /// Banned address.
    pub addr: String,
    /// Unix seconds after which the ban no longer applies.
    pub until: i64,
    /// Human-readable reason, for operators.
    pub reason: String,
    /// Unix seconds this entry was last written.
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// Thread-safe banlist.
#[derive(Default)]
pub struct Banlist {
    entries: RwLock<BTreeMap<String, BanEntry>>,
}

impl Banlist {
    /// Create an empty banlist.
    pub fn new() -> Self {
        Self { entries: RwLock::new(BTreeMap::new()) }
    }

    /// Install or replace a ban for `addr`, expiring after `duration`.
    pub fn ban(&self, addr: &str, duration: Duration, reason: &str) {
        let now = now_unix();
        let entry = BanEntry {
            addr: addr.to_string(),
            until: now + duration.as_secs() as i64,
            reason: reason.to_string(),
            updated_at: now,
        };
        self.entries.write().expect("banlist lock poisoned").insert(addr.to_string(), entry);
    }

    /// True if `addr` is currently under an unexpired ban.
    pub fn is_banned(&self, addr: &str) -> bool {
        let now = now_unix();
        self.entries
            .read()
            .expect("banlist lock poisoned")
            .get(addr)
            .map(|e| e.until > now)
            .unwrap_or(false)
    }

    /// Drop every entry whose `until` has already passed.
    pub fn prune_expired(&self) {
        let now = now_unix();
        self.entries.write().expect("banlist lock poisoned").retain(|_, e| e.until > now);
    }

    /// Snapshot all unexpired entries, sorted by address, pruning expired
    /// ones as a side effect.
    pub fn snapshot(&self) -> Vec<BanEntry> {
        self.prune_expired();
        let guard = self.entries.read().expect("banlist lock poisoned");
        let mut out: Vec<BanEntry> = guard.values().cloned().collect();
        out.sort_by(|a, b| a.addr.cmp(&b.addr));
        out
    }

    /// Replace entries from a loaded snapshot, dropping already-expired ones.
    pub fn load_snapshot(&self, entries: &[BanEntry]) {
        let now = now_unix();
        let mut guard = self.entries.write().expect("banlist lock poisoned");
        guard.clear();
        for e in entries {
            if e.until > now {
                guard.insert(e.addr.clone(), e.clone());
            }
        }
    }
}

/// Atomic on-disk persistence for the banlist (`banlist.json`).
pub struct BanlistStore {
    path: PathBuf,
}

impl BanlistStore {
    /// Bind a store to a path without touching disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load ban entries, pruning any that have already expired. A missing
    /// file loads as empty; a parse failure is a hard error.
    pub fn load(&self) -> Result<Vec<BanEntry>, StoreError> {
        let now = now_unix();
        let entries: Vec<BanEntry> = crate::core::store::read_json_or_empty(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.until > now).collect())
    }

    /// Load directly into a [`Banlist`].
    pub fn load_into(&self, banlist: &Banlist) -> Result<(), StoreError> {
        let entries = self.load()?;
        banlist.load_snapshot(&entries);
        Ok(())
    }

    /// Persist unexpired ban entries via tmp+rename at mode 0600.
    pub fn save(&self, banlist: &Banlist) -> Result<(), StoreError> {
        atomic_write_json(&self.path, &banlist.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_and_is_banned() {
        let b = Banlist::new();
        assert!(!b.is_banned("1.2.3.4:1"));
        b.ban("1.2.3.4:1", Duration::from_secs(1800), "handshake violation");
        assert!(b.is_banned("1.2.3.4:1"));
    }

    #[test]
    fn expired_entries_are_pruned_on_snapshot() {
        let b = Banlist::new();
        b.load_snapshot(&[BanEntry {
            addr: "old".into(),
            until: now_unix() - 10,
            reason: "stale".into(),
            updated_at: 0,
        }]);
        // load_snapshot itself already drops expired entries.
        assert!(b.snapshot().is_empty());
        assert!(!b.is_banned("old"));
    }

    #[test]
    fn store_round_trips_and_prunes_expired_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanlistStore::new(dir.path().join("banlist.json"));

        // Write a file with one live and one expired entry directly.
        let raw = vec![
            BanEntry { addr: "live".into(), until: now_unix() + 3600, reason: "r".into(), updated_at: 0 },
            BanEntry { addr: "dead".into(), until: now_unix() - 3600, reason: "r".into(), updated_at: 0 },
        ];
        atomic_write_json(dir.path().join("banlist.json").as_path(), &raw).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].addr, "live");
    }
}
