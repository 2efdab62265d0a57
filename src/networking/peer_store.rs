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

//! On-disk set of known peers, deduplicated by address.

use crate::core::store::{atomic_write_json, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Where a known-peer entry was learned from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerSource {
    /// Came from the configured bootstrap list.
    Bootstrap,
    /// Learned via a `PEERS` response.
    Learned,
    /// Added by an operator.
    Manual,
}

/// One known-peer record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnownPeer {
    /// Peer address, `host:port`.
    pub addr: String,
    /// Unix seconds this peer was first or last seen.
    #[serde(rename = "seenAt")]
    pub seen_at: i64,
    /// How this entry was learned.
    pub source: PeerSource,
    /// The most recent dial error, if any.
    #[serde(rename = "lastError", skip_serializing_if = "Option::is_none", default)]
    pub last_error: Option<String>,
}

/// Thread-safe known-peer set, keyed by address.
#[derive(Default)]
pub struct PeerStore {
    entries: RwLock<BTreeMap<String, KnownPeer>>,
}

impl PeerStore {
    /// Create an empty in-memory peer set.
    pub fn new() -> Self {
        Self { entries: RwLock::new(BTreeMap::new()) }
    }

    /// Record or refresh a sighting of `addr`.
    pub fn record_seen(&self, addr: &str, source: PeerSource) {
        let mut guard = self.entries.write().expect("peer store lock poisoned");
        guard.insert(
            addr.to_string(),
            KnownPeer { addr: addr.to_string(), seen_at: now_unix(), source, last_error: None },
        );
    }

    /// Record a dial failure against a known (or new) entry.
    pub fn record_dial_error(&self, addr: &str, err: &str) {
        let mut guard = self.entries.write().expect("peer store lock poisoned");
        let entry = guard.entry(addr.to_string()).or_insert(KnownPeer {
            addr: addr.to_string(),
            seen_at: now_unix(),
            source: PeerSource::Learned,
            last_error: None,
        });
        entry.last_error = Some(err.to_string());
    }

    /// All known peers, sorted by address.
    pub fn list(&self) -> Vec<KnownPeer> {
        let guard = self.entries.read().expect("peer store lock poisoned");
        let mut out: Vec<KnownPeer> = guard.values().cloned().collect();
        out.sort_by(|a, b| a.addr.cmp(&b.addr));
        out
    }

    /// Replace entries from a loaded snapshot, deduplicating by address and
    /// keeping the first occurrence of each address in encounter order.
    pub fn load_snapshot(&self, entries: &[KnownPeer]) {
        let mut guard = self.entries.write().expect("peer store lock poisoned");
        guard.clear();
        for e in entries {
            guard.entry(e.addr.clone()).or_insert_with(|| e.clone());
        }
    }
}

/// Atomic on-disk persistence for the known-peer set (`peers.json`).
pub struct KnownPeerStore {
    path: PathBuf,
}

impl KnownPeerStore {
    /// Bind a store to a path without touching disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load known peers, deduplicated by address keeping first occurrence.
    /// A missing file loads as empty; a parse failure is a hard error.
    pub fn load(&self) -> Result<Vec<KnownPeer>, StoreError> {
        let raw: Vec<KnownPeer> = crate::core::store::read_json_or_empty(&self.path)?;
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for entry in raw {
            if seen.insert(entry.addr.clone()) {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Load directly into a [`PeerStore`].
    pub fn load_into(&self, store: &PeerStore) -> Result<(), StoreError> {
        let entries = self.load()?;
        store.load_snapshot(&entries);
        Ok(())
    }

    /// Persist the known-peer set, sorted by address, via tmp+rename at mode 0600.
    pub fn save(&self, store: &PeerStore) -> Result<(), StoreError> {
        atomic_write_json(&self.path, &store.list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_list_is_sorted() {
        let s = PeerStore::new();
        s.record_seen("b:1", PeerSource::Manual);
        s.record_seen("a:1", PeerSource::Bootstrap);
        let list = s.list();
        assert_eq!(list[0].addr, "a:1");
        assert_eq!(list[1].addr, "b:1");
    }

    #[test]
    fn load_dedups_keeping_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let raw = vec![
            KnownPeer { addr: "x:1".into(), seen_at: 1, source: PeerSource::Bootstrap, last_error: None },
            KnownPeer { addr: "x:1".into(), seen_at: 2, source: PeerSource::Learned, last_error: None },
        ];
        let path = dir.path().join("peers.json");
        atomic_write_json(&path, &raw).unwrap();

        let store = KnownPeerStore::new(&path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].seen_at, 1);
        assert_eq!(loaded[0].source, PeerSource::Bootstrap);
    }

    #[test]
    fn store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnownPeerStore::new(dir.path().join("peers.json"));
        let s = PeerStore::new();
        s.record_seen("a:1", PeerSource::Bootstrap);
        s.record_dial_error("a:1", "connection refused");
        store.save(&s).unwrap();

        let s2 = PeerStore::new();
        store.load_into(&s2).unwrap();
        let list = s2.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].last_error.as_deref(), Some("connection refused"));
    }
}
