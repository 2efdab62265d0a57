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

//! Linear-decay, threshold-ban peer scoring.
//!
//! `add(addr, points)`: apply accumulated decay first
//! (`steps = floor(elapsed/interval); score = max(0, score - steps*decayAmount)`,
//! advancing `lastUpdate` by `steps*interval`), then `score += points`. If the
//! resulting score is `>= BanThreshold`, the caller is told to ban for
//! `BanDuration`. Persisted entries with `score <= 0` are dropped on load/save.

use crate::core::store::{atomic_write_json, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Decay tick length.
pub const DECAY_INTERVAL: Duration = Duration::from_secs(60);
/// Points subtracted per decay tick.
pub const DECAY_AMOUNT: i64 = 1;
/// Score at or above which a ban is triggered.
pub const BAN_THRESHOLD: i64 = 10;
/// How long a ban installed by [`Scorer::add`] lasts.
pub const BAN_DURATION: Duration = Duration::from_secs(30 * 60);

/// Penalty applied for a handshake-protocol violation.
pub const PENALTY_HANDSHAKE_VIOLATION: i64 = 5;
/// Penalty applied for one unknown/invalid steady-state frame.
pub const PENALTY_UNKNOWN_FRAME: i64 = 1;

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[derive(Clone, Debug)]
struct ScoreState {
    score: i64,
    last_update: i64,
}

/// One persisted score entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Peer address.
    pub addr: String,
    /// Current decayed score.
    pub score: i64,
    /// Unix seconds of the last decay/update.
    #[serde(rename = "lastUpdate")]
    pub last_update: i64,
}

/// Outcome of [`Scorer::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddResult {
    /// Score after decay and the new points were applied.
    pub score: i64,
    /// True if this call crossed [`BAN_THRESHOLD`].
    pub banned: bool,
}

/// Thread-safe linear-decay peer scorer.
#[derive(Default)]
pub struct Scorer {
    entries: RwLock<BTreeMap<String, ScoreState>>,
}

impl Scorer {
    /// Create an empty scorer.
    pub fn new() -> Self {
        Self { entries: RwLock::new(BTreeMap::new()) }
    }

    fn decay(st: &mut ScoreState, now: i64) {
        let elapsed = (now - st.last_update).max(0) as u64;
        let steps = elapsed / DECAY_INTERVAL.as_secs();
        if steps == 0 {
            return;
        }
        st.score = (st.score - steps as i64 * DECAY_AMOUNT).max(0);
        st.last_update += (steps * DECAY_INTERVAL.as_secs()) as i64;
    }

    /// Apply decay, then add `points`. Returns the resulting score and
    /// whether this crossed the ban threshold.
    pub fn add(&self, addr: &str, points: i64) -> AddResult {
        let now = now_unix();
        let mut guard = self.entries.write().expect("scorer lock poisoned");
        let st = guard.entry(addr.to_string()).or_insert(ScoreState { score: 0, last_update: now });
        Self::decay(st, now);
        st.score += points;
        AddResult { score: st.score, banned: st.score >= BAN_THRESHOLD }
    }

    /// Apply decay and return the current score, without adding points.
    pub fn get(&self, addr: &str) -> i64 {
        let now = now_unix();
        let mut guard = self.entries.write().expect("scorer lock poisoned");
        match guard.get_mut(addr) {
            Some(st) => {
                Self::decay(st, now);
                st.score
            }
            None => 0,
        }
    }

    /// Snapshot non-zero entries, sorted by address. Persisted entries with
    /// `score <= 0` are dropped.
    pub fn snapshot(&self) -> Vec<ScoreEntry> {
        let guard = self.entries.read().expect("scorer lock poisoned");
        let mut out: Vec<ScoreEntry> = guard
            .iter()
            .filter(|(_, st)| st.score > 0)
            .map(|(addr, st)| ScoreEntry { addr: addr.clone(), score: st.score, last_update: st.last_update })
            .collect();
        out.sort_by(|a, b| a.addr.cmp(&b.addr));
        out
    }

    /// Replace entries from a loaded snapshot, dropping any with `score <= 0`.
    pub fn load_snapshot(&self, entries: &[ScoreEntry]) {
        let mut guard = self.entries.write().expect("scorer lock poisoned");
        guard.clear();
        for e in entries {
            if e.score > 0 {
                guard.insert(e.addr.clone(), ScoreState { score: e.score, last_update: e.last_update });
            }
        }
    }
}

/// Atomic on-disk persistence for the scorer (`scores.json`).
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    /// Bind a store to a path without touching disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load score entries. A missing file loads as empty; a parse failure
    /// is a hard error.
    pub fn load(&self) -> Result<Vec<ScoreEntry>, StoreError> {
        crate::core::store::read_json_or_empty(&self.path)
    }

    /// Load directly into a [`Scorer`].
    pub fn load_into(&self, scorer: &Scorer) -> Result<(), StoreError> {
        let entries = self.load()?;
        scorer.load_snapshot(&entries);
        Ok(())
    }

    /// Persist the scorer's non-zero entries via tmp+rename at mode 0600.
    pub fn save(&self, scorer: &Scorer) -> Result<(), StoreError> {
        atomic_write_json(&self.path, &scorer.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates_and_crosses_threshold() {
        let s = Scorer::new();
        for _ in 0..9 {
            let r = s.add("1.2.3.4:1", PENALTY_HANDSHAKE_VIOLATION as i64 - 4);
            assert!(!r.banned);
        }
        // 9 * 1 = 9, still below 10.
        assert_eq!(s.get("1.2.3.4:1"), 9);
        let r = s.add("1.2.3.4:1", 1);
        assert!(r.banned);
        assert_eq!(r.score, 10);
    }

    #[test]
    fn decay_reduces_score_after_simulated_elapsed_time() {
        let s = Scorer::new();
        s.add("a", 5);
        {
            let mut guard = s.entries.write().unwrap();
            let st = guard.get_mut("a").unwrap();
            st.last_update -= 180; // pretend 3 decay intervals passed
        }
        assert_eq!(s.get("a"), 2); // 5 - 3*1 = 2
    }

    #[test]
    fn decay_never_drives_score_negative() {
        let s = Scorer::new();
        s.add("a", 1);
        {
            let mut guard = s.entries.write().unwrap();
            let st = guard.get_mut("a").unwrap();
            st.last_update -= 600;
        }
        assert_eq!(s.get("a"), 0);
    }

    #[test]
    fn snapshot_drops_zero_and_negative_scores() {
        let s = Scorer::new();
        s.add("zero", 0);
        s.add("positive", 3);
        let snap = s.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].addr, "positive");
    }

    #[test]
    fn store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScoreStore::new(dir.path().join("scores.json"));
        let s = Scorer::new();
        s.add("a", 7);
        store.save(&s).unwrap();

        let s2 = Scorer::new();
        store.load_into(&s2).unwrap();
        assert_eq!(s2.get("a"), 7);
    }
}
