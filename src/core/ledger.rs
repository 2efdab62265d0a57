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

//! Confirmed balances, staged pending spends, and atomic persistence.
//!
//! `pending[addr] <= confirmed[addr]` must hold outside a single atomic
//! stage operation. Fees are presently burned: a future consensus layer
//! would redirect them; [`Ledger::apply_confirmed_tx`] is the seam where a
//! fee event could be emitted.

use crate::core::store::{atomic_write_json, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Ledger mutation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Staging a spend would violate `pending <= confirmed` or leave less
    /// than the required amount spendable.
    #[error("insufficient spendable balance")]
    InsufficientSpendable,
    /// Applying a confirmed transfer would underflow the sender's balance.
    #[error("insufficient confirmed balance")]
    InsufficientConfirmed,
}

/// One persisted balance entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Account address.
    pub addr: String,
    /// Confirmed balance.
    pub balance: u64,
    /// Unix seconds of the last update.
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Default)]
struct LedgerState {
    confirmed: BTreeMap<String, u64>,
    pending: BTreeMap<String, u64>,
}

/// Confirmed balances plus in-memory staged (pending) spends.
#[derive(Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self { state: RwLock::new(LedgerState::default()) }
    }

    /// Confirmed balance for `addr`.
    pub fn confirmed_balance(&self, addr: &str) -> u64 {
        self.state.read().expect("ledger lock poisoned").confirmed.get(addr).copied().unwrap_or(0)
    }

    /// Total pending outflow reserved for `addr`.
    pub fn pending_out(&self, addr: &str) -> u64 {
        self.state.read().expect("ledger lock poisoned").pending.get(addr).copied().unwrap_or(0)
    }

    /// `max(0, confirmed - pending)`.
    pub fn spendable_balance(&self, addr: &str) -> u64 {
        let guard = self.state.read().expect("ledger lock poisoned");
        let confirmed = guard.confirmed.get(addr).copied().unwrap_or(0);
        let pending = guard.pending.get(addr).copied().unwrap_or(0);
        confirmed.saturating_sub(pending)
    }

    /// Reserve `required` against `from`'s spendable balance for a mempool
    /// entry. Fails if the invariant `pending <= confirmed` is already
    /// broken, or if insufficient funds are spendable.
    pub fn stage_mempool_spend(&self, from: &str, required: u64) -> Result<(), LedgerError> {
        let mut guard = self.state.write().expect("ledger lock poisoned");
        let confirmed = guard.confirmed.get(from).copied().unwrap_or(0);
        let pending = guard.pending.get(from).copied().unwrap_or(0);
        if pending > confirmed {
            return Err(LedgerError::InsufficientSpendable);
        }
        let spendable = confirmed - pending;
        if spendable < required {
            return Err(LedgerError::InsufficientSpendable);
        }
        *guard.pending.entry(from.to_string()).or_insert(0) += required;
        Ok(())
    }

    /// Clear all pending entries (used before replaying the mempool during
    /// block confirmation).
    pub fn reset_pending(&self) {
        self.state.write().expect("ledger lock poisoned").pending.clear();
    }

    /// Apply a confirmed transfer: `confirmed[from] -= amount`,
    /// `confirmed[to] += amount - fee`. The fee is burned (not credited
    /// anywhere) per the documented non-goal.
    pub fn apply_confirmed_tx(&self, from: &str, to: &str, amount: u64, fee: u64) -> Result<(), LedgerError> {
        let mut guard = self.state.write().expect("ledger lock poisoned");
        let from_balance = guard.confirmed.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::InsufficientConfirmed);
        }
        guard.confirmed.insert(from.to_string(), from_balance - amount);
        let credit = amount.saturating_sub(fee);
        *guard.confirmed.entry(to.to_string()).or_insert(0) += credit;
        Ok(())
    }

    /// Credit `addr` with `amount` out of thin air. Only meaningful when the
    /// node runs in dev mode; callers are responsible for gating this.
    pub fn faucet_credit(&self, addr: &str, amount: u64) {
        let mut guard = self.state.write().expect("ledger lock poisoned");
        *guard.confirmed.entry(addr.to_string()).or_insert(0) += amount;
    }

    /// Snapshot confirmed balances, sorted by address.
    pub fn snapshot(&self) -> Vec<BalanceRecord> {
        let guard = self.state.read().expect("ledger lock poisoned");
        let now = now_unix();
        guard
            .confirmed
            .iter()
            .map(|(addr, balance)| BalanceRecord { addr: addr.clone(), balance: *balance, updated_at: now })
            .collect()
    }

    /// Replace confirmed balances from a loaded snapshot. Pending state is
    /// untouched (it is never persisted).
    pub fn load_snapshot(&self, records: &[BalanceRecord]) {
        let mut guard = self.state.write().expect("ledger lock poisoned");
        for r in records {
            guard.confirmed.insert(r.addr.clone(), r.balance);
        }
    }
}

/// Atomic on-disk persistence for the ledger (`ledger.json`).
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    /// Bind a store to a path without touching disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load balance records. A missing file loads as empty; a parse
    /// failure is a hard error.
    pub fn load(&self) -> Result<Vec<BalanceRecord>, StoreError> {
        crate::core::store::read_json_or_empty(&self.path)
    }

    /// Load directly into a [`Ledger`].
    pub fn load_into(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let records = self.load()?;
        ledger.load_snapshot(&records);
        Ok(())
    }

    /// Persist a ledger's confirmed-balance snapshot via tmp+rename at mode 0600.
    pub fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let mut records = ledger.snapshot();
        records.sort_by(|a, b| a.addr.cmp(&b.addr));
        atomic_write_json(&self.path, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spendable_is_clamped_and_non_negative() {
        let l = Ledger::new();
        l.load_snapshot(&[BalanceRecord { addr: "a".into(), balance: 100, updated_at: 0 }]);
        assert_eq!(l.spendable_balance("a"), 100);
        l.stage_mempool_spend("a", 60).unwrap();
        assert_eq!(l.spendable_balance("a"), 40);
        assert!(l.stage_mempool_spend("a", 41).is_err());
        assert_eq!(l.spendable_balance("a"), 40);
    }

    #[test]
    fn reset_pending_clears_reservations() {
        let l = Ledger::new();
        l.load_snapshot(&[BalanceRecord { addr: "a".into(), balance: 100, updated_at: 0 }]);
        l.stage_mempool_spend("a", 100).unwrap();
        assert_eq!(l.spendable_balance("a"), 0);
        l.reset_pending();
        assert_eq!(l.spendable_balance("a"), 100);
    }

    #[test]
    fn apply_confirmed_tx_burns_the_fee() {
        let l = Ledger::new();
        l.load_snapshot(&[BalanceRecord { addr: "a".into(), balance: 1000, updated_at: 0 }]);
        l.apply_confirmed_tx("a", "b", 100, 10).unwrap();
        assert_eq!(l.confirmed_balance("a"), 900);
        assert_eq!(l.confirmed_balance("b"), 90);
        // The fee (10) is neither at a nor at b nor anywhere else.
    }

    #[test]
    fn apply_confirmed_tx_rejects_insufficient_funds() {
        let l = Ledger::new();
        l.load_snapshot(&[BalanceRecord { addr: "a".into(), balance: 5, updated_at: 0 }]);
        assert_eq!(l.apply_confirmed_tx("a", "b", 10, 1), Err(LedgerError::InsufficientConfirmed));
    }

    #[test]
    fn store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("ledger.json"));
        let l = Ledger::new();
        l.faucet_credit("a", 500);
        store.save(&l).unwrap();

        let l2 = Ledger::new();
        store.load_into(&l2).unwrap();
        assert_eq!(l2.confirmed_balance("a"), 500);
    }
}
