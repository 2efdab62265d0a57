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

//! In-memory mempool: dedup by tx id, concurrent add/list/drain.
//!
//! No ordering and no eviction is specified for this phase; the mempool is
//! bounded only by memory.

use crate::core::tx::SignedTx;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Thread-safe mempool keyed by transaction id.
#[derive(Default)]
pub struct Mempool {
    entries: RwLock<BTreeMap<String, SignedTx>>,
}

impl Mempool {
    /// Create an empty mempool.
    pub fn new() -> Self {
        Self { entries: RwLock::new(BTreeMap::new()) }
    }

    /// Insert a transaction, keyed by its `txId`. Callers are expected to
    /// have already run [`crate::core::tx::validate_with_pubkey_binding`]
    /// and reserved its nonce; this call never validates.
    pub fn add(&self, tx: SignedTx) {
        let mut guard = self.entries.write().expect("mempool lock poisoned");
        guard.insert(tx.tx_id.clone(), tx);
    }

    /// True if a transaction with this id is present.
    pub fn has(&self, tx_id: &str) -> bool {
        self.entries.read().expect("mempool lock poisoned").contains_key(tx_id)
    }

    /// All currently held transactions, in tx-id order.
    pub fn list(&self) -> Vec<SignedTx> {
        self.entries.read().expect("mempool lock poisoned").values().cloned().collect()
    }

    /// Current entry count.
    pub fn count(&self) -> usize {
        self.entries.read().expect("mempool lock poisoned").len()
    }

    /// Atomically take every entry and leave the mempool empty.
    pub fn drain(&self) -> Vec<SignedTx> {
        let mut guard = self.entries.write().expect("mempool lock poisoned");
        std::mem::take(&mut *guard).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::address_from_pubkey;
    use crate::core::crypto::generate_ed25519_seed;
    use crate::core::tx::{sign, TxDraft};

    fn sample_tx(nonce: u64) -> SignedTx {
        let (seed, pk) = generate_ed25519_seed().unwrap();
        let mut priv64 = [0u8; 64];
        priv64[..32].copy_from_slice(&seed);
        priv64[32..].copy_from_slice(&pk);
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = generate_ed25519_seed().unwrap();
        let to = address_from_pubkey(&other_pk);

        let draft = TxDraft {
            version: 1,
            network_id: "veltaros-testnet".to_string(),
            from,
            to,
            amount: 100,
            fee: 1,
            nonce,
            timestamp: 0,
            memo: None,
        };
        sign(&priv64, &pk, draft).unwrap()
    }

    #[test]
    fn add_has_count_and_dedup() {
        let mp = Mempool::new();
        let tx = sample_tx(1);
        mp.add(tx.clone());
        assert!(mp.has(&tx.tx_id));
        assert_eq!(mp.count(), 1);

        mp.add(tx.clone()); // re-insert of the same id is a no-op dedup
        assert_eq!(mp.count(), 1);
    }

    #[test]
    fn drain_is_atomic_and_empties_the_pool() {
        let mp = Mempool::new();
        mp.add(sample_tx(1));
        mp.add(sample_tx(2));
        assert_eq!(mp.count(), 2);

        let drained = mp.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(mp.count(), 0);
        assert!(mp.list().is_empty());
    }
}
