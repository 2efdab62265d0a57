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

//! Block header hashing, merkle root, and the block store.
//!
//! Block assembly reuses the same pairwise-hash merkle pairing as
//! `core::merkle`, adapted to hash raw 32-byte transaction-id leaves
//! instead of key/value state entries.
//!
//! This is not consensus: [`ChainStore::dev_produce`] is the single
//! mechanical "confirm mempool" operation this node performs, not block
//! production, fork choice, or reorg.

use crate::core::ledger::Ledger;
use crate::core::mempool::Mempool;
use crate::core::merkle::merkle_root_of_leaves;
use crate::core::nonce::NonceTracker;
use crate::core::store::StoreError;
use crate::core::crypto::dsha256;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::core::tx::SignedTx;

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Block header fields, in the exact order they are serialized for hashing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Format version.
    pub version: u32,
    /// Hex-encoded hash of the previous block header.
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    /// Hex-encoded merkle root over the block's transaction ids.
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Free-form nonce field (unused by dev-produce; present for wire
    /// compatibility with a future consensus layer).
    pub nonce: u64,
}

/// A full block: header plus the transactions it confirms.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// This block's header.
    pub header: BlockHeader,
    /// Confirmed transactions, in confirmation order.
    pub transactions: Vec<SignedTx>,
}

/// A persisted, indexed block record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredBlock {
    /// Hex-encoded header hash.
    pub hash: String,
    /// Chain height (genesis is 0).
    pub height: u64,
    /// Hex-encoded previous header hash.
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    /// Hex-encoded merkle root.
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Number of transactions in `block`.
    #[serde(rename = "txCount")]
    pub tx_count: u64,
    /// The full block.
    pub block: Block,
}

/// Chain mutation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// A block's `timestamp` was not strictly positive.
    #[error("block timestamp must be positive")]
    NonPositiveTimestamp,
}

/// Serialize a header to bytes in field order, little-endian, for hashing.
fn header_bytes(h: &BlockHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 + 32 + 8 + 8);
    out.extend_from_slice(&h.version.to_le_bytes());
    out.extend_from_slice(&hex_to_32(&h.prev_hash));
    out.extend_from_slice(&hex_to_32(&h.merkle_root));
    out.extend_from_slice(&h.timestamp.to_le_bytes());
    out.extend_from_slice(&h.nonce.to_le_bytes());
    out
}

fn hex_to_32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Ok(bytes) = hex::decode(s) {
        if bytes.len() == 32 {
            out.copy_from_slice(&bytes);
        }
    }
    out
}

/// `hex(DSHA256(header_bytes(header)))`.
pub fn header_hash(header: &BlockHeader) -> String {
    hex::encode(dsha256(&header_bytes(header)))
}

/// Build the merkle root over a block's transaction ids. An empty set
/// yields the all-zero hash.
pub fn transactions_merkle_root(txs: &[SignedTx]) -> String {
    if txs.is_empty() {
        return hex::encode([0u8; 32]);
    }
    let leaves: Vec<[u8; 32]> = txs
        .iter()
        .map(|tx| {
            let mut out = [0u8; 32];
            if let Ok(bytes) = hex::decode(&tx.tx_id) {
                if bytes.len() == 32 {
                    out.copy_from_slice(&bytes);
                }
            }
            out
        })
        .collect();
    hex::encode(merkle_root_of_leaves(&leaves))
}

/// Build the genesis block: all-zero prev hash, timestamp 0, no transactions.
fn genesis_block() -> Block {
    let header = BlockHeader {
        version: 1,
        prev_hash: hex::encode([0u8; 32]),
        merkle_root: transactions_merkle_root(&[]),
        timestamp: 0,
        nonce: 0,
    };
    Block { header, transactions: Vec::new() }
}

struct ChainState {
    blocks: Vec<StoredBlock>,
    height: u64,
    tip_hash: String,
    by_hash: std::collections::HashMap<String, usize>,
}

impl ChainState {
    fn from_genesis() -> Self {
        let genesis = genesis_block();
        let hash = header_hash(&genesis.header);
        let stored = StoredBlock {
            hash: hash.clone(),
            height: 0,
            prev_hash: genesis.header.prev_hash.clone(),
            merkle_root: genesis.header.merkle_root.clone(),
            timestamp: genesis.header.timestamp,
            tx_count: 0,
            block: genesis,
        };
        let mut by_hash = std::collections::HashMap::new();
        by_hash.insert(hash.clone(), 0);
        Self { blocks: vec![stored], height: 0, tip_hash: hash, by_hash }
    }

    fn from_loaded(mut blocks: Vec<StoredBlock>) -> Self {
        blocks.sort_by_key(|b| b.height);
        let mut by_hash = std::collections::HashMap::new();
        for (i, b) in blocks.iter().enumerate() {
            by_hash.insert(b.hash.clone(), i);
        }
        let (height, tip_hash) = blocks
            .last()
            .map(|b| (b.height, b.hash.clone()))
            .unwrap_or((0, String::new()));
        Self { blocks, height, tip_hash, by_hash }
    }
}

/// In-memory chain: height, tip, and the full block-by-hash index.
pub struct Chain {
    state: RwLock<ChainState>,
}

impl Chain {
    /// Create a chain materialized at genesis.
    pub fn new_genesis() -> Self {
        Self { state: RwLock::new(ChainState::from_genesis()) }
    }

    /// Current chain height.
    pub fn height(&self) -> u64 {
        self.state.read().expect("chain lock poisoned").height
    }

    /// Current tip header hash, hex-encoded.
    pub fn tip_hash(&self) -> String {
        self.state.read().expect("chain lock poisoned").tip_hash.clone()
    }

    /// Append a new block on top of the current tip.
    ///
    /// Validates `timestamp > 0`, builds the header against the current tip
    /// and merkle root of `transactions`, increments height, and indexes the
    /// result by hex hash.
    pub fn add_block(&self, transactions: Vec<SignedTx>, timestamp: i64) -> Result<StoredBlock, ChainError> {
        if timestamp <= 0 {
            return Err(ChainError::NonPositiveTimestamp);
        }
        let mut guard = self.state.write().expect("chain lock poisoned");
        let merkle_root = transactions_merkle_root(&transactions);
        let header = BlockHeader {
            version: 1,
            prev_hash: guard.tip_hash.clone(),
            merkle_root: merkle_root.clone(),
            timestamp,
            nonce: 0,
        };
        let hash = header_hash(&header);
        let height = guard.height + 1;
        let tx_count = transactions.len() as u64;
        let stored = StoredBlock {
            hash: hash.clone(),
            height,
            prev_hash: header.prev_hash.clone(),
            merkle_root,
            timestamp,
            tx_count,
            block: Block { header, transactions },
        };
        guard.by_hash.insert(hash.clone(), guard.blocks.len());
        guard.blocks.push(stored.clone());
        guard.height = height;
        guard.tip_hash = hash;
        Ok(stored)
    }

    /// Up to the last `limit` blocks, most-recent last.
    pub fn recent(&self, limit: usize) -> Vec<StoredBlock> {
        let guard = self.state.read().expect("chain lock poisoned");
        let limit = limit.min(guard.blocks.len());
        guard.blocks[guard.blocks.len() - limit..].to_vec()
    }

    /// Look up a block by its hex-encoded header hash.
    pub fn get_block(&self, hash: &str) -> Option<StoredBlock> {
        let guard = self.state.read().expect("chain lock poisoned");
        guard.by_hash.get(hash).map(|&i| guard.blocks[i].clone())
    }

    /// Replace the whole chain from a loaded snapshot. If `blocks` is empty
    /// the chain is (re)materialized at genesis.
    pub fn load_snapshot(&self, blocks: Vec<StoredBlock>) {
        let mut guard = self.state.write().expect("chain lock poisoned");
        *guard = if blocks.is_empty() { ChainState::from_genesis() } else { ChainState::from_loaded(blocks) };
    }

    /// Snapshot every stored block, sorted by ascending height.
    pub fn snapshot(&self) -> Vec<StoredBlock> {
        self.state.read().expect("chain lock poisoned").blocks.clone()
    }
}

/// Default number of blocks returned by `recent()` when the caller does not
/// specify a limit.
pub const DEFAULT_RECENT_LIMIT: usize = 25;

/// Outcome of [`ChainStore::dev_produce`].
#[derive(Clone, Debug)]
pub struct DevProduceResult {
    /// The newly produced block.
    pub block: StoredBlock,
    /// Number of mempool transactions successfully applied to the ledger.
    pub applied: u64,
    /// Number that failed to apply (e.g. insufficient confirmed balance) and
    /// were dropped from this block.
    pub failed: u64,
}

/// Persisted block store plus the "dev produce" mechanical confirm
/// operation. Not a consensus engine: it drains the mempool in tx-id
/// order, applies what it can to the ledger, and appends exactly one block.
pub struct ChainStore {
    path: PathBuf,
    chain: Chain,
}

impl ChainStore {
    /// Open (without yet loading) a block store backed by `path`. Callers
    /// should call [`ChainStore::load`] once at startup.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), chain: Chain::new_genesis() }
    }

    /// Load blocks from disk. A missing file leaves the chain at genesis
    /// (first-open semantics); a parse failure is a hard error.
    pub fn load(&self) -> Result<(), StoreError> {
        let blocks: Vec<StoredBlock> = crate::core::store::read_json_or_empty(&self.path)?;
        self.chain.load_snapshot(blocks);
        Ok(())
    }

    /// Persist every stored block, sorted ascending by height, via
    /// tmp+rename at mode 0600.
    pub fn save(&self) -> Result<(), StoreError> {
        crate::core::store::atomic_write_json(&self.path, &self.chain.snapshot())
    }

    /// Current height.
    pub fn height(&self) -> u64 {
        self.chain.height()
    }

    /// Current tip hash.
    pub fn tip_hash(&self) -> String {
        self.chain.tip_hash()
    }

    /// Up to the last `limit` blocks.
    pub fn recent(&self, limit: usize) -> Vec<StoredBlock> {
        self.chain.recent(limit)
    }

    /// Look up a block by hash.
    pub fn get_block(&self, hash: &str) -> Option<StoredBlock> {
        self.chain.get_block(hash)
    }

    /// Drain the mempool, reset pending ledger reservations, apply each
    /// drained transaction to the ledger (counting applied/failed), append
    /// one new block (even if empty), and persist ledger, nonce, and chain
    /// state. Not consensus: there is no fork choice or validator set, just
    /// a mechanical confirm step so tests and the wallet UI can exercise
    /// confirmation end to end.
    pub fn dev_produce(
        &self,
        mempool: &Mempool,
        ledger: &Ledger,
        ledger_path: &Path,
        nonces: &NonceTracker,
        nonce_path: &Path,
    ) -> Result<DevProduceResult, StoreError> {
        let drained = mempool.drain();
        ledger.reset_pending();

        let mut applied = 0u64;
        let mut failed = 0u64;
        let mut confirmed_txs = Vec::with_capacity(drained.len());
        for tx in drained {
            let d = &tx.draft;
            match ledger.apply_confirmed_tx(&d.from, &d.to, d.amount, d.fee) {
                Ok(()) => {
                    applied += 1;
                    confirmed_txs.push(tx);
                }
                Err(_) => failed += 1,
            }
        }

        let block = self
            .chain
            .add_block(confirmed_txs, now_unix().max(1))
            .expect("dev_produce always supplies a positive timestamp");

        crate::core::store::atomic_write_json(ledger_path, &{
            let mut records = ledger.snapshot();
            records.sort_by(|a, b| a.addr.cmp(&b.addr));
            records
        })?;
        crate::core::store::atomic_write_json(nonce_path, &nonces.snapshot())?;
        self.save()?;

        Ok(DevProduceResult { block, applied, failed })
    }
}
