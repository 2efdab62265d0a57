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

//! Core protocol primitives: crypto, addresses, transactions, nonces,
//! ledger, mempool, chain, and their shared atomic persistence.

/// Address codec and checksum validation.
pub mod address;
/// Canonical deterministic byte encoding for hashing and signing.
pub mod canonical;
/// Block header hashing, merkle root, and block store.
pub mod chain;
/// Hash and signature primitives.
pub mod crypto;
/// Node identity key load-or-create.
pub mod identity;
/// Confirmed balances, staged pending spends, persistence.
pub mod ledger;
/// In-memory mempool.
pub mod mempool;
/// Deterministic Merkle tree over 32-byte leaves.
pub mod merkle;
/// Per-account nonce tracker and persistence.
pub mod nonce;
/// Shared atomic tmp+rename JSON persistence.
pub mod store;
/// Signed-transaction model and validation.
pub mod tx;
