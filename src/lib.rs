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

//! Proof-of-concept node core for a small peer-to-peer currency.
//!
//! This crate provides:
//! - A signed-transaction model with canonical hashing and domain-separated
//!   Ed25519 signing, strict validation, and a mempool/nonce-tracker/ledger
//!   that stage, admit, and confirm transactions.
//! - A length-prefixed binary wire protocol with a HELLO handshake and
//!   challenge-response proof of key, peer scoring with decay and banning,
//!   and a persistent known-peer store.
//! - A block store with a mechanical "dev produce" confirm step (no
//!   consensus, no fork choice).
//! - Monitoring via Prometheus metrics and structured logging, and a thin
//!   HTTP facade for exercising the core end to end.

/// Core protocol primitives: addresses, transactions, nonces, ledger,
/// mempool, merkle trees, and the block store.
pub mod core;
/// Observability: Prometheus metrics for peers, mempool, and chain state.
pub mod monitoring;
/// P2P networking stack: wire framing, handshake, peer manager, scoring.
pub mod networking;
/// Node configuration (TOML-backed, validated once at startup).
pub mod config;
/// Thin, un-authenticated HTTP facade over the core.
pub mod api;
