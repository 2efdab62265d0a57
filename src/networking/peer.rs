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

//! In-memory peer record: created on accept/dial registration, destroyed
//! on disconnect or shutdown. The registry itself (a map keyed by
//! remote-address string) lives in [`crate::networking::peer_manager`]; a
//! per-connection task holds only its key and looks up the node through a
//! handle, never a back-pointer, to keep the ownership acyclic.

use std::time::SystemTime;

/// Direction a connection was established in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// We accepted an inbound connection.
    Inbound,
    /// We dialed an outbound connection.
    Outbound,
}

/// A connected peer's in-memory state.
#[derive(Clone, Debug)]
pub struct PeerRecord {
    /// Remote address, e.g. `"203.0.113.4:30303"`.
    pub remote_addr: String,
    /// Inbound or outbound.
    pub direction: Direction,
    /// When the connection was registered.
    pub connected_at: SystemTime,
    /// The peer's advertised Ed25519 public key, once verified.
    pub public_key: [u8; 32],
    /// The peer's advertised node version string.
    pub node_version: String,
    /// The most recent nonce this peer sent in a HELLO.
    pub last_hello_nonce: [u8; 32],
}

impl PeerRecord {
    /// Build a new record at the moment of registration.
    pub fn new(
        remote_addr: String,
        direction: Direction,
        public_key: [u8; 32],
        node_version: String,
        last_hello_nonce: [u8; 32],
    ) -> Self {
        Self {
            remote_addr,
            direction,
            connected_at: SystemTime::now(),
            public_key,
            node_version,
            last_hello_nonce,
        }
    }
}

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Just accepted or dialed, handshake not yet started.
    New,
    /// HELLO/CHALLENGE exchange in progress.
    Handshaking,
    /// Challenge verified; peer identity is trusted.
    Verified,
    /// Steady-state frame exchange.
    Active,
    /// Connection terminated and removed from the registry.
    Closed,
}
