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

//! Accept/dial loops, handshake orchestration, self-connect guard, peer
//! registry.
//!
//! Ownership is acyclic: the registry lives here, keyed by remote
//! address; each per-connection task holds only that key plus a handle
//! (`Arc<PeerManager>`) and looks the record up through it, rather than
//! holding a back-pointer.
//!
//! Lock order when more than one of `peer_registry`, `scorer`, `banlist` is
//! held at once: `peer_registry -> scorer -> banlist`. This module never
//! acquires them in any other order.

use crate::core::crypto::ct_eq;
use crate::monitoring::metrics::Metrics;
use crate::networking::banlist::Banlist;
use crate::networking::frame::{read_frame, write_frame, FrameError, MessageType};
use crate::networking::hello::{
    check_not_self, decode_hello, encode_hello, generate_challenge, sign_challenge_response, validate_hello,
    verify_challenge_response, ChallengeError, Hello, HelloError,
};
use crate::networking::peer::{ConnectionState, Direction, PeerRecord};
use crate::networking::peer_store::{PeerSource, PeerStore};
use crate::networking::score::{Scorer, BAN_DURATION, PENALTY_HANDSHAKE_VIOLATION, PENALTY_UNKNOWN_FRAME};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Maximum `host:port` entries a single PEERS response may carry.
pub const MAX_PEERS_IN_RESPONSE: usize = 4096;
/// Maximum byte length of a single `host:port` entry.
pub const MAX_PEER_ADDR_LEN: usize = 128;
/// How often the bootstrap dial pass runs.
pub const BOOTSTRAP_DIAL_INTERVAL: Duration = Duration::from_secs(10);
/// Default per-dial timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(7);
/// Default handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(7);
/// Steady-state per-frame read deadline.
pub const STEADY_STATE_FRAME_DEADLINE: Duration = Duration::from_secs(7);

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Static configuration for the peer manager.
#[derive(Clone, Debug)]
pub struct PeerManagerConfig {
    /// Local TCP listen address, e.g. `"0.0.0.0:30303"`.
    pub listen_addr: String,
    /// Bootstrap peer addresses, dialed on every bootstrap pass.
    pub bootstrap: Vec<String>,
    /// Upper bound on concurrently registered peers, `1..=4096`.
    pub max_peers: usize,
    /// Per-dial timeout.
    pub dial_timeout: Duration,
    /// Per-handshake timeout.
    pub handshake_timeout: Duration,
    /// Network identifier advertised and required in every HELLO.
    pub network_id: String,
    /// Node version string advertised in HELLO.
    pub node_version: String,
    /// Whether `GET_PEERS`/`PEERS` exchange runs after a verified handshake.
    pub peer_discovery_enabled: bool,
}

/// Peer manager errors surfaced to callers of top-level operations.
#[derive(Debug, Error)]
pub enum PeerManagerError {
    /// The configured listen address could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(String),
}

struct SharedComponents {
    scorer: Scorer,
    banlist: Banlist,
    peer_store: PeerStore,
    identity_private_key: [u8; 64],
    identity_public_key: [u8; 32],
    config: PeerManagerConfig,
    metrics: Arc<Metrics>,
}

/// Owns the peer registry and orchestrates every connection.
pub struct PeerManager {
    shared: Arc<SharedComponents>,
    registry: RwLock<HashMap<String, PeerRecord>>,
}

impl PeerManager {
    /// Build a manager around already-loaded identity and persisted stores.
    pub fn new(
        config: PeerManagerConfig,
        identity_private_key: [u8; 64],
        identity_public_key: [u8; 32],
        scorer: Scorer,
        banlist: Banlist,
        peer_store: PeerStore,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(SharedComponents {
                scorer,
                banlist,
                peer_store,
                identity_private_key,
                identity_public_key,
                config,
                metrics,
            }),
            registry: RwLock::new(HashMap::new()),
        })
    }

    /// Current number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.registry.read().expect("registry lock poisoned").len()
    }

    /// True if a peer with this exact remote-address string is registered.
    pub fn has_peer(&self, remote_addr: &str) -> bool {
        self.registry.read().expect("registry lock poisoned").contains_key(remote_addr)
    }

    /// The peer scorer, for periodic persistence by the caller.
    pub fn scorer(&self) -> &Scorer {
        &self.shared.scorer
    }

    /// The banlist, for periodic persistence by the caller.
    pub fn banlist(&self) -> &Banlist {
        &self.shared.banlist
    }

    /// The known-peer store, for periodic persistence by the caller.
    pub fn peer_store(&self) -> &PeerStore {
        &self.shared.peer_store
    }

    fn try_register(&self, record: PeerRecord) -> bool {
        let mut guard = self.registry.write().expect("registry lock poisoned");
        if guard.len() >= self.shared.config.max_peers {
            return false;
        }
        if guard.contains_key(&record.remote_addr) {
            return false;
        }
        guard.insert(record.remote_addr.clone(), record);
        true
    }

    fn unregister(&self, remote_addr: &str) {
        self.registry.write().expect("registry lock poisoned").remove(remote_addr);
    }

    /// Run the accept loop until `shutdown` fires. Also closes the listener
    /// on shutdown, per the single-cancellation-signal model.
    pub async fn run_accept_loop(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PeerManagerError> {
        let listener = TcpListener::bind(&self.shared.config.listen_addr)
            .await
            .map_err(|e| PeerManagerError::Bind(e.to_string()))?;
        info!(addr = %self.shared.config.listen_addr, "peer manager listening");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("accept loop shutting down");
                        return Ok(());
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let mgr = Arc::clone(&self);
                            let remote_addr = addr.to_string();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                mgr.handle_inbound(stream, remote_addr, shutdown).await;
                            });
                        }
                        Err(e) => {
                            warn!(err = %e, "accept failed");
                        }
                    }
                }
            }
        }
    }

    /// Run the bootstrap dial loop until `shutdown` fires.
    pub async fn run_dial_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(BOOTSTRAP_DIAL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dial loop shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.run_one_dial_pass(shutdown.clone()).await;
                }
            }
        }
    }

    async fn run_one_dial_pass(self: &Arc<Self>, shutdown: watch::Receiver<bool>) {
        let bootstrap = self.shared.config.bootstrap.clone();
        for addr in bootstrap {
            if self.has_peer(&addr) {
                continue;
            }
            if self.shared.banlist.is_banned(&addr) {
                continue;
            }
            let mgr = Arc::clone(self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                mgr.dial_one(addr, shutdown).await;
            });
        }
    }

    async fn dial_one(self: Arc<Self>, addr: String, shutdown: watch::Receiver<bool>) {
        let connect = timeout(self.shared.config.dial_timeout, TcpStream::connect(&addr)).await;
        let stream = match connect {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.shared.peer_store.record_dial_error(&addr, &e.to_string());
                debug!(addr = %addr, err = %e, "dial failed");
                return;
            }
            Err(_) => {
                self.shared.peer_store.record_dial_error(&addr, "dial timeout");
                debug!(addr = %addr, "dial timed out");
                return;
            }
        };
        self.handle_outbound(stream, addr, shutdown).await;
    }

    async fn handle_inbound(self: Arc<Self>, stream: TcpStream, remote_addr: String, shutdown: watch::Receiver<bool>) {
        if self.shared.banlist.is_banned(&remote_addr) {
            debug!(addr = %remote_addr, "rejecting connection from banned peer");
            return;
        }
        self.run_connection(stream, remote_addr, Direction::Inbound, shutdown).await;
    }

    async fn handle_outbound(self: Arc<Self>, stream: TcpStream, remote_addr: String, shutdown: watch::Receiver<bool>) {
        if self.shared.banlist.is_banned(&remote_addr) {
            return;
        }
        self.run_connection(stream, remote_addr, Direction::Outbound, shutdown).await;
    }

    async fn run_connection(
        self: Arc<Self>,
        mut stream: TcpStream,
        remote_addr: String,
        direction: Direction,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut state = ConnectionState::Handshaking;

        let handshake = timeout(
            self.shared.config.handshake_timeout,
            self.run_handshake(&mut stream, direction),
        )
        .await;

        let peer_hello = match handshake {
            Ok(Ok(hello)) => {
                state = ConnectionState::Verified;
                hello
            }
            Ok(Err(reason)) => {
                self.penalize_handshake_violation(&remote_addr, &reason);
                return;
            }
            Err(_) => {
                self.penalize_handshake_violation(&remote_addr, "handshake timeout");
                return;
            }
        };

        let record = PeerRecord::new(
            remote_addr.clone(),
            direction,
            peer_hello.public_key,
            peer_hello.node_version.clone(),
            peer_hello.nonce,
        );
        if !self.try_register(record) {
            debug!(addr = %remote_addr, "peer registry full or duplicate; closing");
            return;
        }
        self.shared.peer_store.record_seen(
            &remote_addr,
            match direction {
                Direction::Outbound => PeerSource::Bootstrap,
                Direction::Inbound => PeerSource::Learned,
            },
        );

        state = ConnectionState::Active;
        debug!(addr = %remote_addr, ?state, "peer active");

        if self.shared.config.peer_discovery_enabled {
            let _ = self.request_peers(&mut stream).await;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                frame = read_frame(&mut stream, STEADY_STATE_FRAME_DEADLINE) => {
                    match frame {
                        Ok(frame) => {
                            if !self.handle_steady_state_frame(&mut stream, &remote_addr, frame).await {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }

        state = ConnectionState::Closed;
        debug!(addr = %remote_addr, ?state, "connection closed");
        self.unregister(&remote_addr);
    }

    async fn run_handshake(
        &self,
        stream: &mut TcpStream,
        direction: Direction,
    ) -> Result<Hello, String> {
        let local_nonce = generate_challenge().map_err(|e| e.to_string())?;
        let local_hello = Hello {
            protocol_version: crate::networking::hello::PROTOCOL_VERSION,
            network_id: self.shared.config.network_id.clone(),
            node_version: self.shared.config.node_version.clone(),
            unix_seconds: now_unix(),
            nonce: local_nonce,
            public_key: self.shared.identity_public_key,
        };
        let local_bytes = encode_hello(&local_hello);

        match direction {
            Direction::Inbound => {
                let peer_hello = self.read_and_validate_hello(stream).await?;
                write_frame(stream, MessageType::Hello.to_u8(), &local_bytes, DEFAULT_HANDSHAKE_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())?;

                let challenge = generate_challenge().map_err(|e| e.to_string())?;
                write_frame(stream, MessageType::Challenge.to_u8(), &challenge, DEFAULT_HANDSHAKE_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())?;

                let resp_frame = read_frame(stream, DEFAULT_HANDSHAKE_TIMEOUT).await.map_err(|e| e.to_string())?;
                if resp_frame.msg_type != MessageType::ChallengeResp.to_u8() {
                    return Err("expected CHALLENGE_RESP".to_string());
                }
                verify_challenge_response(
                    &resp_frame.payload,
                    &challenge,
                    &peer_hello.public_key,
                    &self.shared.config.network_id,
                )
                .map_err(|e: ChallengeError| e.to_string())?;

                Ok(peer_hello)
            }
            Direction::Outbound => {
                write_frame(stream, MessageType::Hello.to_u8(), &local_bytes, DEFAULT_HANDSHAKE_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())?;
                let peer_hello = self.read_and_validate_hello(stream).await?;

                let challenge_frame = read_frame(stream, DEFAULT_HANDSHAKE_TIMEOUT).await.map_err(|e| e.to_string())?;
                if challenge_frame.msg_type != MessageType::Challenge.to_u8() || challenge_frame.payload.len() != 32 {
                    return Err("expected CHALLENGE".to_string());
                }
                let mut challenge = [0u8; 32];
                challenge.copy_from_slice(&challenge_frame.payload);

                let response = sign_challenge_response(
                    &self.shared.identity_private_key,
                    &self.shared.config.network_id,
                    &challenge,
                )
                .map_err(|e| e.to_string())?;
                write_frame(stream, MessageType::ChallengeResp.to_u8(), &response, DEFAULT_HANDSHAKE_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())?;

                Ok(peer_hello)
            }
        }
    }

    async fn read_and_validate_hello(&self, stream: &mut TcpStream) -> Result<Hello, String> {
        let frame = read_frame(stream, DEFAULT_HANDSHAKE_TIMEOUT).await.map_err(|e| e.to_string())?;
        if frame.msg_type != MessageType::Hello.to_u8() {
            return Err("expected HELLO".to_string());
        }
        let hello = decode_hello(&frame.payload).map_err(|e: HelloError| e.to_string())?;
        validate_hello(&hello, &self.shared.config.network_id, now_unix()).map_err(|e| e.to_string())?;
        check_not_self(&hello, &self.shared.identity_public_key).map_err(|e| e.to_string())?;
        Ok(hello)
    }

    fn penalize_handshake_violation(&self, remote_addr: &str, reason: &str) {
        warn!(addr = %remote_addr, reason, "handshake violation");
        self.shared.metrics.handshake_failures_total.inc();
        let result = self.shared.scorer.add(remote_addr, PENALTY_HANDSHAKE_VIOLATION);
        if result.banned {
            self.shared.banlist.ban(remote_addr, BAN_DURATION, "repeated handshake violations");
            self.shared.metrics.peers_banned_total.inc();
        }
    }

    fn penalize_unknown_frame(&self, remote_addr: &str) {
        let result = self.shared.scorer.add(remote_addr, PENALTY_UNKNOWN_FRAME);
        if result.banned {
            self.shared.banlist.ban(remote_addr, BAN_DURATION, "unknown-frame spam");
            self.shared.metrics.peers_banned_total.inc();
        }
    }

    /// Dispatch one steady-state frame. Returns `false` if the connection
    /// should be closed (GOODBYE or an unrecoverable frame error).
    async fn handle_steady_state_frame(
        &self,
        stream: &mut TcpStream,
        remote_addr: &str,
        frame: crate::networking::frame::Frame,
    ) -> bool {
        match MessageType::from_u8(frame.msg_type) {
            Some(MessageType::Ping) => {
                let _ = write_frame(stream, MessageType::Pong.to_u8(), &frame.payload, STEADY_STATE_FRAME_DEADLINE).await;
                true
            }
            Some(MessageType::Goodbye) => false,
            Some(MessageType::GetPeers) => {
                let addrs: Vec<String> = self.shared.peer_store.list().into_iter().map(|p| p.addr).collect();
                let payload = encode_peers_payload(&addrs);
                let _ = write_frame(stream, MessageType::Peers.to_u8(), &payload, STEADY_STATE_FRAME_DEADLINE).await;
                true
            }
            Some(MessageType::Peers) => {
                if let Ok(addrs) = decode_peers_payload(&frame.payload) {
                    for addr in addrs {
                        self.shared.peer_store.record_seen(&addr, PeerSource::Learned);
                    }
                }
                true
            }
            Some(MessageType::Pong) => true,
            Some(MessageType::Hello) | Some(MessageType::Challenge) | Some(MessageType::ChallengeResp) | None => {
                self.penalize_unknown_frame(remote_addr);
                true
            }
        }
    }

    async fn request_peers(&self, stream: &mut TcpStream) -> Result<(), FrameError> {
        write_frame(stream, MessageType::GetPeers.to_u8(), &[0u8], STEADY_STATE_FRAME_DEADLINE).await
    }
}

/// Encode a list of `host:port` strings as a `PEERS` payload: `u16 count`
/// followed by `u16 len + bytes` per entry, deduplicated and capped at
/// [`MAX_PEERS_IN_RESPONSE`] entries each at most [`MAX_PEER_ADDR_LEN`] bytes.
pub fn encode_peers_payload(addrs: &[String]) -> Vec<u8> {
    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::new();
    for addr in addrs {
        if addr.is_empty() || addr.len() > MAX_PEER_ADDR_LEN {
            continue;
        }
        if seen.insert(addr.clone()) {
            deduped.push(addr.clone());
            if deduped.len() >= MAX_PEERS_IN_RESPONSE {
                break;
            }
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(&(deduped.len() as u16).to_le_bytes());
    for addr in &deduped {
        out.extend_from_slice(&(addr.len() as u16).to_le_bytes());
        out.extend_from_slice(addr.as_bytes());
    }
    out
}

/// Decode a `PEERS` payload produced by [`encode_peers_payload`].
pub fn decode_peers_payload(bytes: &[u8]) -> Result<Vec<String>, String> {
    if bytes.len() < 2 {
        return Err("truncated peers payload".to_string());
    }
    let count = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    let mut pos = 2usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        if bytes.len() - pos < 2 {
            return Err("truncated peers entry length".to_string());
        }
        let len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
        pos += 2;
        if bytes.len() - pos < len {
            return Err("truncated peers entry".to_string());
        }
        let s = String::from_utf8(bytes[pos..pos + len].to_vec()).map_err(|_| "invalid utf8".to_string())?;
        pos += len;
        out.push(s);
    }
    if pos != bytes.len() {
        return Err("trailing bytes".to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_payload_round_trips() {
        let addrs = vec!["1.2.3.4:30303".to_string(), "5.6.7.8:30303".to_string()];
        let encoded = encode_peers_payload(&addrs);
        let decoded = decode_peers_payload(&encoded).unwrap();
        assert_eq!(decoded, addrs);
    }

    #[test]
    fn peers_payload_dedups_and_preserves_insertion_order() {
        let addrs = vec!["a:1".to_string(), "b:1".to_string(), "a:1".to_string()];
        let encoded = encode_peers_payload(&addrs);
        let decoded = decode_peers_payload(&encoded).unwrap();
        assert_eq!(decoded, vec!["a:1".to_string(), "b:1".to_string()]);
    }

    #[test]
    fn peers_payload_drops_oversized_entries() {
        let huge = "x".repeat(MAX_PEER_ADDR_LEN + 1);
        let addrs = vec!["ok:1".to_string(), huge];
        let encoded = encode_peers_payload(&addrs);
        let decoded = decode_peers_payload(&encoded).unwrap();
        assert_eq!(decoded, vec!["ok:1".to_string()]);
    }

    #[test]
    fn self_connect_guard_rejects_matching_public_key() {
        let local_pk = [3u8; 32];
        let hello = Hello {
            protocol_version: crate::networking::hello::PROTOCOL_VERSION,
            network_id: "veltaros-testnet".into(),
            node_version: "v".into(),
            unix_seconds: now_unix(),
            nonce: [1u8; 32],
            public_key: local_pk,
        };
        assert!(check_not_self(&hello, &local_pk).is_err());
        assert_eq!(ct_eq(&hello.public_key, &local_pk), true);
    }
}
