#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! P2P networking: length-prefixed framing, the HELLO/CHALLENGE handshake,
//! peer records, scoring, banlist, peer store, and connection orchestration.

/// Persisted banlist with expiry pruning.
pub mod banlist;
/// Length-prefixed wire framing.
pub mod frame;
/// HELLO handshake and challenge-response proof of key.
pub mod hello;
/// In-memory peer record.
pub mod peer;
/// Accept/dial loops and handshake orchestration.
pub mod peer_manager;
/// On-disk known-peer set.
pub mod peer_store;
/// Linear-decay peer scoring.
pub mod score;
