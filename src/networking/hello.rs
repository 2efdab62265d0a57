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

//! HELLO handshake payload and challenge-response proof of key.
//!
//! ```text
//! u16 protocol_version     // must equal 1
//! u16 nid_len + bytes      // network id, 1..64 bytes
//! u16 ver_len + bytes      // node version string, 1..64 bytes
//! i64 unix_seconds
//! [32] nonce               // random
//! [32] public_key          // Ed25519
//! ```

use crate::core::crypto::{ct_eq, ed25519_sign, ed25519_verify, fill_random, sha256};
use thiserror::Error;

/// Required protocol version.
pub const PROTOCOL_VERSION: u16 = 1;
/// Minimum accepted length for `network_id` / `node_version`.
pub const MIN_STRING_LEN: usize = 1;
/// Maximum accepted length for `network_id` / `node_version`.
pub const MAX_STRING_LEN: usize = 64;
/// Maximum accepted clock skew between peers.
pub const MAX_CLOCK_SKEW_SECS: i64 = 120;

/// Domain separator for the challenge-response signing message.
const CHALLENGE_DOMAIN: &[u8] = b"veltaros-p2p-challenge";

/// A decoded HELLO payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hello {
    /// Protocol version.
    pub protocol_version: u16,
    /// Network identifier.
    pub network_id: String,
    /// Node software version string.
    pub node_version: String,
    /// Sender's wall-clock time, unix seconds.
    pub unix_seconds: i64,
    /// Fresh random nonce.
    pub nonce: [u8; 32],
    /// Sender's raw Ed25519 public key.
    pub public_key: [u8; 32],
}

/// HELLO codec/validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HelloError {
    /// Payload ended before a required field.
    #[error("truncated payload")]
    Truncated,
    /// Payload had bytes left over after parsing every field.
    #[error("trailing bytes")]
    TrailingBytes,
    /// A length-prefixed string was outside `[MIN_STRING_LEN, MAX_STRING_LEN]`.
    #[error("string length out of range")]
    StringLengthOutOfRange,
    /// `protocol_version != PROTOCOL_VERSION`.
    #[error("unsupported protocol version")]
    UnsupportedProtocolVersion,
    /// `network_id` did not match the local configuration.
    #[error("network id mismatch")]
    NetworkIdMismatch,
    /// `nonce` was all-zero.
    #[error("zero nonce")]
    ZeroNonce,
    /// Clock skew exceeded [`MAX_CLOCK_SKEW_SECS`].
    #[error("clock skew too large")]
    ClockSkewTooLarge,
    /// The peer's public key equals the local identity key (self-connect).
    #[error("self connection")]
    SelfConnection,
}

fn write_u16_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Encode a HELLO payload to wire bytes.
pub fn encode_hello(hello: &Hello) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 2 + hello.network_id.len() + 2 + hello.node_version.len() + 8 + 32 + 32);
    out.extend_from_slice(&hello.protocol_version.to_le_bytes());
    write_u16_string(&mut out, &hello.network_id);
    write_u16_string(&mut out, &hello.node_version);
    out.extend_from_slice(&hello.unix_seconds.to_le_bytes());
    out.extend_from_slice(&hello.nonce);
    out.extend_from_slice(&hello.public_key);
    out
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], HelloError> {
        if self.buf.len() - self.pos < n {
            return Err(HelloError::Truncated);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, HelloError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, HelloError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, HelloError> {
        let len = self.u16()? as usize;
        if !(MIN_STRING_LEN..=MAX_STRING_LEN).contains(&len) {
            return Err(HelloError::StringLengthOutOfRange);
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| HelloError::Truncated)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Decode a HELLO payload with strict no-trailing-bytes parsing.
pub fn decode_hello(bytes: &[u8]) -> Result<Hello, HelloError> {
    let mut c = Cursor::new(bytes);
    let protocol_version = c.u16()?;
    let network_id = c.string()?;
    let node_version = c.string()?;
    let unix_seconds = c.i64()?;
    let nonce: [u8; 32] = c.take(32)?.try_into().unwrap();
    let public_key: [u8; 32] = c.take(32)?.try_into().unwrap();

    if c.remaining() != 0 {
        return Err(HelloError::TrailingBytes);
    }

    Ok(Hello { protocol_version, network_id, node_version, unix_seconds, nonce, public_key })
}

/// Validate a decoded HELLO against local policy. Does not check for
/// self-connection; callers compare `hello.public_key` to the local
/// identity key themselves: the self-connect guard is a separate, final
/// check.
pub fn validate_hello(hello: &Hello, expected_network_id: &str, now: i64) -> Result<(), HelloError> {
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err(HelloError::UnsupportedProtocolVersion);
    }
    if hello.network_id != expected_network_id {
        return Err(HelloError::NetworkIdMismatch);
    }
    if hello.nonce == [0u8; 32] {
        return Err(HelloError::ZeroNonce);
    }
    if (hello.unix_seconds - now).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(HelloError::ClockSkewTooLarge);
    }
    Ok(())
}

/// Reject a HELLO whose advertised public key equals the local identity key.
pub fn check_not_self(hello: &Hello, local_public_key: &[u8; 32]) -> Result<(), HelloError> {
    if ct_eq(&hello.public_key, local_public_key) {
        return Err(HelloError::SelfConnection);
    }
    Ok(())
}

/// Compute the message an outbound peer signs in response to a CHALLENGE:
/// `SHA256(domain || networkId || challenge)`.
pub fn challenge_signing_message(network_id: &str, challenge: &[u8; 32]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(CHALLENGE_DOMAIN.len() + network_id.len() + 32);
    buf.extend_from_slice(CHALLENGE_DOMAIN);
    buf.extend_from_slice(network_id.as_bytes());
    buf.extend_from_slice(challenge);
    sha256(&buf)
}

/// Generate a fresh 32-byte challenge.
pub fn generate_challenge() -> Result<[u8; 32], HelloError> {
    let mut out = [0u8; 32];
    fill_random(&mut out).map_err(|_| HelloError::Truncated)?;
    Ok(out)
}

/// Sign a CHALLENGE_RESP payload: `challenge(32) || signature(64)`.
pub fn sign_challenge_response(
    privkey_64: &[u8],
    network_id: &str,
    challenge: &[u8; 32],
) -> Result<Vec<u8>, HelloError> {
    let msg = challenge_signing_message(network_id, challenge);
    let sig = ed25519_sign(privkey_64, &msg).map_err(|_| HelloError::Truncated)?;
    let mut out = Vec::with_capacity(32 + 64);
    out.extend_from_slice(challenge);
    out.extend_from_slice(&sig);
    Ok(out)
}

/// Challenge-response verification errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    /// Response was not exactly 32 + 64 bytes.
    #[error("wrong response length")]
    WrongLength,
    /// The echoed challenge did not match the one that was sent.
    #[error("challenge mismatch")]
    ChallengeMismatch,
    /// Ed25519 verification failed.
    #[error("bad signature")]
    BadSignature,
}

/// Verify a CHALLENGE_RESP payload against the challenge that was sent and
/// the peer's advertised public key.
pub fn verify_challenge_response(
    response: &[u8],
    sent_challenge: &[u8; 32],
    peer_public_key: &[u8; 32],
    network_id: &str,
) -> Result<(), ChallengeError> {
    if response.len() != 32 + 64 {
        return Err(ChallengeError::WrongLength);
    }
    let echoed = &response[..32];
    let sig = &response[32..];

    if !ct_eq(echoed, sent_challenge) {
        return Err(ChallengeError::ChallengeMismatch);
    }

    let msg = challenge_signing_message(network_id, sent_challenge);
    let ok = ed25519_verify(peer_public_key, &msg, sig).map_err(|_| ChallengeError::BadSignature)?;
    if !ok {
        return Err(ChallengeError::BadSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::generate_ed25519_seed;

    fn sample_hello(network_id: &str, now: i64) -> Hello {
        let (_, pk) = generate_ed25519_seed().unwrap();
        Hello {
            protocol_version: PROTOCOL_VERSION,
            network_id: network_id.to_string(),
            node_version: "veltaros/0.1.0".to_string(),
            unix_seconds: now,
            nonce: [7u8; 32],
            public_key: pk,
        }
    }

    #[test]
    fn round_trip_for_every_well_formed_hello() {
        let h = sample_hello("veltaros-testnet", 1_700_000_000);
        let encoded = encode_hello(&h);
        let decoded = decode_hello(&encoded).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn decoder_rejects_trailing_bytes() {
        let h = sample_hello("veltaros-testnet", 1_700_000_000);
        let mut encoded = encode_hello(&h);
        encoded.push(0xFF);
        assert_eq!(decode_hello(&encoded), Err(HelloError::TrailingBytes));
    }

    #[test]
    fn protocol_version_zero_is_rejected_by_decode_then_validate() {
        // Version 0 still decodes (it is well-formed), but validate() rejects it.
        let mut h = sample_hello("veltaros-testnet", 1_700_000_000);
        h.protocol_version = 0;
        let encoded = encode_hello(&h);
        let decoded = decode_hello(&encoded).unwrap();
        assert_eq!(
            validate_hello(&decoded, "veltaros-testnet", 1_700_000_000),
            Err(HelloError::UnsupportedProtocolVersion)
        );
    }

    #[test]
    fn nid_len_zero_is_rejected() {
        // Hand-roll bytes with nid_len = 0.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // nid_len = 0
        assert_eq!(decode_hello(&bytes), Err(HelloError::StringLengthOutOfRange));
    }

    #[test]
    fn nid_len_65_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&65u16.to_le_bytes());
        bytes.extend_from_slice(&[b'x'; 65]);
        assert_eq!(decode_hello(&bytes), Err(HelloError::StringLengthOutOfRange));
    }

    #[test]
    fn network_mismatch_is_rejected() {
        let h = sample_hello("veltaros-mainnet", 1_700_000_000);
        assert_eq!(
            validate_hello(&h, "veltaros-testnet", 1_700_000_000),
            Err(HelloError::NetworkIdMismatch)
        );
    }

    #[test]
    fn self_connection_is_detected() {
        let (_, local_pk) = generate_ed25519_seed().unwrap();
        let mut h = sample_hello("veltaros-testnet", 1_700_000_000);
        h.public_key = local_pk;
        assert_eq!(check_not_self(&h, &local_pk), Err(HelloError::SelfConnection));
    }

    #[test]
    fn challenge_response_round_trip() {
        let (seed, pk) = generate_ed25519_seed().unwrap();
        let mut priv64 = [0u8; 64];
        priv64[..32].copy_from_slice(&seed);
        priv64[32..].copy_from_slice(&pk);

        let challenge = generate_challenge().unwrap();
        let resp = sign_challenge_response(&priv64, "veltaros-testnet", &challenge).unwrap();
        assert!(verify_challenge_response(&resp, &challenge, &pk, "veltaros-testnet").is_ok());
    }

    #[test]
    fn challenge_response_signing_a_different_challenge_is_rejected() {
        let (seed, pk) = generate_ed25519_seed().unwrap();
        let mut priv64 = [0u8; 64];
        priv64[..32].copy_from_slice(&seed);
        priv64[32..].copy_from_slice(&pk);

        let sent = generate_challenge().unwrap();
        let other = generate_challenge().unwrap();
        let resp = sign_challenge_response(&priv64, "veltaros-testnet", &other).unwrap();
        assert_eq!(
            verify_challenge_response(&resp, &sent, &pk, "veltaros-testnet"),
            Err(ChallengeError::ChallengeMismatch)
        );
    }
}
