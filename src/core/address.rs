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

//! Address derivation and checksum validation.
//!
//! An address is 24 bytes: the first 20 are `SHA256(pubkey)[0..20]`, the
//! last 4 are `DSHA256(first20)[0..4]`, presented as 48 lowercase hex chars.

use crate::core::crypto::{ct_eq, dsha256, sha256};
use thiserror::Error;

/// Address codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Input was not valid hex.
    #[error("invalid hex")]
    InvalidHex,
    /// Decoded bytes were not 24 bytes long.
    #[error("wrong length")]
    WrongLength,
    /// Checksum did not match the payload.
    #[error("bad checksum")]
    BadChecksum,
}

const ADDRESS_BYTES: usize = 24;
const PAYLOAD_BYTES: usize = 20;
const CHECKSUM_BYTES: usize = 4;

/// Derive the lowercase-hex address for a raw 32-byte Ed25519 public key.
pub fn address_from_pubkey(pubkey: &[u8]) -> String {
    let payload = sha256(pubkey);
    let payload20 = &payload[..PAYLOAD_BYTES];
    let checksum_full = dsha256(payload20);
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes[..PAYLOAD_BYTES].copy_from_slice(payload20);
    bytes[PAYLOAD_BYTES..].copy_from_slice(&checksum_full[..CHECKSUM_BYTES]);
    hex::encode(bytes)
}

/// Validate that `s` is 48 lowercase hex chars encoding a well-checksummed address.
pub fn validate_address(s: &str) -> Result<(), AddressError> {
    let bytes = hex::decode(s).map_err(|_| AddressError::InvalidHex)?;
    if bytes.len() != ADDRESS_BYTES {
        return Err(AddressError::WrongLength);
    }
    let payload20 = &bytes[..PAYLOAD_BYTES];
    let want_checksum = dsha256(payload20);
    if !ct_eq(&bytes[PAYLOAD_BYTES..], &want_checksum[..CHECKSUM_BYTES]) {
        return Err(AddressError::BadChecksum);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pubkey_round_trips() {
        let pk = [0u8; 32];
        let addr = address_from_pubkey(&pk);
        assert_eq!(addr.len(), 48);
        assert!(validate_address(&addr).is_ok());
    }

    #[test]
    fn flipping_any_hex_char_breaks_checksum_or_parse() {
        let pk = [7u8; 32];
        let addr = address_from_pubkey(&pk);
        let bytes = addr.into_bytes();
        for i in 0..bytes.len() {
            let mut mutated = bytes.clone();
            let original = mutated[i];
            // Rotate the hex digit to something different but still hex.
            let alt = match original {
                b'0' => b'1',
                _ => b'0',
            };
            mutated[i] = alt;
            let s = String::from_utf8(mutated).unwrap();
            assert!(validate_address(&s).is_err(), "mutation at {i} should invalidate");
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(validate_address("ab"), Err(AddressError::WrongLength));
    }

    #[test]
    fn non_hex_is_rejected() {
        let bad = "z".repeat(48);
        assert_eq!(validate_address(&bad), Err(AddressError::InvalidHex));
    }
}
