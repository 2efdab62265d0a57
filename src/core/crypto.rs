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

//! Hash and signature primitives: SHA-256, double-SHA-256, Ed25519, constant-time compare.

use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Crypto primitive errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Private key bytes were not the expected length.
    #[error("invalid private key length")]
    InvalidPrivateKey,
    /// Public key bytes were not the expected length.
    #[error("invalid public key length")]
    InvalidPublicKey,
    /// Signature bytes were not the expected length.
    #[error("invalid signature length")]
    InvalidSignatureLength,
    /// The system RNG failed to produce random bytes.
    #[error("random generation failed")]
    Rng,
}

/// A raw 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let d = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// Double SHA-256: `SHA256(SHA256(data))`.
pub fn dsha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Constant-time byte equality (for checksums, MACs, and secrets).
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Fill `out` with cryptographically secure random bytes.
pub fn fill_random(out: &mut [u8]) -> Result<(), CryptoError> {
    SystemRandom::new()
        .fill(out)
        .map_err(|_| CryptoError::Rng)
}

/// Generate a fresh random Ed25519 keypair, returned as `(seed32, pubkey32)`.
///
/// The caller is responsible for persisting `seed || pubkey` as the 64-byte
/// identity private key on disk (see [`crate::core::identity`]).
pub fn generate_ed25519_seed() -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let mut seed = [0u8; 32];
    fill_random(&mut seed)?;
    let pk = ed25519_public_from_seed(&seed)?;
    Ok((seed, pk))
}

/// Derive the 32-byte Ed25519 public key from a 32-byte seed.
pub fn ed25519_public_from_seed(seed: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
    let kp = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(kp.public_key().as_ref());
    Ok(out)
}

/// Sign `msg` with a 64-byte Ed25519 private key (`seed(32) || pubkey(32)`).
///
/// Returns a 64-byte signature.
pub fn ed25519_sign(privkey_64: &[u8], msg: &[u8]) -> Result<[u8; 64], CryptoError> {
    if privkey_64.len() != 64 {
        return Err(CryptoError::InvalidPrivateKey);
    }
    let seed = &privkey_64[..32];
    let kp = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let sig = kp.sign(msg);
    let mut out = [0u8; 64];
    out.copy_from_slice(sig.as_ref());
    Ok(out)
}

/// Verify an Ed25519 signature. Invalid input sizes are a hard error; a
/// well-formed but non-matching signature returns `Ok(false)`.
pub fn ed25519_verify(pubkey_32: &[u8], msg: &[u8], sig_64: &[u8]) -> Result<bool, CryptoError> {
    if pubkey_32.len() != 32 {
        return Err(CryptoError::InvalidPublicKey);
    }
    if sig_64.len() != 64 {
        return Err(CryptoError::InvalidSignatureLength);
    }
    let pk = UnparsedPublicKey::new(&ED25519, pubkey_32);
    Ok(pk.verify(msg, sig_64).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsha256_is_sha256_twice() {
        let data = b"veltaros";
        assert_eq!(dsha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let (seed, pk) = generate_ed25519_seed().unwrap();
        let mut priv64 = [0u8; 64];
        priv64[..32].copy_from_slice(&seed);
        priv64[32..].copy_from_slice(&pk);

        let msg = b"hello veltaros";
        let sig = ed25519_sign(&priv64, msg).unwrap();
        assert!(ed25519_verify(&pk, msg, &sig).unwrap());

        let mut bad_sig = sig;
        bad_sig[0] ^= 0xFF;
        assert!(!ed25519_verify(&pk, msg, &bad_sig).unwrap());
    }

    #[test]
    fn wrong_sizes_are_hard_errors() {
        assert!(ed25519_sign(&[0u8; 10], b"x").is_err());
        assert!(ed25519_verify(&[0u8; 10], b"x", &[0u8; 64]).is_err());
        assert!(ed25519_verify(&[0u8; 32], b"x", &[0u8; 10]).is_err());
    }

    #[test]
    fn ct_eq_detects_any_difference() {
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"ab"));
    }
}
