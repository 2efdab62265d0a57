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

//! Signed-transaction model: canonical hashing, domain-separated signing, and
//! strict validation.

use crate::core::address::{address_from_pubkey, validate_address};
use crate::core::canonical::canonical;
use crate::core::crypto::{dsha256, ed25519_sign, ed25519_verify, sha256};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Domain separator for the transaction signing message.
const TX_SIGN_DOMAIN: &[u8] = b"veltaros-tx-sign";

/// Maximum memo length in bytes.
pub const MAX_MEMO_BYTES: usize = 256;

/// Allowed clock skew, backward (transactions older than this are rejected).
pub const MAX_PAST_SKEW_SECS: i64 = 24 * 3600;
/// Allowed clock skew, forward.
pub const MAX_FUTURE_SKEW_SECS: i64 = 5 * 60;

/// An unsigned transaction draft, in canonical field order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxDraft {
    /// Protocol version; must equal 1.
    pub version: u32,
    /// Network identifier this transaction is bound to.
    #[serde(rename = "networkId")]
    pub network_id: String,
    /// Sender address (hex).
    pub from: String,
    /// Recipient address (hex).
    pub to: String,
    /// Amount to transfer, in the smallest unit.
    pub amount: u64,
    /// Fee, deducted from `amount`.
    pub fee: u64,
    /// Strictly-increasing per-sender nonce.
    pub nonce: u64,
    /// Unix seconds.
    pub timestamp: i64,
    /// Optional memo, UTF-8, at most `MAX_MEMO_BYTES`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// A transaction draft plus its signature and the signer's raw public key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedTx {
    /// The signed draft.
    pub draft: TxDraft,
    /// Raw Ed25519 public key bytes (32), hex-encoded.
    pub pubkey: String,
    /// Ed25519 signature bytes (64), hex-encoded.
    pub signature: String,
    /// `hex(DSHA256(canonical(draft)))`.
    #[serde(rename = "txId")]
    pub tx_id: String,
}

/// Transaction signing errors.
#[derive(Debug, Error)]
pub enum SignError {
    /// The private key was not 64 bytes.
    #[error("invalid private key")]
    InvalidPrivateKey,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Compute the signature message: `SHA256(domain || networkId || h)` where
/// `h = DSHA256(canonical(draft))`.
pub fn signing_message(network_id: &str, tx_hash: &[u8; 32]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(TX_SIGN_DOMAIN.len() + network_id.len() + 32);
    buf.extend_from_slice(TX_SIGN_DOMAIN);
    buf.extend_from_slice(network_id.as_bytes());
    buf.extend_from_slice(tx_hash);
    sha256(&buf)
}

/// Compute `txId = DSHA256(canonical(draft))`.
pub fn compute_tx_hash(draft: &TxDraft) -> [u8; 32] {
    dsha256(&canonical(draft))
}

/// Sign a draft with a 64-byte Ed25519 private key (`seed(32) || pubkey(32)`).
///
/// Fills in `timestamp` (if zero) and `version` (if zero) before hashing.
pub fn sign(privkey_64: &[u8], pubkey_32: &[u8; 32], mut draft: TxDraft) -> Result<SignedTx, SignError> {
    if privkey_64.len() != 64 {
        return Err(SignError::InvalidPrivateKey);
    }
    if draft.timestamp == 0 {
        draft.timestamp = now_unix();
    }
    if draft.version == 0 {
        draft.version = 1;
    }

    let hash = compute_tx_hash(&draft);
    let msg = signing_message(&draft.network_id, &hash);
    let sig = ed25519_sign(privkey_64, &msg).map_err(|_| SignError::InvalidPrivateKey)?;

    Ok(SignedTx {
        draft,
        pubkey: hex::encode(pubkey_32),
        signature: hex::encode(sig),
        tx_id: hex::encode(hash),
    })
}

/// Transaction validation failures, in the order `validate` checks them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxValidationError {
    /// `version` was not 1.
    #[error("unsupported version")]
    UnsupportedVersion,
    /// `networkId` was empty.
    #[error("empty network id")]
    EmptyNetworkId,
    /// `from` failed address validation.
    #[error("invalid from address")]
    InvalidFrom,
    /// `to` failed address validation.
    #[error("invalid to address")]
    InvalidTo,
    /// `from == to`.
    #[error("from and to must differ")]
    SelfTransfer,
    /// `amount == 0`.
    #[error("amount must be positive")]
    ZeroAmount,
    /// `fee < 1`.
    #[error("fee must be at least 1")]
    FeeTooLow,
    /// `fee > amount`.
    #[error("fee exceeds amount")]
    FeeExceedsAmount,
    /// `nonce == 0`.
    #[error("nonce must be positive")]
    ZeroNonce,
    /// `timestamp <= 0` or outside the allowed skew window.
    #[error("timestamp out of range")]
    TimestampOutOfRange,
    /// Memo exceeded `MAX_MEMO_BYTES`.
    #[error("memo too long")]
    MemoTooLong,
    /// `pubkey` did not decode to exactly 32 bytes.
    #[error("invalid public key encoding")]
    InvalidPubkeyEncoding,
    /// `signature` did not decode to exactly 64 bytes.
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,
    /// Recomputed tx id did not match the attached one.
    #[error("tx id mismatch")]
    TxIdMismatch,
    /// Ed25519 verification failed.
    #[error("signature verification failed")]
    BadSignature,
    /// `address_from_pubkey(pubkey) != draft.from` (API-layer binding check).
    #[error("public key does not match sender address")]
    PubkeyAddressMismatch,
}

/// Validate a signed transaction, stopping at the first violation. Does
/// not check address-to-pubkey binding; see
/// [`validate_with_pubkey_binding`] for the API-layer wrapper that does.
pub fn validate(tx: &SignedTx, now: i64) -> Result<(), TxValidationError> {
    let d = &tx.draft;

    if d.version != 1 {
        return Err(TxValidationError::UnsupportedVersion);
    }
    if d.network_id.is_empty() {
        return Err(TxValidationError::EmptyNetworkId);
    }

    validate_address(&d.from).map_err(|_| TxValidationError::InvalidFrom)?;
    validate_address(&d.to).map_err(|_| TxValidationError::InvalidTo)?;
    if d.from == d.to {
        return Err(TxValidationError::SelfTransfer);
    }

    if d.amount == 0 {
        return Err(TxValidationError::ZeroAmount);
    }
    if d.fee < 1 {
        return Err(TxValidationError::FeeTooLow);
    }
    if d.fee > d.amount {
        return Err(TxValidationError::FeeExceedsAmount);
    }

    if d.nonce == 0 {
        return Err(TxValidationError::ZeroNonce);
    }
    if d.timestamp <= 0
        || d.timestamp < now - MAX_PAST_SKEW_SECS
        || d.timestamp > now + MAX_FUTURE_SKEW_SECS
    {
        return Err(TxValidationError::TimestampOutOfRange);
    }

    if d.memo.as_deref().unwrap_or("").len() > MAX_MEMO_BYTES {
        return Err(TxValidationError::MemoTooLong);
    }

    let pubkey = hex::decode(&tx.pubkey).map_err(|_| TxValidationError::InvalidPubkeyEncoding)?;
    if pubkey.len() != 32 {
        return Err(TxValidationError::InvalidPubkeyEncoding);
    }
    let sig = hex::decode(&tx.signature).map_err(|_| TxValidationError::InvalidSignatureEncoding)?;
    if sig.len() != 64 {
        return Err(TxValidationError::InvalidSignatureEncoding);
    }

    let hash = compute_tx_hash(d);
    if hex::encode(hash) != tx.tx_id {
        return Err(TxValidationError::TxIdMismatch);
    }

    let msg = signing_message(&d.network_id, &hash);
    let ok = ed25519_verify(&pubkey, &msg, &sig).map_err(|_| TxValidationError::BadSignature)?;
    if !ok {
        return Err(TxValidationError::BadSignature);
    }

    Ok(())
}

/// Validate a signed transaction and additionally require that the attached
/// public key hashes to the claimed sender address, closing the spoofing
/// gap a signature check alone leaves open (see DESIGN.md).
pub fn validate_with_pubkey_binding(tx: &SignedTx, now: i64) -> Result<(), TxValidationError> {
    validate(tx, now)?;
    let pubkey = hex::decode(&tx.pubkey).map_err(|_| TxValidationError::InvalidPubkeyEncoding)?;
    if address_from_pubkey(&pubkey) != tx.draft.from {
        return Err(TxValidationError::PubkeyAddressMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::generate_ed25519_seed;

    fn keypair() -> ([u8; 64], [u8; 32]) {
        let (seed, pk) = generate_ed25519_seed().unwrap();
        let mut priv64 = [0u8; 64];
        priv64[..32].copy_from_slice(&seed);
        priv64[32..].copy_from_slice(&pk);
        (priv64, pk)
    }

    fn base_draft(from: &str, to: &str) -> TxDraft {
        TxDraft {
            version: 1,
            network_id: "veltaros-testnet".to_string(),
            from: from.to_string(),
            to: to.to_string(),
            amount: 1000,
            fee: 10,
            nonce: 1,
            timestamp: now_unix(),
            memo: None,
        }
    }

    #[test]
    fn signed_tx_happy_path() {
        let (priv64, pk) = keypair();
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);

        let draft = base_draft(&from, &to);
        let signed = sign(&priv64, &pk, draft).unwrap();

        assert!(validate(&signed, now_unix()).is_ok());
        assert!(validate_with_pubkey_binding(&signed, now_unix()).is_ok());
        assert_eq!(signed.tx_id, hex::encode(compute_tx_hash(&signed.draft)));
    }

    #[test]
    fn fee_equal_to_amount_is_accepted() {
        let (priv64, pk) = keypair();
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);

        let mut draft = base_draft(&from, &to);
        draft.fee = draft.amount;
        let signed = sign(&priv64, &pk, draft).unwrap();
        assert!(validate(&signed, now_unix()).is_ok());
    }

    #[test]
    fn fee_exceeding_amount_is_rejected() {
        let (priv64, pk) = keypair();
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);

        let mut draft = base_draft(&from, &to);
        draft.fee = draft.amount + 1;
        let signed = sign(&priv64, &pk, draft).unwrap();
        assert_eq!(validate(&signed, now_unix()), Err(TxValidationError::FeeExceedsAmount));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let (priv64, pk) = keypair();
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);

        let mut draft = base_draft(&from, &to);
        draft.amount = 0;
        draft.fee = 0;
        let signed = sign(&priv64, &pk, draft).unwrap();
        assert_eq!(validate(&signed, now_unix()), Err(TxValidationError::ZeroAmount));
    }

    #[test]
    fn timestamp_boundaries() {
        let (priv64, pk) = keypair();
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);
        let now = now_unix();

        let mut ok_draft = base_draft(&from, &to);
        ok_draft.timestamp = now - MAX_PAST_SKEW_SECS + 1;
        let ok_signed = sign(&priv64, &pk, ok_draft).unwrap();
        assert!(validate(&ok_signed, now).is_ok());

        let mut bad_draft = base_draft(&from, &to);
        bad_draft.timestamp = now - MAX_PAST_SKEW_SECS - 1;
        let bad_signed = sign(&priv64, &pk, bad_draft).unwrap();
        assert_eq!(validate(&bad_signed, now), Err(TxValidationError::TimestampOutOfRange));
    }

    #[test]
    fn tampered_signature_fails_binding_and_signature_checks() {
        let (priv64, pk) = keypair();
        let from = address_from_pubkey(&pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);

        let draft = base_draft(&from, &to);
        let mut signed = sign(&priv64, &pk, draft).unwrap();
        signed.draft.amount += 1; // mutate after signing
        assert_eq!(validate(&signed, now_unix()), Err(TxValidationError::TxIdMismatch));
    }

    #[test]
    fn pubkey_not_matching_from_is_rejected_by_binding_check() {
        let (priv64, pk) = keypair();
        let (_, unrelated_pk) = keypair();
        let spoofed_from = address_from_pubkey(&unrelated_pk);
        let (_, other_pk) = keypair();
        let to = address_from_pubkey(&other_pk);

        let draft = base_draft(&spoofed_from, &to);
        let signed = sign(&priv64, &pk, draft).unwrap();
        // Plain validate() only checks signature/id math, so it still passes.
        assert!(validate(&signed, now_unix()).is_ok());
        // The API-layer wrapper closes the spoofing gap.
        assert_eq!(
            validate_with_pubkey_binding(&signed, now_unix()),
            Err(TxValidationError::PubkeyAddressMismatch)
        );
    }
}
