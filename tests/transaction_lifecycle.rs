// Copyright (c) 2026 Veltaros
// Licensed under the Apache-2.0 License.

//! End-to-end exercise of submit -> mempool -> dev-confirm -> restart,
//! wiring the pieces the way the node binary does, without going through
//! the HTTP facade.

use veltaros_node::core::chain::ChainStore;
use veltaros_node::core::crypto::generate_ed25519_seed;
use veltaros_node::core::ledger::{Ledger, LedgerStore};
use veltaros_node::core::mempool::Mempool;
use veltaros_node::core::nonce::{NonceStore, NonceTracker};
use veltaros_node::core::tx::{self, TxDraft};

const NETWORK_ID: &str = "veltaros-testnet";

fn keypair() -> ([u8; 64], [u8; 32], String) {
    let (seed, pk) = generate_ed25519_seed().unwrap();
    let mut priv64 = [0u8; 64];
    priv64[..32].copy_from_slice(&seed);
    priv64[32..].copy_from_slice(&pk);
    let addr = veltaros_node::core::address::address_from_pubkey(&pk);
    (priv64, pk, addr)
}

fn draft(from: &str, to: &str, amount: u64, fee: u64, nonce: u64) -> TxDraft {
    TxDraft {
        version: 1,
        network_id: NETWORK_ID.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        amount,
        fee,
        nonce,
        timestamp: 0,
        memo: None,
    }
}

#[test]
fn two_sender_confirm_round_persists_balances_and_height_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.json");
    let nonce_path = dir.path().join("nonces.json");
    let blocks_path = dir.path().join("blocks.json");

    let (priv_a, pk_a, addr_a) = keypair();
    let (priv_b, pk_b, addr_b) = keypair();
    let (_priv_c, _pk_c, addr_c) = keypair();

    {
        let ledger = Ledger::new();
        ledger.faucet_credit(&addr_a, 1_000);
        ledger.faucet_credit(&addr_b, 1_000);
        LedgerStore::new(&ledger_path).save(&ledger).unwrap();

        let nonces = NonceTracker::new();
        let mempool = Mempool::new();
        let chain = ChainStore::new(&blocks_path);
        chain.load().unwrap();
        assert_eq!(chain.height(), 0);

        let tx_a = tx::sign(&priv_a, &pk_a, draft(&addr_a, &addr_c, 100, 1, 1)).unwrap();
        let tx_b = tx::sign(&priv_b, &pk_b, draft(&addr_b, &addr_c, 50, 1, 1)).unwrap();

        for signed in [&tx_a, &tx_b] {
            tx::validate_with_pubkey_binding(signed, signed.draft.timestamp).unwrap();
            assert!(nonces.check_and_update(&signed.draft.from, signed.draft.nonce));
            let required = signed.draft.amount + signed.draft.fee;
            ledger.stage_mempool_spend(&signed.draft.from, required).unwrap();
            mempool.add(signed.clone());
        }

        assert_eq!(mempool.count(), 2);
        let result = chain
            .dev_produce(&mempool, &ledger, &ledger_path, &nonces, &nonce_path)
            .unwrap();
        assert_eq!(result.applied, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(result.block.height, 1);
        assert_eq!(mempool.count(), 0);

        assert_eq!(ledger.confirmed_balance(&addr_a), 900);
        assert_eq!(ledger.confirmed_balance(&addr_b), 950);
        assert_eq!(ledger.confirmed_balance(&addr_c), 150);
        assert_eq!(ledger.pending_out(&addr_a), 0);
    }

    // Simulate a restart: fresh in-memory state, reload from the same paths.
    let ledger = Ledger::new();
    LedgerStore::new(&ledger_path).load_into(&ledger).unwrap();
    let nonces = NonceTracker::new();
    NonceStore::new(&nonce_path).load_into(&nonces).unwrap();
    let chain = ChainStore::new(&blocks_path);
    chain.load().unwrap();

    assert_eq!(chain.height(), 1);
    assert_eq!(ledger.confirmed_balance(&addr_a), 900);
    assert_eq!(ledger.confirmed_balance(&addr_c), 150);
    assert_eq!(nonces.get(&addr_a), 1);
    assert_eq!(nonces.expected_next(&addr_a), 2);
}

#[test]
fn insufficient_balance_is_rejected_before_admission() {
    let ledger = Ledger::new();
    let (priv_a, pk_a, addr_a) = keypair();
    let (_priv_b, _pk_b, addr_b) = keypair();
    ledger.faucet_credit(&addr_a, 10);

    let signed = tx::sign(&priv_a, &pk_a, draft(&addr_a, &addr_b, 100, 1, 1)).unwrap();
    tx::validate_with_pubkey_binding(&signed, signed.draft.timestamp).unwrap();
    assert!(ledger.stage_mempool_spend(&addr_a, 101).is_err());
}

#[test]
fn replayed_nonce_is_rejected_on_second_submission() {
    let nonces = NonceTracker::new();
    let (priv_a, pk_a, addr_a) = keypair();
    let (_priv_b, _pk_b, addr_b) = keypair();

    let signed = tx::sign(&priv_a, &pk_a, draft(&addr_a, &addr_b, 10, 1, 5)).unwrap();
    tx::validate_with_pubkey_binding(&signed, signed.draft.timestamp).unwrap();
    assert!(nonces.check_and_update(&addr_a, 5));
    assert!(!nonces.check_and_update(&addr_a, 5));
    assert!(!nonces.check_and_update(&addr_a, 4));
}

#[test]
fn spoofed_pubkey_address_binding_is_rejected() {
    let (priv_a, pk_a, _addr_a) = keypair();
    let (_priv_b, pk_b, addr_b) = keypair();
    let (_priv_c, _pk_c, addr_c) = keypair();

    // Sign with A's key but claim `from` = B's address: the signature
    // itself is valid (it was produced with A's key over a draft naming
    // B), yet the address binding check must still fail.
    let d = draft(&addr_b, &addr_c, 10, 1, 1);
    let signed = tx::sign(&priv_a, &pk_a, d).unwrap();

    assert!(tx::validate_with_pubkey_binding(&signed, signed.draft.timestamp).is_err());
    let _ = pk_b;
}
