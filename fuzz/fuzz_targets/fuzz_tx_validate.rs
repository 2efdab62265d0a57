// Copyright (c) 2026 Veltaros
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use veltaros_node::core::tx::{validate_with_pubkey_binding, SignedTx};

fuzz_target!(|data: &[u8]| {
    // A signed transaction is ordinary JSON on the wire; arbitrary bytes
    // parsed as a SignedTx must validate cleanly or be rejected, never
    // panic, regardless of how malformed the hex/signature/memo fields are.
    if let Ok(tx) = serde_json::from_slice::<SignedTx>(data) {
        let _ = validate_with_pubkey_binding(&tx, 0);
    }
});
