// Copyright (c) 2026 Veltaros
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use veltaros_node::networking::hello::decode_hello;

fuzz_target!(|data: &[u8]| {
    // The strict no-trailing-bytes HELLO parser must reject malformed input
    // cleanly, never panic on a truncated or oversized string field.
    let _ = decode_hello(data);
});
