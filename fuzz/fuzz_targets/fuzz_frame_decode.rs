// Copyright (c) 2026 Veltaros
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use veltaros_node::networking::frame::{decode_frame, MessageType};

fuzz_target!(|data: &[u8]| {
    // Length-prefix parsing and message-type dispatch must never panic on
    // adversarial input, only ever return an error.
    let _ = decode_frame(data);
    if !data.is_empty() {
        let _ = MessageType::from_u8(data[0]);
    }
});
