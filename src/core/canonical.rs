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

//! Canonical, byte-exact serialization of an unsigned transaction draft.
//!
//! This is deliberately *not* derived `serde_json::to_vec` output: field
//! order, presence, and escaping are fixed explicitly here so that any
//! correct re-implementation produces byte-identical output for the same
//! draft, which `tx id` derivation depends on.

use crate::core::tx::TxDraft;

/// Escape a string the way `serde_json` would for a JSON string literal,
/// written out explicitly so the format cannot silently drift with a
/// dependency upgrade.
fn write_json_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Encode a draft into its canonical byte representation.
///
/// Field order is fixed: `version, networkId, from, to, amount, fee, nonce,
/// timestamp, memo`. `memo` is always emitted, as an empty string when
/// absent. No insignificant whitespace is emitted.
pub fn canonical(draft: &TxDraft) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    out.push(b'{');
    out.extend_from_slice(b"\"version\":");
    out.extend_from_slice(draft.version.to_string().as_bytes());
    out.extend_from_slice(b",\"networkId\":");
    write_json_string(&mut out, &draft.network_id);
    out.extend_from_slice(b",\"from\":");
    write_json_string(&mut out, &draft.from);
    out.extend_from_slice(b",\"to\":");
    write_json_string(&mut out, &draft.to);
    out.extend_from_slice(b",\"amount\":");
    out.extend_from_slice(draft.amount.to_string().as_bytes());
    out.extend_from_slice(b",\"fee\":");
    out.extend_from_slice(draft.fee.to_string().as_bytes());
    out.extend_from_slice(b",\"nonce\":");
    out.extend_from_slice(draft.nonce.to_string().as_bytes());
    out.extend_from_slice(b",\"timestamp\":");
    out.extend_from_slice(draft.timestamp.to_string().as_bytes());
    out.extend_from_slice(b",\"memo\":");
    write_json_string(&mut out, draft.memo.as_deref().unwrap_or(""));
    out.push(b'}');
    out
}
