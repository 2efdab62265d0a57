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

//! Deterministic Merkle tree over 32-byte leaves.
//!
//! `node = DSHA256(left || right)`, pairing leaves two at a time and
//! duplicating the last leaf at any odd level, until one node remains. An
//! empty leaf set yields the all-zero hash.

use crate::core::crypto::dsha256;

/// A raw 32-byte hash.
pub type Hash32 = [u8; 32];

fn hash_node(left: Hash32, right: Hash32) -> Hash32 {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&left);
    buf.extend_from_slice(&right);
    dsha256(&buf)
}

/// Build the merkle root over already-hashed 32-byte leaves (e.g.
/// transaction ids). Returns the all-zero hash for an empty input.
pub fn merkle_root_of_leaves(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash32> = leaves.to_vec();
    while level.len() > 1 {
        let mut next: Vec<Hash32> = Vec::with_capacity((level.len() + 1) / 2);
        let mut i = 0usize;
        while i < level.len() {
            let left = level[i];
            let right = if i + 1 < level.len() { level[i + 1] } else { level[i] };
            next.push(hash_node(left, right));
            i += 2;
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_zero_hash() {
        assert_eq!(merkle_root_of_leaves(&[]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_is_returned_unpaired() {
        let leaf = [7u8; 32];
        let root = merkle_root_of_leaves(&[leaf]);
        assert_eq!(root, leaf);
    }

    #[test]
    fn odd_level_duplicates_last_leaf() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        let root = merkle_root_of_leaves(&[a, b, c]);
        let top_left = hash_node(a, b);
        let top_right = hash_node(c, c);
        assert_eq!(root, hash_node(top_left, top_right));
    }

    #[test]
    fn deterministic_across_calls() {
        let leaves = vec![[9u8; 32], [8u8; 32], [7u8; 32], [6u8; 32]];
        assert_eq!(merkle_root_of_leaves(&leaves), merkle_root_of_leaves(&leaves));
    }
}
