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

//! Length-prefixed wire framing:
//!
//! ```text
//! [4 bytes LE length][1 byte type][payload ...]
//! ```
//!
//! `length = 1 + len(payload)`, bounded to `[2, 2^20]`.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

/// Maximum total frame length (`1 + payload`), inclusive.
pub const MAX_FRAME_LEN: u32 = 1 << 20;
/// Minimum total frame length: 1 type byte + 1 payload byte.
pub const MIN_FRAME_LEN: u32 = 2;
/// Default per-frame read/write deadline.
pub const DEFAULT_FRAME_DEADLINE: Duration = Duration::from_secs(7);

/// Wire message type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    /// Identity handshake.
    Hello = 1,
    /// Keepalive ping.
    Ping = 2,
    /// Keepalive pong.
    Pong = 3,
    /// Graceful disconnect notice.
    Goodbye = 4,
    /// Request for known peers.
    GetPeers = 10,
    /// Response carrying known peers.
    Peers = 11,
    /// Handshake proof-of-key challenge.
    Challenge = 20,
    /// Response to a challenge.
    ChallengeResp = 21,
}

impl MessageType {
    /// Decode a wire byte into a known message type.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Hello),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Goodbye),
            10 => Some(Self::GetPeers),
            11 => Some(Self::Peers),
            20 => Some(Self::Challenge),
            21 => Some(Self::ChallengeResp),
            _ => None,
        }
    }

    /// Encode to the wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A decoded frame: message type plus payload bytes.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Message type tag.
    pub msg_type: u8,
    /// Payload bytes (never empty: frame length is at least 2).
    pub payload: Vec<u8>,
}

/// Frame codec errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer sent a payload-less frame (a writer bug; readers still reject it).
    #[error("empty payload")]
    EmptyPayload,
    /// The frame exceeded [`MAX_FRAME_LEN`].
    #[error("frame too large")]
    TooLarge,
    /// The declared length was below [`MIN_FRAME_LEN`].
    #[error("frame too small")]
    TooSmall,
    /// Message type byte was 0, or otherwise unrecognized.
    #[error("unknown message type")]
    UnknownType,
    /// The read or write did not complete within the per-frame deadline.
    #[error("frame deadline exceeded")]
    Timeout,
    /// The underlying connection errored or closed.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(e.to_string())
    }
}

/// Encode a frame to wire bytes. Fails on empty payload, unknown type, or
/// an oversized payload.
pub fn encode_frame(msg_type: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if MessageType::from_u8(msg_type).is_none() {
        return Err(FrameError::UnknownType);
    }
    let length = 1u32
        .checked_add(payload.len() as u32)
        .ok_or(FrameError::TooLarge)?;
    if length > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge);
    }

    let mut out = Vec::with_capacity(4 + 1 + payload.len());
    out.extend_from_slice(&length.to_le_bytes());
    out.push(msg_type);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Write a single frame to `writer`, bounded by `deadline`.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
    deadline: Duration,
) -> Result<(), FrameError> {
    let bytes = encode_frame(msg_type, payload)?;
    timeout(deadline, async {
        writer.write_all(&bytes).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| FrameError::Timeout)??;
    Ok(())
}

/// Parse a declared length prefix and the frame body that follows it. Pure
/// and panic-free on arbitrary input; shared by [`read_frame`] and the
/// wire-format fuzz target.
pub fn decode_frame_body(length: u32, rest: &[u8]) -> Result<Frame, FrameError> {
    if length < MIN_FRAME_LEN {
        return Err(FrameError::TooSmall);
    }
    if length > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge);
    }
    if rest.len() != length as usize {
        return Err(FrameError::Io("short body".to_string()));
    }

    let msg_type = rest[0];
    if MessageType::from_u8(msg_type).is_none() {
        return Err(FrameError::UnknownType);
    }

    Ok(Frame { msg_type, payload: rest[1..].to_vec() })
}

/// Decode a complete in-memory buffer laid out as `[4 LE length][body]`,
/// with no framing I/O involved. Used by the fuzz target; never panics.
pub fn decode_frame(data: &[u8]) -> Result<Frame, FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooSmall);
    }
    let length = u32::from_le_bytes(data[0..4].try_into().expect("slice is exactly 4 bytes"));
    decode_frame_body(length, &data[4..])
}

/// Read a single frame from `reader`, bounded by `deadline`. Enforces the
/// same length and type bounds as the writer, and rejects unknown type 0.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    deadline: Duration,
) -> Result<Frame, FrameError> {
    timeout(deadline, async {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let length = u32::from_le_bytes(len_buf);

        if length < MIN_FRAME_LEN {
            return Err(FrameError::TooSmall);
        }
        if length > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge);
        }

        let mut rest = vec![0u8; length as usize];
        reader.read_exact(&mut rest).await?;

        decode_frame_body(length, &rest)
    })
    .await
    .map_err(|_| FrameError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_boundary_lengths() {
        // length exactly 2 (1 type + 1 payload byte) is accepted.
        let frame = encode_frame(MessageType::Ping.to_u8(), &[0xAB]).unwrap();
        let length = u32::from_le_bytes(frame[0..4].try_into().unwrap());
        assert_eq!(length, 2);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(encode_frame(MessageType::Ping.to_u8(), &[]), Err(FrameError::EmptyPayload)));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = vec![0u8; MAX_FRAME_LEN as usize]; // length would be MAX+1
        assert!(matches!(encode_frame(MessageType::Ping.to_u8(), &payload), Err(FrameError::TooLarge)));
    }

    #[test]
    fn unknown_type_is_rejected_by_encoder() {
        assert!(matches!(encode_frame(0, &[1]), Err(FrameError::UnknownType)));
        assert!(matches!(encode_frame(99, &[1]), Err(FrameError::UnknownType)));
    }

    #[tokio::test]
    async fn round_trips_over_a_duplex_pair() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_frame(&mut a, MessageType::Ping.to_u8(), b"abc", Duration::from_secs(1))
            .await
            .unwrap();
        let frame = read_frame(&mut b, Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame.msg_type, MessageType::Ping.to_u8());
        assert_eq!(frame.payload, b"abc");
    }

    #[tokio::test]
    async fn reader_rejects_length_one_and_length_zero() {
        for bad_len in [0u32, 1u32] {
            let (mut a, mut b) = tokio::io::duplex(64);
            a.write_all(&bad_len.to_le_bytes()).await.unwrap();
            // Reading only the declared prefix: a length of 0 or 1 is
            // rejected before the reader waits for a body that may never
            // arrive within the deadline.
            let result = read_frame(&mut b, Duration::from_millis(200)).await;
            assert!(result.is_err());
            drop(a);
        }
    }

    #[tokio::test]
    async fn reader_rejects_oversized_declared_length() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let too_big = MAX_FRAME_LEN + 1;
        a.write_all(&too_big.to_le_bytes()).await.unwrap();
        let result = read_frame(&mut b, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(FrameError::TooLarge)));
    }

    #[tokio::test]
    async fn reader_rejects_unknown_type_byte() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let length: u32 = 2; // type byte + 1 payload byte
        a.write_all(&length.to_le_bytes()).await.unwrap();
        a.write_all(&[0u8, 0xFF]).await.unwrap(); // type 0 is unknown
        let result = read_frame(&mut b, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(FrameError::UnknownType)));
    }

    #[test]
    fn decode_frame_matches_encode_frame() {
        let encoded = encode_frame(MessageType::Pong.to_u8(), b"hi").unwrap();
        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.msg_type, MessageType::Pong.to_u8());
        assert_eq!(frame.payload, b"hi");
    }

    #[test]
    fn decode_frame_never_panics_on_truncated_input() {
        for n in 0..8 {
            let _ = decode_frame(&vec![0u8; n]);
        }
    }
}
