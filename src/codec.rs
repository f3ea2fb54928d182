//! Binary wire framing (spec §4.1).
//!
//! ```text
//! magic(2) | version(1) | type(1) | ttl(1) | flags(1)
//!          | id(16) | source_id(16) | target_id(16, present if flags.bit0)
//!          | origin_ts(8) | payload_len(4) | payload(<= max_data_packet_size)
//!          | content_hash(32)
//! ```
//! All multi-byte fields are big-endian. `flags.bit0` is the has-target
//! flag; all other flag bits are reserved and must be zero.

use crate::crypto::CryptoProvider;
use crate::error::CodecError;
use crate::message::{Message, MessageType, PeerId};
use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

const MAGIC: [u8; 2] = *b"SA";
const VERSION: u8 = 1;
const FLAG_HAS_TARGET: u8 = 0b0000_0001;
const FLAG_RESERVED_MASK: u8 = !FLAG_HAS_TARGET;

/// `source_id`/`target_id` on the wire are fixed 16-byte fields; a
/// `PeerId` longer than that is truncated, shorter is zero-padded. Peer
/// ids in practice are transport-assigned UUID-shaped tokens, so this is
/// not a lossy path in normal operation — it only bounds the frame size.
fn peer_id_to_wire(id: &PeerId) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = id.0.as_bytes();
    let n = bytes.len().min(16);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn peer_id_from_wire(buf: &[u8; 16]) -> PeerId {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(16);
    PeerId(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Encode a well-formed message into a self-contained frame. Always
/// succeeds (spec §4.1: "always succeeds on a well-formed message").
pub fn encode(message: &Message) -> Bytes {
    let has_target = message.target_id.is_some();
    let mut flags = 0u8;
    if has_target {
        flags |= FLAG_HAS_TARGET;
    }

    let mut buf = BytesMut::with_capacity(
        2 + 1 + 1 + 1 + 1 + 16 + 16 + if has_target { 16 } else { 0 } + 8 + 4 + message.payload.len() + 32,
    );
    buf.put_slice(&MAGIC);
    buf.put_u8(VERSION);
    buf.put_u8(message.kind.to_wire());
    buf.put_u8(message.ttl);
    buf.put_u8(flags);
    buf.put_slice(message.id.as_bytes());
    buf.put_slice(&peer_id_to_wire(&message.source_id));
    if let Some(target) = &message.target_id {
        buf.put_slice(&peer_id_to_wire(target));
    }
    buf.put_u64(message.origin_timestamp);
    buf.put_u32(message.payload.len() as u32);
    buf.put_slice(&message.payload);
    buf.put_slice(&message.content_hash);
    buf.freeze()
}

/// Decode and validate a frame, rejecting malformed input without
/// leaving partial state (spec §4.1).
pub fn decode(
    bytes: &[u8],
    max_data_packet_size: usize,
    crypto: &dyn CryptoProvider,
) -> Result<Message, CodecError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.take(2)?;
    if magic != MAGIC {
        return Err(CodecError::MalformedFrame("bad magic"));
    }
    let version = cursor.take_u8()?;
    if version != VERSION {
        return Err(CodecError::MalformedFrame("unknown version"));
    }
    let type_byte = cursor.take_u8()?;
    let ttl = cursor.take_u8()?;
    let flags = cursor.take_u8()?;
    if flags & FLAG_RESERVED_MASK != 0 {
        return Err(CodecError::MalformedFrame("reserved flag bits set"));
    }
    let has_target = flags & FLAG_HAS_TARGET != 0;

    let id_bytes = cursor.take(16)?;
    let id = Uuid::from_slice(id_bytes).map_err(|_| CodecError::MalformedFrame("bad id"))?;

    let source_bytes: [u8; 16] = cursor.take(16)?.try_into().unwrap();
    let source_id = peer_id_from_wire(&source_bytes);

    let target_id = if has_target {
        let target_bytes: [u8; 16] = cursor.take(16)?.try_into().unwrap();
        Some(peer_id_from_wire(&target_bytes))
    } else {
        None
    };

    let origin_timestamp = cursor.take_u64()?;
    let payload_len = cursor.take_u32()? as usize;
    if payload_len > max_data_packet_size {
        return Err(CodecError::PayloadTooLarge {
            actual: payload_len,
            max: max_data_packet_size,
        });
    }
    let payload = Bytes::copy_from_slice(cursor.take(payload_len)?);

    let content_hash_bytes: [u8; 32] = cursor.take(32)?.try_into().unwrap();
    cursor.finish()?;

    let expected_hash = crypto.hash(&payload);
    if expected_hash != content_hash_bytes {
        return Err(CodecError::HashMismatch);
    }

    let kind = MessageType::from_wire(type_byte).ok_or(CodecError::UnknownType(type_byte))?;

    Ok(Message {
        id,
        kind,
        source_id,
        target_id,
        origin_timestamp,
        ttl,
        payload,
        content_hash: content_hash_bytes,
    })
}

/// Tiny bounds-checked cursor so `decode` never panics on truncated
/// input and never partially mutates anything outside its own scope.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::MalformedFrame("truncated frame"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    /// Frames are exact: no trailing bytes are tolerated.
    fn finish(self) -> Result<(), CodecError> {
        if self.pos != self.buf.len() {
            return Err(CodecError::MalformedFrame("trailing bytes"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DefaultCryptoProvider;

    fn sample_message(crypto: &DefaultCryptoProvider) -> Message {
        let payload = Bytes::from_static(b"help, trapped on 3rd floor");
        Message {
            id: Uuid::new_v4(),
            kind: MessageType::EmergencyDanger,
            source_id: PeerId::new("node-a"),
            target_id: None,
            origin_timestamp: 1_700_000_000_000,
            ttl: 7,
            content_hash: crypto.hash(&payload),
            payload,
        }
    }

    #[test]
    fn round_trip_broadcast() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let frame = encode(&msg);
        let decoded = decode(&frame, 1024 * 1024, &crypto).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trip_targeted() {
        let crypto = DefaultCryptoProvider::new();
        let mut msg = sample_message(&crypto);
        msg.target_id = Some(PeerId::new("node-b"));
        let frame = encode(&msg);
        let decoded = decode(&frame, 1024 * 1024, &crypto).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_bad_magic() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let mut frame = encode(&msg).to_vec();
        frame[0] = b'X';
        assert_eq!(
            decode(&frame, 1024 * 1024, &crypto),
            Err(CodecError::MalformedFrame("bad magic"))
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let mut frame = encode(&msg).to_vec();
        frame[2] = 99;
        assert_eq!(
            decode(&frame, 1024 * 1024, &crypto),
            Err(CodecError::MalformedFrame("unknown version"))
        );
    }

    #[test]
    fn rejects_reserved_flag_bits() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let mut frame = encode(&msg).to_vec();
        frame[4] |= 0b1000_0000;
        assert_eq!(
            decode(&frame, 1024 * 1024, &crypto),
            Err(CodecError::MalformedFrame("reserved flag bits set"))
        );
    }

    #[test]
    fn rejects_truncated_frame() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let frame = encode(&msg);
        let truncated = &frame[..frame.len() - 10];
        assert!(decode(truncated, 1024 * 1024, &crypto).is_err());
    }

    #[test]
    fn rejects_oversize_payload() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let frame = encode(&msg);
        let err = decode(&frame, 4, &crypto).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
    }

    #[test]
    fn rejects_hash_mismatch() {
        let crypto = DefaultCryptoProvider::new();
        let mut msg = sample_message(&crypto);
        msg.content_hash[0] ^= 0xFF;
        let frame = encode(&msg);
        assert_eq!(
            decode(&frame, 1024 * 1024, &crypto),
            Err(CodecError::HashMismatch)
        );
    }

    #[test]
    fn rejects_unknown_type() {
        let crypto = DefaultCryptoProvider::new();
        let msg = sample_message(&crypto);
        let mut frame = encode(&msg).to_vec();
        frame[3] = 200;
        assert_eq!(
            decode(&frame, 1024 * 1024, &crypto),
            Err(CodecError::UnknownType(200))
        );
    }
}
