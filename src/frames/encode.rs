use bytes::{BufMut, Bytes, BytesMut};

use super::{Opcode, mask};

/// Encodes a single unmasked frame with FIN set.
///
/// Servers never mask, so this is the encoding for every response.
#[must_use]
pub fn encode(opcode: Opcode, payload: &[u8]) -> Bytes { encode_frame(opcode, payload, None) }

/// Encodes a single frame masked with `mask_key`, as clients must send.
#[must_use]
pub fn encode_masked(opcode: Opcode, payload: &[u8], mask_key: [u8; 4]) -> Bytes {
    encode_frame(opcode, payload, Some(mask_key))
}

fn encode_frame(opcode: Opcode, payload: &[u8], mask_key: Option<[u8; 4]>) -> Bytes {
    tracing::trace!(
        opcode = ?opcode,
        len = payload.len(),
        masked = mask_key.is_some(),
        "encoding frame"
    );

    let mut buf = BytesMut::with_capacity(payload.len() + 14);
    buf.put_u8(0x80 | u8::from(opcode));

    let mask_bit = if mask_key.is_some() { 0x80 } else { 0 };
    // push LEN
    #[allow(clippy::cast_possible_truncation)]
    match payload.len() {
        0..=125 => buf.put_u8(mask_bit | payload.len() as u8),
        126..=65535 => {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(payload.len() as u16);
        }
        _ => {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(payload.len() as u64);
        }
    }

    if let Some(key) = mask_key {
        buf.extend_from_slice(&key);
        let start = buf.len();
        buf.extend_from_slice(payload);
        mask(&mut buf[start..], key);
    } else {
        buf.extend_from_slice(payload);
    }

    buf.freeze()
}
