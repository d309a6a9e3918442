/// XORs `payload` with the 4-byte `mask_key` in place.
///
/// Masking is an involution, so the same call masks and unmasks. Callers own
/// the "exactly once" guarantee; see [`RawFrame::unmask`](super::RawFrame::unmask).
pub(crate) fn mask(payload: &mut [u8], mask_key: [u8; 4]) {
    let word = u32::from_ne_bytes(mask_key);
    let mut chunks = payload.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let v = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ word;
        chunk.copy_from_slice(&v.to_ne_bytes());
    }
    // tail < 4 bytes, key index restarts at 0 since chunks were 4-aligned
    for (i, b) in chunks.into_remainder().iter_mut().enumerate() {
        *b ^= mask_key[i];
    }
}
