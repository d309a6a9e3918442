use std::ops::Deref;

use bytes::BytesMut;

use super::{FrameHeader, Opcode, RawFrame};

// helper type since decoder errors return FrameParseError
type Result<T> = std::result::Result<T, FrameParseError>;

#[derive(Debug)]
pub enum FrameState {
    Complete(RawFrame),
    Incomplete,
}

/// Malformed frame headers. Fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameParseError {
    /// 64-bit length with the most significant bit set.
    #[error("unsupported payload length encoding")]
    Length,
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    TooBig { len: u64, max: usize },
}

/// Incremental frame decoder.
///
/// Bytes are pushed in as they are read; [`FrameDecoder::next_frame`] yields a
/// frame once its header and whole payload are buffered. Payloads are returned
/// still masked.
pub struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
    ctx: DecodeContext,
    max_payload: usize,
}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    Header1,
    Header2,
    ExtendedLen,
    Mask,
    Payload,
}

#[derive(Debug)]
struct DecodeContext {
    fin: bool,
    rsv: u8,
    opcode: Opcode,
    masked: bool,
    payload_len: u64,
    mask_key: Option<[u8; 4]>,
}

impl DecodeContext {
    fn empty() -> Self {
        Self {
            fin: false,
            rsv: 0,
            opcode: Opcode::Cont,
            masked: false,
            payload_len: 0,
            mask_key: None,
        }
    }
}

impl FrameDecoder {
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            state: DecodeState::Header1,
            ctx: DecodeContext::empty(),
            max_payload,
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }

    /// Bytes received but not yet consumed by a frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buf.len() }

    pub fn next_frame(&mut self) -> Result<FrameState> {
        tracing::trace!(
            state = ?self.state,
            buf_len = self.buf.len(),
            "decoder"
        );
        loop {
            let next_state = match self.state {
                DecodeState::Header1 => {
                    let Some([b]) = self.pop_n::<1>() else {
                        return Ok(FrameState::Incomplete);
                    };
                    self.parse_header1(b)
                }
                DecodeState::Header2 => {
                    let Some([b]) = self.pop_n::<1>() else {
                        return Ok(FrameState::Incomplete);
                    };
                    self.parse_header2(b)?
                }
                DecodeState::ExtendedLen => match self.parse_extended_len()? {
                    Some(state) => state,
                    None => return Ok(FrameState::Incomplete),
                },
                DecodeState::Mask => {
                    let Some(key) = self.pop_n() else {
                        return Ok(FrameState::Incomplete);
                    };
                    self.ctx.mask_key = Some(key);
                    DecodeState::Payload
                }
                DecodeState::Payload => {
                    let Some(frame) = self.take_payload() else {
                        return Ok(FrameState::Incomplete);
                    };
                    self.state = DecodeState::Header1;
                    tracing::trace!(
                        opcode = ?frame.header().opcode,
                        fin = frame.header().fin,
                        payload_len = frame.header().length,
                        masked = frame.is_masked(),
                        "frame decoded"
                    );
                    return Ok(FrameState::Complete(frame));
                }
            };
            tracing::trace!(
                from = ?self.state,
                to = ?next_state,
                "state transition"
            );
            self.state = next_state;
        }
    }

    fn parse_header1(&mut self, b: u8) -> DecodeState {
        // 0   | 1 2 3 | 4 5 6 7
        // Fin | Rsv   | Opcode
        self.ctx = DecodeContext {
            fin: b & 0b1000_0000 > 0,
            rsv: (b & 0b0111_0000) >> 4,
            opcode: Opcode::from(b),
            ..DecodeContext::empty()
        };
        DecodeState::Header2
    }

    fn parse_header2(&mut self, b: u8) -> Result<DecodeState> {
        // 0    | 1 2 3 4 5 6 7
        // Mask | Payload len
        self.ctx.masked = b & 0b1000_0000 > 0;
        self.ctx.payload_len = u64::from(b & 0b0111_1111);

        if self.ctx.payload_len > 125 {
            return Ok(DecodeState::ExtendedLen);
        }
        self.check_len()?;
        Ok(self.after_len())
    }

    fn parse_extended_len(&mut self) -> Result<Option<DecodeState>> {
        self.ctx.payload_len = if self.ctx.payload_len == 126 {
            // 126 => 2 bytes extended (u16)
            let Some(len_bytes) = self.pop_n() else {
                return Ok(None);
            };
            u64::from(u16::from_be_bytes(len_bytes))
        } else {
            // 127 => 8 bytes extended (u64), MSB must be 0
            let Some(len_bytes) = self.pop_n() else {
                return Ok(None);
            };
            let len = u64::from_be_bytes(len_bytes);
            if len >> 63 != 0 {
                tracing::warn!(len, "64-bit length with MSB set");
                return Err(self.reset(FrameParseError::Length));
            }
            len
        };
        self.check_len()?;
        Ok(Some(self.after_len()))
    }

    fn after_len(&self) -> DecodeState {
        if self.ctx.masked {
            DecodeState::Mask
        } else {
            DecodeState::Payload
        }
    }

    fn check_len(&mut self) -> Result<()> {
        let len = self.ctx.payload_len;
        if !usize::try_from(len).is_ok_and(|l| l <= self.max_payload) {
            tracing::warn!(len, max = self.max_payload, "payload larger than maximum size");
            return Err(self.reset(FrameParseError::TooBig {
                len,
                max: self.max_payload,
            }));
        }
        Ok(())
    }

    fn take_payload(&mut self) -> Option<RawFrame> {
        // check_len guarantees the length fits in usize
        let len = usize::try_from(self.ctx.payload_len).ok()?;
        if self.buf.len() < len {
            return None;
        }
        let payload = self.buf.split_to(len);
        Some(RawFrame::new(
            FrameHeader {
                fin: self.ctx.fin,
                rsv: self.ctx.rsv,
                opcode: self.ctx.opcode,
                mask_key: self.ctx.mask_key,
                length: self.ctx.payload_len,
            },
            payload,
        ))
    }

    fn reset(&mut self, err: FrameParseError) -> FrameParseError {
        self.buf.clear();
        self.state = DecodeState::Header1;
        err
    }

    fn pop_n<const N: usize>(&mut self) -> Option<[u8; N]> {
        if N > self.buf.len() {
            return None;
        }
        self.buf.split_to(N).deref().try_into().ok()
    }
}
