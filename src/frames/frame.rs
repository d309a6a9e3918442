use bytes::{Bytes, BytesMut};

use super::{Opcode, encode, mask};

/// Header fields of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Recorded but not acted on; fragmented messages are not reassembled.
    pub fin: bool,
    pub rsv: u8,
    pub opcode: Opcode,
    pub mask_key: Option<[u8; 4]>,
    /// Declared payload length, equal to the payload's length once decoded.
    pub length: u64,
}

/// A frame as it came off the wire, payload still masked.
///
/// The payload is split off the decoder's read buffer, so it shares that
/// allocation. The only way to read it is [`RawFrame::unmask`], which takes the
/// frame by value: a payload cannot be unmasked twice.
#[derive(Debug)]
pub struct RawFrame {
    header: FrameHeader,
    payload: BytesMut,
}

impl RawFrame {
    pub(crate) fn new(header: FrameHeader, payload: BytesMut) -> Self {
        debug_assert_eq!(header.length, payload.len() as u64);
        Self { header, payload }
    }

    #[must_use]
    pub fn header(&self) -> &FrameHeader { &self.header }

    #[must_use]
    pub fn is_masked(&self) -> bool { self.header.mask_key.is_some() }

    /// Recovers the plaintext payload in place and hands it over.
    ///
    /// Frames sent without a mask key pass through untouched.
    #[must_use]
    pub fn unmask(self) -> Frame {
        let Self {
            header,
            mut payload,
        } = self;
        if let Some(key) = header.mask_key {
            mask(&mut payload, key);
        }
        Frame {
            opcode: header.opcode,
            payload: payload.freeze(),
            masked: header.mask_key.is_some(),
        }
    }
}

/// A frame ready for interpretation: plaintext payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Bytes,
    /// Whether the frame arrived masked.
    pub masked: bool,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
            masked: false,
        }
    }

    pub fn text(payload: impl Into<Bytes>) -> Self { Self::new(Opcode::Text, payload) }

    pub fn binary(payload: impl Into<Bytes>) -> Self { Self::new(Opcode::Bin, payload) }

    #[must_use]
    pub fn len(&self) -> usize { self.payload.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.payload.is_empty() }

    /// Payload as UTF-8, if it is valid.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> { std::str::from_utf8(&self.payload).ok() }

    /// Unmasked wire encoding, for the server-to-client direction.
    #[must_use]
    pub fn encode(&self) -> Bytes { encode(self.opcode, &self.payload) }
}
