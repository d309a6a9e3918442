mod decode;
mod encode;
mod frame;
mod mask;
mod opcode;

pub use decode::{FrameDecoder, FrameParseError, FrameState};
pub use encode::{encode, encode_masked};
pub use frame::{Frame, FrameHeader, RawFrame};
pub(crate) use mask::mask;
pub use opcode::Opcode;
