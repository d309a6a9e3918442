/// Frame opcodes as specified in
/// [RFC 6455](https://www.rfc-editor.org/rfc/rfc6455#section-5.2).
///
/// Close (0x8) and the unassigned values are not handled by this server and
/// surface as [`Opcode::Reserved`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opcode {
    Cont,
    Text,
    Bin,
    Ping,
    Pong,
    Reserved(u8),
}

impl From<u8> for Opcode {
    fn from(b: u8) -> Self {
        match b & 0x0F {
            0x0 => Self::Cont,
            0x1 => Self::Text,
            0x2 => Self::Bin,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        match op {
            Opcode::Cont => 0x0,
            Opcode::Text => 0x1,
            Opcode::Bin => 0x2,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(b) => b & 0x0F,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_roundtrip() {
        for b in 0u8..16 {
            assert_eq!(u8::from(Opcode::from(b)), b);
        }
    }

    #[test]
    fn close_is_reserved() {
        assert_eq!(Opcode::from(0x8), Opcode::Reserved(0x8));
        assert_eq!(Opcode::from(0x3), Opcode::Reserved(0x3));
        assert_eq!(Opcode::from(0x9), Opcode::Ping);
    }
}
