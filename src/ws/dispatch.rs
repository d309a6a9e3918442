use std::{fmt, str::FromStr};

use crate::{
    frames::{Frame, Opcode},
    protocol::{Command, KvBridge},
};

/// Text payload that ends the session without a reply.
pub const CLOSE_COMMAND: &[u8] = b"close";
/// Payload of the Pong sent in answer to a Ping.
pub const PONG_PAYLOAD: &[u8] = b"Pong";
/// Payload of the Ping sent in answer to a Pong.
pub const PING_PAYLOAD: &[u8] = b"Ping";
/// Reply to any non-text frame in command-bridge mode.
pub const TEXT_REQUIRED: &str = "[ERROR]: Command bridge needs a Text Frame";

/// Routing policy, chosen once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Every payload comes back as a Text frame.
    #[default]
    PlainEcho,
    /// Text and Binary echoed with their own type, Ping and Pong answered.
    TypedEcho,
    /// Text payloads are `GET`/`SET` commands against a KV backend.
    CommandBridge,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "echo" => Ok(Self::PlainEcho),
            "echo-frames" | "echoFrames" => Ok(Self::TypedEcho),
            "bridge" | "redis" => Ok(Self::CommandBridge),
            other => Err(format!(
                "unknown mode {other:?}, expected one of echo, echo-frames, bridge"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PlainEcho => "echo",
            Self::TypedEcho => "echo-frames",
            Self::CommandBridge => "bridge",
        })
    }
}

/// What to do with one inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Reply(Frame),
    /// Empty frame; nothing to answer.
    Drop,
    /// The `close` command: end the session, no reply.
    Close,
    /// Unsupported opcode: end the session, no reply.
    Reject(Opcode),
}

/// The routing strategy shared by every connection of a server.
pub enum Dispatcher {
    PlainEcho,
    TypedEcho,
    CommandBridge(KvBridge),
}

impl Dispatcher {
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::PlainEcho => Mode::PlainEcho,
            Self::TypedEcho => Mode::TypedEcho,
            Self::CommandBridge(_) => Mode::CommandBridge,
        }
    }

    /// Routes an unmasked frame.
    pub async fn route(&self, frame: Frame) -> Action {
        if matches!(frame.opcode, Opcode::Cont | Opcode::Text | Opcode::Bin) && frame.is_empty() {
            return Action::Drop;
        }
        match self {
            Self::PlainEcho => plain_echo(frame),
            Self::TypedEcho => typed_echo(frame),
            Self::CommandBridge(bridge) => command_bridge(bridge, frame).await,
        }
    }
}

fn is_close_command(frame: &Frame) -> bool { frame.payload[..] == *CLOSE_COMMAND }

fn plain_echo(frame: Frame) -> Action {
    match frame.opcode {
        _ if frame.is_empty() => Action::Drop,
        op @ (Opcode::Cont | Opcode::Reserved(_)) => Action::Reject(op),
        _ if is_close_command(&frame) => Action::Close,
        _ => Action::Reply(Frame::text(frame.payload)),
    }
}

fn typed_echo(frame: Frame) -> Action {
    match frame.opcode {
        Opcode::Ping => {
            tracing::debug!("ping request");
            Action::Reply(Frame::new(Opcode::Pong, PONG_PAYLOAD))
        }
        Opcode::Pong => {
            tracing::debug!("pong request");
            Action::Reply(Frame::new(Opcode::Ping, PING_PAYLOAD))
        }
        Opcode::Text if is_close_command(&frame) => Action::Close,
        Opcode::Text => Action::Reply(Frame::text(frame.payload)),
        Opcode::Bin => Action::Reply(Frame::binary(frame.payload)),
        op @ (Opcode::Cont | Opcode::Reserved(_)) => Action::Reject(op),
    }
}

async fn command_bridge(bridge: &KvBridge, frame: Frame) -> Action {
    if frame.opcode != Opcode::Text {
        tracing::debug!(opcode = ?frame.opcode, "non-text frame in bridge mode");
        return Action::Reply(Frame::text(TEXT_REQUIRED));
    }
    if is_close_command(&frame) {
        return Action::Close;
    }
    let text = String::from_utf8_lossy(&frame.payload);
    let command = Command::parse(&text);
    Action::Reply(Frame::text(bridge.execute(&command).await))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        backend::MemoryBackend,
        protocol::{SET_USAGE, UNKNOWN_COMMAND},
    };

    fn bridge() -> Dispatcher {
        Dispatcher::CommandBridge(KvBridge::new(Arc::new(MemoryBackend::new())))
    }

    fn reply(action: Action) -> Frame {
        match action {
            Action::Reply(f) => f,
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[test]
    fn mode_names() {
        assert_eq!("echo".parse::<Mode>(), Ok(Mode::PlainEcho));
        assert_eq!("echoFrames".parse::<Mode>(), Ok(Mode::TypedEcho));
        assert_eq!("redis".parse::<Mode>(), Ok(Mode::CommandBridge));
        assert!("ping_pong".parse::<Mode>().is_err());
        for mode in [Mode::PlainEcho, Mode::TypedEcho, Mode::CommandBridge] {
            assert_eq!(mode.to_string().parse::<Mode>(), Ok(mode));
        }
    }

    #[tokio::test]
    async fn plain_echo_answers_text() {
        let d = Dispatcher::PlainEcho;
        assert_eq!(reply(d.route(Frame::text("hello")).await), Frame::text("hello"));
        assert_eq!(reply(d.route(Frame::binary(b"raw".as_slice())).await), Frame::text("raw"));
        assert_eq!(d.route(Frame::text("close")).await, Action::Close);
        assert_eq!(d.route(Frame::text("")).await, Action::Drop);
        assert_eq!(d.route(Frame::new(Opcode::Ping, "")).await, Action::Drop);
        assert_eq!(d.route(Frame::new(Opcode::Pong, "")).await, Action::Drop);
        assert_eq!(
            reply(d.route(Frame::new(Opcode::Ping, "hey")).await),
            Frame::text("hey")
        );
        assert_eq!(
            d.route(Frame::new(Opcode::Reserved(0x8), vec![0x03u8, 0xe8])).await,
            Action::Reject(Opcode::Reserved(0x8))
        );
    }

    #[tokio::test]
    async fn typed_echo_policy() {
        let d = Dispatcher::TypedEcho;
        assert_eq!(
            reply(d.route(Frame::new(Opcode::Ping, "anything")).await),
            Frame::new(Opcode::Pong, PONG_PAYLOAD)
        );
        assert_eq!(
            reply(d.route(Frame::new(Opcode::Ping, "")).await),
            Frame::new(Opcode::Pong, PONG_PAYLOAD)
        );
        assert_eq!(
            reply(d.route(Frame::new(Opcode::Pong, "x")).await),
            Frame::new(Opcode::Ping, PING_PAYLOAD)
        );
        assert_eq!(
            reply(d.route(Frame::binary(vec![0u8, 159, 146, 150])).await),
            Frame::binary(vec![0u8, 159, 146, 150])
        );
        assert_eq!(reply(d.route(Frame::text("hi")).await), Frame::text("hi"));
        assert_eq!(d.route(Frame::text("close")).await, Action::Close);
        assert_eq!(
            d.route(Frame::new(Opcode::Cont, "more")).await,
            Action::Reject(Opcode::Cont)
        );
        assert_eq!(d.route(Frame::new(Opcode::Cont, "")).await, Action::Drop);
        assert_eq!(
            d.route(Frame::new(Opcode::Reserved(0x3), "x")).await,
            Action::Reject(Opcode::Reserved(0x3))
        );
    }

    #[tokio::test]
    async fn bridge_commands() {
        let d = bridge();
        reply(d.route(Frame::text("SET foo bar")).await);
        assert_eq!(reply(d.route(Frame::text("GET foo")).await), Frame::text("bar"));
        assert_eq!(reply(d.route(Frame::text("SET foo")).await), Frame::text(SET_USAGE));
        assert_eq!(
            reply(d.route(Frame::text("FOO bar")).await),
            Frame::text(UNKNOWN_COMMAND)
        );
        assert_eq!(d.route(Frame::text("close")).await, Action::Close);
    }

    #[tokio::test]
    async fn bridge_needs_text() {
        let d = bridge();
        for frame in [
            Frame::binary(b"GET foo".as_slice()),
            Frame::new(Opcode::Ping, ""),
            Frame::new(Opcode::Reserved(0x8), ""),
        ] {
            assert_eq!(reply(d.route(frame).await), Frame::text(TEXT_REQUIRED));
        }
    }
}
