//! The text command protocol spoken in command-bridge mode.

mod command;
mod kv;

pub use command::{Command, Verb};
pub use kv::{DEFAULT_TTL, GET_USAGE, KvBackend, KvBridge, SET_USAGE, UNKNOWN_COMMAND};
