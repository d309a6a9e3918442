//! [`KvBackend`](crate::protocol::KvBackend) implementations.

mod memory;
mod redis;

pub use memory::MemoryBackend;
pub use redis::RedisBackend;
