pub mod backend;
pub mod client;
pub mod keys;

pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use client::CacheClient;
