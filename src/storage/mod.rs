//! Durable key-value storage for session bookkeeping.
//!
//! The hosted dashboard keeps this state in browser local storage; here the
//! same flat string map is persisted as a JSON file under the platform cache
//! directory. `MemoryStore` backs tests and embedders that want nothing on
//! disk.
//!
//! Only single-key operations are atomic; callers that need a
//! read-modify-write sequence must not suspend between the read and the
//! write.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use anyhow::Result;

/// Flat string-to-string store with single-key atomicity.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
