//! Key-value stores: the primary store and the home of the CSV shadow backup.
//!
//! A `KvStore` is a small synchronous string-to-string map with last-write-wins semantics. All
//! writers live on the same logical thread of control, so implementations only need enough
//! interior locking to be `Send + Sync`.

mod dir;
mod memory;

use anyhow::Result;
use std::fmt::Debug;

pub use dir::DirStore;
pub use memory::MemoryStore;

/// A synchronous key-value store.
pub trait KvStore: Debug + Send + Sync {
    /// Returns the value stored under `key`, or `None` if there is none.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
