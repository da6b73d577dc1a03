//! Backing store adapters.
//!
//! The dispatcher talks to two independent stores. The attribute store holds
//! one [`NodeRecord`] per path. The content store holds one opaque payload per
//! path and exposes an explicit `commit()` durability barrier. The two are not
//! transactional with respect to each other.

pub mod file;
pub mod http;
pub mod memory;

use crate::error::StoreResult;
use crate::vfs::node::NodeRecord;

pub use file::{FileContentStore, LocalAttrStore};
pub use http::HttpAttrStore;
pub use memory::{InMemoryAttrStore, InMemoryContentStore};

/// Path-keyed metadata store.
pub trait AttrStore: Send + Sync {
    /// Fetch the record at `path`, `None` if absent.
    fn get(&self, path: &str) -> StoreResult<Option<NodeRecord>>;
    /// Insert a new record. Fails with `StoreError::Conflict` if one exists.
    fn add(&self, path: &str, record: &NodeRecord) -> StoreResult<()>;
    /// Insert or replace the record at `path`.
    fn update(&self, path: &str, record: &NodeRecord) -> StoreResult<()>;
    /// Remove the record at `path`. Absent keys are not an error.
    fn delete(&self, path: &str) -> StoreResult<()>;
}

/// Path-keyed payload store with an explicit commit boundary.
///
/// Mutations are visible to `get` immediately but only durable after
/// `commit()`.
pub trait ContentStore: Send + Sync {
    fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;
    /// Insert a new payload. Fails with `StoreError::Conflict` if one exists.
    fn add(&self, path: &str, data: &[u8]) -> StoreResult<()>;
    /// Insert or replace the payload at `path`.
    fn update(&self, path: &str, data: &[u8]) -> StoreResult<()>;
    /// Remove the payload at `path`. Absent keys are not an error.
    fn delete(&self, path: &str) -> StoreResult<()>;
    /// Durability barrier for every mutation since the previous commit.
    fn commit(&self) -> StoreResult<()>;
}
