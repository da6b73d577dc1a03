//! In-memory store backends for tests and ephemeral mounts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::vfs::node::NodeRecord;

use super::{AttrStore, ContentStore};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

/// Attribute store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryAttrStore {
    records: RwLock<HashMap<String, NodeRecord>>,
}

impl InMemoryAttrStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

impl AttrStore for InMemoryAttrStore {
    fn get(&self, path: &str) -> StoreResult<Option<NodeRecord>> {
        Ok(self.records.read().map_err(poisoned)?.get(path).cloned())
    }

    fn add(&self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        if records.contains_key(path) {
            return Err(StoreError::Conflict(path.to_string()));
        }
        records.insert(path.to_string(), record.clone());
        Ok(())
    }

    fn update(&self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        self.records
            .write()
            .map_err(poisoned)?
            .insert(path.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        self.records.write().map_err(poisoned)?.remove(path);
        Ok(())
    }
}

/// Content store backed by a `HashMap`.
///
/// Commit is a no-op apart from bumping a counter that tests use to observe
/// flush behavior.
#[derive(Default)]
pub struct InMemoryContentStore {
    payloads: RwLock<HashMap<String, Vec<u8>>>,
    commits: AtomicU64,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `commit()` has been called.
    #[allow(dead_code)]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

impl ContentStore for InMemoryContentStore {
    fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.payloads.read().map_err(poisoned)?.get(path).cloned())
    }

    fn add(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let mut payloads = self.payloads.write().map_err(poisoned)?;
        if payloads.contains_key(path) {
            return Err(StoreError::Conflict(path.to_string()));
        }
        payloads.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn update(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        self.payloads
            .write()
            .map_err(poisoned)?
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        self.payloads.write().map_err(poisoned)?.remove(path);
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
