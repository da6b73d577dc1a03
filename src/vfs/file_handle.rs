//! Open file handles.
//!
//! Each handle owns its own [`WriteBuffer`], so concurrent writers on
//! different handles never share buffered bytes. Handles are keyed by the
//! `fh` number returned from `open`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::path;
use super::write_buffer::WriteBuffer;

/// State for one open file.
#[derive(Debug)]
pub struct OpenFileHandle {
    /// Path the handle currently refers to. Follows renames.
    pub path: String,
    /// Open flags (O_RDONLY, O_WRONLY, O_RDWR, ...).
    pub flags: i32,
    pub buffer: WriteBuffer,
    /// Set once the file behind `path` was removed or replaced. The path may
    /// name a different file by now, so the handle must not write through it.
    pub unlinked: bool,
}

impl OpenFileHandle {
    pub fn new(path: String, flags: i32, page_payload: usize) -> Self {
        Self {
            path,
            flags,
            buffer: WriteBuffer::new(page_payload),
            unlinked: false,
        }
    }
}

pub type SharedHandle = Arc<Mutex<OpenFileHandle>>;

/// Registry of open handles.
pub struct HandleTable {
    next_fh: AtomicU64,
    handles: Mutex<HashMap<u64, SharedHandle>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next_fh: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<u64, SharedHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a handle and return its `fh`.
    pub fn insert(&self, handle: OpenFileHandle) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::SeqCst);
        self.table().insert(fh, Arc::new(Mutex::new(handle)));
        fh
    }

    pub fn get(&self, fh: u64) -> Option<SharedHandle> {
        self.table().get(&fh).cloned()
    }

    pub fn remove(&self, fh: u64) -> Option<SharedHandle> {
        self.table().remove(&fh)
    }

    /// Point every handle under `from` at the matching path under `to`.
    pub fn rename_paths(&self, from: &str, to: &str) {
        for handle in self.table().values() {
            let mut h = handle.lock().unwrap_or_else(|e| e.into_inner());
            if !h.unlinked && path::is_within(&h.path, from) {
                h.path = path::rebase(&h.path, from, to);
            }
        }
    }

    /// Mark every live handle on exactly `target` as unlinked.
    pub fn detach(&self, target: &str) {
        for handle in self.table().values() {
            let mut h = handle.lock().unwrap_or_else(|e| e.into_inner());
            if h.path == target {
                h.unlinked = true;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fh_numbers_are_unique() {
        let table = HandleTable::new();
        let a = table.insert(OpenFileHandle::new("/a".into(), 0, 16));
        let b = table.insert(OpenFileHandle::new("/a".into(), 0, 16));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let table = HandleTable::new();
        assert!(table.remove(99).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_rename_follows_subtree() {
        let table = HandleTable::new();
        let inside = table.insert(OpenFileHandle::new("/d/f".into(), 0, 16));
        let outside = table.insert(OpenFileHandle::new("/dx".into(), 0, 16));

        table.rename_paths("/d", "/e");

        let path_of = |fh| table.get(fh).unwrap().lock().unwrap().path.clone();
        assert_eq!(path_of(inside), "/e/f");
        assert_eq!(path_of(outside), "/dx");
    }

    #[test]
    fn test_detached_handle_ignores_later_renames() {
        let table = HandleTable::new();
        let old = table.insert(OpenFileHandle::new("/b".into(), 0, 16));
        let other = table.insert(OpenFileHandle::new("/b/c".into(), 0, 16));

        table.detach("/b");
        table.rename_paths("/b", "/z");

        let h = table.get(old).unwrap();
        let h = h.lock().unwrap();
        assert!(h.unlinked);
        assert_eq!(h.path, "/b");
        assert_eq!(table.get(other).unwrap().lock().unwrap().path, "/z/c");
    }
}
