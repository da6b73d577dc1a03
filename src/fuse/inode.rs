//! Inode table mapping kernel inode numbers to dispatcher paths.
//!
//! The core is keyed by path; the kernel speaks inode numbers. Numbers are
//! handed out on first lookup and stay stable for a path until it is removed
//! or renamed away. Renames remap the whole subtree so open inodes keep
//! resolving.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::vfs::path;

/// Normalize a filename to NFC so composed and decomposed spellings of the
/// same name land on the same path.
#[cfg(feature = "fuse")]
fn normalize_name(name: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    name.nfc().collect()
}

#[cfg(not(feature = "fuse"))]
fn normalize_name(name: &str) -> String {
    name.to_string()
}

/// Root inode number (standard FUSE convention).
pub const ROOT_INO: u64 = 1;

/// Block size reported in attributes and statfs.
pub const BLOCK_SIZE: u32 = 4096;

pub struct InodeTable {
    paths: HashMap<u64, String>,
    inos: HashMap<String, u64>,
    next_ino: AtomicU64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Table holding only the root (ino=1 ↔ "/").
    pub fn new() -> Self {
        let mut table = Self {
            paths: HashMap::new(),
            inos: HashMap::new(),
            next_ino: AtomicU64::new(ROOT_INO + 1),
        };
        table.bind(ROOT_INO, path::ROOT.to_string());
        table
    }

    fn bind(&mut self, ino: u64, path: String) {
        self.inos.insert(path.clone(), ino);
        self.paths.insert(ino, path);
    }

    /// Allocate a new unique inode number.
    pub fn allocate_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::SeqCst)
    }

    /// Path currently bound to `ino`.
    pub fn path_of(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// Inode for `path`, allocating one on first sight.
    pub fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inos.get(path) {
            return ino;
        }
        let ino = self.allocate_ino();
        self.bind(ino, path.to_string());
        ino
    }

    /// Full path of `name` inside directory `parent_ino`.
    pub fn child_path(&self, parent_ino: u64, name: &str) -> Option<String> {
        let parent = self.path_of(parent_ino)?;
        Some(path::join(parent, &normalize_name(name)))
    }

    /// Drop the binding for `path` and everything below it.
    pub fn forget(&mut self, target: &str) {
        let doomed: Vec<String> = self
            .inos
            .keys()
            .filter(|p| path::is_within(p, target))
            .cloned()
            .collect();
        for p in doomed {
            if let Some(ino) = self.inos.remove(&p) {
                self.paths.remove(&ino);
            }
        }
    }

    /// Rebind every path under `from` to the matching path under `to`.
    /// Whatever was bound under `to` before is dropped.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.forget(to);

        let moved: Vec<(String, u64)> = self
            .inos
            .iter()
            .filter(|(p, _)| path::is_within(p, from))
            .map(|(p, &ino)| (p.clone(), ino))
            .collect();
        for (old_path, ino) in moved {
            self.inos.remove(&old_path);
            self.bind(ino, path::rebase(&old_path, from, to));
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
