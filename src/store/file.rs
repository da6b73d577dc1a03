//! On-disk store backends rooted in the data directory.
//!
//! Keys are absolute filesystem paths, so files are named by the SHA-256 of
//! the key to keep names flat and fixed-length:
//!
//! - `<data>/content/<hex>`: content payloads, written at commit time
//! - `<data>/meta/<hex>.json`: Node Records, written immediately

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::vfs::node::NodeRecord;

use super::{AttrStore, ContentStore};

fn key_name(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// Write `data` to a temp file next to `target`, fsync it, and return the temp path.
fn write_temp(target: &Path, data: &[u8], seq: u64) -> std::io::Result<PathBuf> {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", seq));
    let temp_path = target.with_file_name(name);

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(temp_path)
}

fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io(e)),
    }
}

fn remove_optional(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

// ── Content store ─────────────────────────────────────────────────────────────

/// Content store with staged mutations.
///
/// `add`/`update`/`delete` only touch the in-memory staging map; `commit`
/// writes every staged payload through temp-file + rename and removes staged
/// deletions. Until then the previous committed payload stays on disk.
pub struct FileContentStore {
    root: PathBuf,
    /// Staged mutations: `Some(data)` = write, `None` = delete.
    staged: Mutex<HashMap<String, Option<Vec<u8>>>>,
    temp_seq: AtomicU64,
}

impl FileContentStore {
    /// Open (creating if needed) the content directory under `data_dir`.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let root = data_dir.join("content");
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            staged: Mutex::new(HashMap::new()),
            temp_seq: AtomicU64::new(0),
        })
    }

    fn file_for(&self, path: &str) -> PathBuf {
        self.root.join(key_name(path))
    }

    /// Number of mutations waiting for `commit()`.
    #[allow(dead_code)]
    pub fn pending(&self) -> usize {
        self.staged.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl ContentStore for FileContentStore {
    fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        if let Some(entry) = self.staged.lock().map_err(poisoned)?.get(path) {
            return Ok(entry.clone());
        }
        read_optional(&self.file_for(path))
    }

    fn add(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let mut staged = self.staged.lock().map_err(poisoned)?;
        let exists = match staged.get(path) {
            Some(entry) => entry.is_some(),
            None => self.file_for(path).exists(),
        };
        if exists {
            return Err(StoreError::Conflict(path.to_string()));
        }
        staged.insert(path.to_string(), Some(data.to_vec()));
        Ok(())
    }

    fn update(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        self.staged
            .lock()
            .map_err(poisoned)?
            .insert(path.to_string(), Some(data.to_vec()));
        Ok(())
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        self.staged
            .lock()
            .map_err(poisoned)?
            .insert(path.to_string(), None);
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut staged = self.staged.lock().map_err(poisoned)?;
        if staged.is_empty() {
            return Ok(());
        }

        // Entries are dropped from the staging map only once they are on disk,
        // so a failed commit can be retried.
        let keys: Vec<String> = staged.keys().cloned().collect();
        for key in keys {
            let target = self.file_for(&key);
            match staged.get(&key) {
                Some(Some(data)) => {
                    let seq = self.temp_seq.fetch_add(1, Ordering::SeqCst);
                    let temp = write_temp(&target, data, seq)?;
                    fs::rename(&temp, &target)?;
                }
                Some(None) => remove_optional(&target)?,
                None => continue,
            }
            staged.remove(&key);
        }

        log::debug!("content store committed under {}", self.root.display());
        Ok(())
    }
}

// ── Attribute store ───────────────────────────────────────────────────────────

/// Attribute store keeping one JSON document per path.
///
/// Every mutation is durable when it returns; this store has no commit.
pub struct LocalAttrStore {
    root: PathBuf,
    temp_seq: AtomicU64,
}

impl LocalAttrStore {
    /// Open (creating if needed) the metadata directory under `data_dir`.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let root = data_dir.join("meta");
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            temp_seq: AtomicU64::new(0),
        })
    }

    fn file_for(&self, path: &str) -> PathBuf {
        self.root.join(format!("{}.json", key_name(path)))
    }

    fn encode(record: &NodeRecord) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| StoreError::Encoding(e.to_string()))
    }
}

impl AttrStore for LocalAttrStore {
    fn get(&self, path: &str) -> StoreResult<Option<NodeRecord>> {
        match read_optional(&self.file_for(path))? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Encoding(format!("{}: {}", path, e))),
            None => Ok(None),
        }
    }

    fn add(&self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        let target = self.file_for(path);
        let seq = self.temp_seq.fetch_add(1, Ordering::SeqCst);
        let temp = write_temp(&target, &Self::encode(record)?, seq)?;

        // hard_link refuses to replace an existing file, which gives insert semantics.
        let linked = fs::hard_link(&temp, &target);
        let _ = fs::remove_file(&temp);
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(path.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn update(&self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        let target = self.file_for(path);
        let seq = self.temp_seq.fetch_add(1, Ordering::SeqCst);
        let temp = write_temp(&target, &Self::encode(record)?, seq)?;
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        remove_optional(&self.file_for(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::node::NodeKind;

    #[test]
    fn test_content_staged_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContentStore::open(dir.path()).unwrap();

        store.add("/file", b"payload").unwrap();
        assert_eq!(store.get("/file").unwrap().unwrap(), b"payload");
        assert_eq!(store.pending(), 1);
        assert!(!store.file_for("/file").exists());

        store.commit().unwrap();
        assert_eq!(store.pending(), 0);
        assert_eq!(fs::read(store.file_for("/file")).unwrap(), b"payload");
    }

    #[test]
    fn test_content_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileContentStore::open(dir.path()).unwrap();
            store.update("/a", b"one").unwrap();
            store.update("/b", b"two").unwrap();
            store.commit().unwrap();
            store.update("/b", b"uncommitted").unwrap();
        }

        let store = FileContentStore::open(dir.path()).unwrap();
        assert_eq!(store.get("/a").unwrap().unwrap(), b"one");
        assert_eq!(store.get("/b").unwrap().unwrap(), b"two");
    }

    #[test]
    fn test_content_delete_and_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContentStore::open(dir.path()).unwrap();
        store.add("/x", b"1").unwrap();
        store.commit().unwrap();

        assert!(matches!(store.add("/x", b"2"), Err(StoreError::Conflict(_))));

        store.delete("/x").unwrap();
        assert!(store.get("/x").unwrap().is_none());
        // Staged delete frees the key for a new add.
        store.add("/x", b"3").unwrap();
        store.delete("/x").unwrap();
        store.commit().unwrap();

        assert!(!store.file_for("/x").exists());
        store.delete("/never").unwrap();
        store.commit().unwrap();
    }

    #[test]
    fn test_local_attr_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAttrStore::open(dir.path()).unwrap();
        let mut rec = NodeRecord::new(NodeKind::File, 0o640, 10, 20);
        rec.xattrs.insert("user.k".to_string(), b"v".to_vec());

        store.add("/f", &rec).unwrap();
        assert!(matches!(store.add("/f", &rec), Err(StoreError::Conflict(_))));
        assert_eq!(store.get("/f").unwrap().unwrap(), rec);

        rec.datalen = 42;
        store.update("/f", &rec).unwrap();
        assert_eq!(store.get("/f").unwrap().unwrap().datalen, 42);

        store.delete("/f").unwrap();
        store.delete("/f").unwrap();
        assert!(store.get("/f").unwrap().is_none());
    }

    #[test]
    fn test_local_attr_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAttrStore::open(dir.path()).unwrap();
        fs::write(store.file_for("/bad"), b"not json").unwrap();
        assert!(matches!(store.get("/bad"), Err(StoreError::Encoding(_))));
    }
}
