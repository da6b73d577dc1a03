//! Directory Index: the set of child basenames stored as a directory's content.
//!
//! Encoded as a CBOR array of text strings.

use std::collections::BTreeSet;

use crate::error::{FsResult, StoreError};
use crate::store::{AttrStore, ContentStore};

use super::path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    entries: BTreeSet<String>,
}

impl DirListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored listing. An empty payload is an empty listing.
    pub fn decode(bytes: &[u8]) -> FsResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let names: Vec<String> = ciborium::de::from_reader(bytes)
            .map_err(|e| StoreError::Encoding(format!("directory listing: {}", e)))?;
        Ok(Self {
            entries: names.into_iter().collect(),
        })
    }

    pub fn encode(&self) -> FsResult<Vec<u8>> {
        let names: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        let mut out = Vec::new();
        ciborium::ser::into_writer(&names, &mut out)
            .map_err(|e| StoreError::Encoding(format!("directory listing: {}", e)))?;
        Ok(out)
    }

    /// Returns false if `name` was already listed.
    pub fn insert(&mut self, name: &str) -> bool {
        self.entries.insert(name.to_string())
    }

    /// Returns false if `name` was not listed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn into_names(self) -> Vec<String> {
        self.entries.into_iter().collect()
    }
}

/// Load the listing stored at `dir`. A missing payload reads as empty.
pub(crate) fn load(content: &dyn ContentStore, dir: &str) -> FsResult<DirListing> {
    match content.get(dir)? {
        Some(bytes) => DirListing::decode(&bytes),
        None => {
            log::warn!("directory {} has no listing payload", dir);
            Ok(DirListing::new())
        }
    }
}

/// Write `listing` back to `dir`, set the directory's datalen, and commit.
pub(crate) fn store(
    attrs: &dyn AttrStore,
    content: &dyn ContentStore,
    dir: &str,
    listing: &DirListing,
) -> FsResult<()> {
    let encoded = listing.encode()?;
    content.update(dir, &encoded)?;

    if let Some(mut record) = attrs.get(dir)? {
        record.datalen = encoded.len() as u64;
        record.touch_modified();
        attrs.update(dir, &record)?;
    } else {
        log::warn!("listing written for {} which has no record", dir);
    }

    content.commit()?;
    Ok(())
}

/// Add the basename of `child_path` to its parent's listing.
pub fn add_child_to_parent(
    attrs: &dyn AttrStore,
    content: &dyn ContentStore,
    child_path: &str,
) -> FsResult<()> {
    let dir = path::parent(child_path);
    let mut listing = load(content, dir)?;
    if !listing.insert(path::basename(child_path)) {
        return Ok(());
    }
    store(attrs, content, dir, &listing)
}

/// Remove the basename of `child_path` from its parent's listing.
/// An absent entry is not an error.
pub fn remove_child_from_parent(
    attrs: &dyn AttrStore,
    content: &dyn ContentStore,
    child_path: &str,
) -> FsResult<()> {
    let dir = path::parent(child_path);
    let mut listing = load(content, dir)?;
    if !listing.remove(path::basename(child_path)) {
        log::debug!("{} not listed in {}", child_path, dir);
        return Ok(());
    }
    store(attrs, content, dir, &listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryAttrStore, InMemoryContentStore};
    use crate::vfs::node::{NodeKind, NodeRecord};

    fn stores_with_dir(dir: &str) -> (InMemoryAttrStore, InMemoryContentStore) {
        let attrs = InMemoryAttrStore::new();
        let content = InMemoryContentStore::new();
        attrs
            .add(dir, &NodeRecord::new(NodeKind::Directory, 0o755, 0, 0))
            .unwrap();
        content
            .add(dir, &DirListing::new().encode().unwrap())
            .unwrap();
        (attrs, content)
    }

    #[test]
    fn test_empty_listing_encoding() {
        let encoded = DirListing::new().encode().unwrap();
        assert_eq!(encoded, vec![0x80]);
        assert!(DirListing::decode(&encoded).unwrap().is_empty());
        assert!(DirListing::decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_listing_roundtrip() {
        let mut listing = DirListing::new();
        listing.insert("b");
        listing.insert("a");
        let decoded = DirListing::decode(&listing.encode().unwrap()).unwrap();
        assert_eq!(decoded.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_garbage_listing_is_store_failure() {
        assert!(DirListing::decode(&[0xff, 0x00]).is_err());
    }

    #[test]
    fn test_add_twice_leaves_one_entry() {
        let (attrs, content) = stores_with_dir("/d");

        add_child_to_parent(&attrs, &content, "/d/x").unwrap();
        let commits = content.commit_count();
        add_child_to_parent(&attrs, &content, "/d/x").unwrap();

        // The second add changes nothing and writes nothing.
        assert_eq!(content.commit_count(), commits);
        let listing = load(&content, "/d").unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing.contains("x"));

        let encoded_len = listing.encode().unwrap().len() as u64;
        assert_eq!(attrs.get("/d").unwrap().unwrap().datalen, encoded_len);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let (attrs, content) = stores_with_dir("/");
        remove_child_from_parent(&attrs, &content, "/ghost").unwrap();
        assert_eq!(content.commit_count(), 0);

        add_child_to_parent(&attrs, &content, "/real").unwrap();
        remove_child_from_parent(&attrs, &content, "/real").unwrap();
        assert!(load(&content, "/").unwrap().is_empty());
        assert_eq!(attrs.get("/").unwrap().unwrap().datalen, 1);
    }
}
