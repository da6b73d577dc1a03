//! Node Record: the metadata entry stored in the attribute store, one per path.
//!
//! Core fields are fixed. Only `xattrs` is open-ended. Serialized as camelCase
//! JSON so the same document works for the local and the HTTP attribute store.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// File type mask.
pub const S_IFMT: u32 = 0o170_000;
/// Regular file.
pub const S_IFREG: u32 = 0o100_000;
/// Directory.
pub const S_IFDIR: u32 = 0o040_000;
/// Symbolic link.
pub const S_IFLNK: u32 = 0o120_000;
/// Permission and special bits.
pub const PERM_MASK: u32 = 0o7777;

/// Entry type derived from the `mode` type bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
}

impl NodeKind {
    /// Type bits for this kind.
    pub fn type_bits(self) -> u32 {
        match self {
            NodeKind::File => S_IFREG,
            NodeKind::Directory => S_IFDIR,
            NodeKind::Symlink => S_IFLNK,
        }
    }
}

/// Metadata for one filesystem path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Type and permission bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Device number recorded by mknod.
    #[serde(default)]
    pub dev: u64,
    /// Access time (Unix ms).
    pub atime: u64,
    /// Modification time (Unix ms).
    pub mtime: u64,
    /// Status change time (Unix ms).
    pub ctime: u64,
    /// Logical content length, excluding page headers and padding.
    pub datalen: u64,
    /// Extended attributes. Values are base64 in the JSON form.
    #[serde(default, rename = "extendedAttributes", with = "xattr_values")]
    pub xattrs: BTreeMap<String, Vec<u8>>,
}

impl NodeRecord {
    /// Fresh record with all timestamps set to now.
    pub fn new(kind: NodeKind, perm: u32, uid: u32, gid: u32) -> Self {
        let now = now_millis();
        Self {
            mode: kind.type_bits() | (perm & PERM_MASK),
            uid,
            gid,
            dev: 0,
            atime: now,
            mtime: now,
            ctime: now,
            datalen: 0,
            xattrs: BTreeMap::new(),
        }
    }

    /// Entry kind, or `None` for type bits this filesystem never creates.
    pub fn kind(&self) -> Option<NodeKind> {
        match self.mode & S_IFMT {
            S_IFREG => Some(NodeKind::File),
            S_IFDIR => Some(NodeKind::Directory),
            S_IFLNK => Some(NodeKind::Symlink),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Some(NodeKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        self.kind() == Some(NodeKind::File)
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == Some(NodeKind::Symlink)
    }

    pub fn permissions(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// Replace permission bits, keeping the type bits.
    pub fn set_permissions(&mut self, mode: u32) {
        self.mode = (self.mode & S_IFMT) | (mode & PERM_MASK);
    }

    /// Content changed: bump mtime and ctime.
    pub fn touch_modified(&mut self) {
        let now = now_millis();
        self.mtime = now;
        self.ctime = now;
    }

    /// Metadata changed: bump ctime.
    pub fn touch_changed(&mut self) {
        self.ctime = now_millis();
    }
}

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

mod xattr_values {
    use std::collections::BTreeMap;

    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = map
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str(),
                    base64::engine::general_purpose::STANDARD.encode(v),
                )
            })
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                base64::engine::general_purpose::STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_kinds() {
        let file = NodeRecord::new(NodeKind::File, 0o644, 1000, 1000);
        assert_eq!(file.mode, 0o100644);
        assert!(file.is_file());
        assert_eq!(file.datalen, 0);

        let dir = NodeRecord::new(NodeKind::Directory, 0o755, 0, 0);
        assert!(dir.is_dir());
        assert_eq!(dir.permissions(), 0o755);

        let link = NodeRecord::new(NodeKind::Symlink, 0o777, 0, 0);
        assert!(link.is_symlink());
    }

    #[test]
    fn test_perm_bits_are_masked() {
        let rec = NodeRecord::new(NodeKind::File, 0o170644, 0, 0);
        assert_eq!(rec.kind(), Some(NodeKind::File));
        assert_eq!(rec.permissions(), 0o644);
    }

    #[test]
    fn test_set_permissions_keeps_type() {
        let mut rec = NodeRecord::new(NodeKind::Directory, 0o755, 0, 0);
        rec.set_permissions(0o100700);
        assert!(rec.is_dir());
        assert_eq!(rec.permissions(), 0o700);
    }

    #[test]
    fn test_json_shape_and_xattr_base64() {
        let mut rec = NodeRecord::new(NodeKind::File, 0o600, 1, 2);
        rec.xattrs.insert("user.tag".to_string(), vec![0, 159, 255]);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["extendedAttributes"]["user.tag"], "AJ//");
        assert!(json.get("datalen").is_some());

        let back: NodeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_missing_xattrs_default_to_empty() {
        let json = serde_json::json!({
            "mode": 0o100644, "uid": 0, "gid": 0,
            "atime": 1, "mtime": 2, "ctime": 3, "datalen": 0
        });
        let rec: NodeRecord = serde_json::from_value(json).unwrap();
        assert!(rec.xattrs.is_empty());
        assert_eq!(rec.dev, 0);
    }
}
