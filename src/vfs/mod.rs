//! Operation dispatcher.
//!
//! `MetaFs` turns path-keyed filesystem operations into reads and writes on
//! the attribute store (one [`NodeRecord`] per path) and the content store
//! (one payload per path). File payloads are encrypted pages produced by the
//! [`PageCodec`]; directory payloads are [`DirListing`]s.
//!
//! Cross-store ordering keeps crash leftovers repairable:
//! - create: content, commit, record, parent listing
//! - remove: record, content, commit, parent listing
//!
//! so an interrupted operation leaves at most an orphan payload or a stale
//! listing entry, which [`MetaFs::check_tree`] cleans up.

pub mod dir_index;
pub mod file_handle;
pub mod locks;
pub mod node;
pub mod page;
pub mod path;
pub mod write_buffer;


use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{FsError, FsResult, StoreError};
use crate::store::{AttrStore, ContentStore};

use self::dir_index::DirListing;
use self::file_handle::{HandleTable, OpenFileHandle};
use self::locks::PathLocks;
use self::node::{NodeKind, NodeRecord};
use self::page::{PageCodec, MAX_FILE_SIZE};
use self::path::ROOT;
use self::write_buffer::{FlushOutcome, FlushTarget, WriteBuffer};

/// Reply to an xattr query made in size-query or data mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XattrReply {
    /// Requested size was zero: bytes needed for the value.
    Size(u32),
    Data(Vec<u8>),
}

/// Snapshot of a directory's child names.
///
/// Finite and restartable: [`DirEntries::rewind`] starts over from the first
/// name without touching the stores again.
#[derive(Debug, Clone)]
pub struct DirEntries {
    names: Vec<String>,
    pos: usize,
}

impl DirEntries {
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Iterator for DirEntries {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let name = self.names.get(self.pos)?.clone();
        self.pos += 1;
        Some(name)
    }
}

/// What `check_tree` found and fixed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Directories whose listing was examined.
    pub directories: usize,
    /// Entries seen across all listings.
    pub entries: usize,
    /// Listing entries dropped because their record was gone.
    pub dropped: Vec<String>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

pub struct MetaFs {
    attrs: Arc<dyn AttrStore>,
    content: Arc<dyn ContentStore>,
    codec: PageCodec,
    locks: PathLocks,
    handles: HandleTable,
    default_mode: u32,
    uid: u32,
    gid: u32,
}

/// Flush target writing one buffered chunk of a file through the codec.
struct ContentSink<'a> {
    fs: &'a MetaFs,
    path: &'a str,
}

impl FlushTarget for ContentSink<'_> {
    fn flush(&mut self, offset: u64, data: &[u8]) -> FsResult<FlushOutcome> {
        let fs = self.fs;
        let mut record = fs.record(self.path)?;
        if data.is_empty() {
            return Ok(FlushOutcome {
                written: 0,
                total_len: record.datalen,
            });
        }

        let stored = fs.payload(self.path)?;
        let spliced = fs.codec.splice(&stored, offset, data)?;
        fs.content.update(self.path, &spliced.content)?;
        fs.content.commit()?;

        record.datalen = spliced.total_len;
        record.touch_modified();
        fs.attrs.update(self.path, &record)?;

        Ok(FlushOutcome {
            written: spliced.written,
            total_len: spliced.total_len,
        })
    }
}

impl MetaFs {
    /// Build a dispatcher over the two stores, creating `/` if it is missing.
    ///
    /// `default_mode` supplies the permission bits for `/` and for symlinks.
    pub fn new(
        attrs: Arc<dyn AttrStore>,
        content: Arc<dyn ContentStore>,
        codec: PageCodec,
        default_mode: u32,
    ) -> FsResult<Self> {
        let fs = Self {
            attrs,
            content,
            codec,
            locks: PathLocks::new(),
            handles: HandleTable::new(),
            default_mode: default_mode & node::PERM_MASK,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        };
        fs.ensure_root()?;
        Ok(fs)
    }

    fn ensure_root(&self) -> FsResult<()> {
        if self.attrs.get(ROOT)?.is_some() {
            return Ok(());
        }

        log::info!("initializing root directory");
        let listing = match self.content.get(ROOT)? {
            Some(bytes) => bytes,
            None => {
                let empty = DirListing::new().encode()?;
                self.content.update(ROOT, &empty)?;
                self.content.commit()?;
                empty
            }
        };

        let mut record =
            NodeRecord::new(NodeKind::Directory, self.default_mode, self.uid, self.gid);
        record.datalen = listing.len() as u64;
        self.add_record(ROOT, &record)
    }

    pub fn codec(&self) -> &PageCodec {
        &self.codec
    }

    // ── helpers (callers hold the relevant path locks) ───────────────────────

    fn record(&self, path: &str) -> FsResult<NodeRecord> {
        self.attrs.get(path)?.ok_or(FsError::NotFound)
    }

    /// Content payload for a live record. A missing payload is an
    /// inconsistency and reads as `NotFound`.
    fn payload(&self, path: &str) -> FsResult<Vec<u8>> {
        match self.content.get(path)? {
            Some(bytes) => Ok(bytes),
            None => {
                log::warn!("inconsistent entry {}: record without content", path);
                Err(FsError::NotFound)
            }
        }
    }

    fn add_record(&self, path: &str, record: &NodeRecord) -> FsResult<()> {
        match self.attrs.add(path, record) {
            Err(StoreError::Conflict(_)) => Err(FsError::AlreadyExists),
            other => Ok(other?),
        }
    }

    /// The parent of `path` must exist and be a directory.
    fn check_parent(&self, path: &str) -> FsResult<()> {
        let parent = self.record(path::parent(path))?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(())
    }

    /// Read-modify-write of a record. Missing paths are a silent no-op.
    fn modify_record<F>(&self, path: &str, op: &str, f: F) -> FsResult<()>
    where
        F: FnOnce(&mut NodeRecord) -> FsResult<()>,
    {
        let path = path::normalize(path)?;
        let _guard = self.locks.acquire(&[path.as_str()]);
        let Some(mut record) = self.attrs.get(&path)? else {
            log::debug!("{} on missing {} ignored", op, path);
            return Ok(());
        };
        f(&mut record)?;
        self.attrs.update(&path, &record)?;
        Ok(())
    }

    /// Shared create path: content, commit, record, parent listing.
    fn create_entry(&self, path: &str, record: NodeRecord, payload: &[u8]) -> FsResult<()> {
        let path = path::normalize(path)?;
        if path == ROOT {
            return Err(FsError::AlreadyExists);
        }
        let parent = path::parent(&path);
        let _guard = self.locks.acquire(&[path.as_str(), parent]);

        self.check_parent(&path)?;
        if self.attrs.get(&path)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        self.content.update(&path, payload)?;
        self.content.commit()?;
        self.add_record(&path, &record)?;
        if let Err(e) =
            dir_index::add_child_to_parent(self.attrs.as_ref(), self.content.as_ref(), &path)
        {
            self.undo_create(&path);
            return Err(e);
        }
        Ok(())
    }

    /// Drop the record and payload of a create whose listing update failed.
    /// A failure here leaves an orphan payload or a dangling listing entry,
    /// both of which `check_tree` tolerates.
    fn undo_create(&self, path: &str) {
        log::warn!("listing update failed for {}, rolling back create", path);
        if let Err(e) = self.delete_entry(path) {
            log::error!("rollback of {} incomplete: {}", path, e);
        }
    }

    /// Delete record and content: record, content, commit.
    fn delete_entry(&self, path: &str) -> FsResult<()> {
        self.attrs.delete(path)?;
        self.content.delete(path)?;
        self.content.commit()?;
        Ok(())
    }

    fn file_record(&self, path: &str) -> FsResult<NodeRecord> {
        let record = self.record(path)?;
        match record.kind() {
            Some(NodeKind::File) => Ok(record),
            Some(NodeKind::Directory) => Err(FsError::IsADirectory),
            _ => Err(FsError::InvalidArgument),
        }
    }

    /// A write of `len` bytes at `offset` must end within the size limit.
    fn check_extent(offset: u64, len: usize) -> FsResult<()> {
        match offset.checked_add(len as u64) {
            Some(end) if len == 0 || end <= MAX_FILE_SIZE => Ok(()),
            _ => Err(FsError::FileTooLarge),
        }
    }

    // ── attributes ───────────────────────────────────────────────────────────

    pub fn get_attributes(&self, path: &str) -> FsResult<NodeRecord> {
        let path = path::normalize(path)?;
        log::debug!("getattr {}", path);
        self.record(&path)
    }

    pub fn set_mode(&self, path: &str, mode: u32) -> FsResult<()> {
        log::debug!("chmod {} {:o}", path, mode);
        self.modify_record(path, "chmod", |record| {
            record.set_permissions(mode);
            record.touch_changed();
            Ok(())
        })
    }

    /// `None` leaves that id unchanged.
    pub fn set_owner(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> FsResult<()> {
        log::debug!("chown {} {:?}:{:?}", path, uid, gid);
        self.modify_record(path, "chown", |record| {
            if let Some(uid) = uid {
                record.uid = uid;
            }
            if let Some(gid) = gid {
                record.gid = gid;
            }
            record.touch_changed();
            Ok(())
        })
    }

    /// Times are Unix milliseconds. `None` leaves that time unchanged.
    pub fn set_times(&self, path: &str, atime: Option<u64>, mtime: Option<u64>) -> FsResult<()> {
        log::debug!("utime {}", path);
        self.modify_record(path, "utime", |record| {
            if let Some(atime) = atime {
                record.atime = atime;
            }
            if let Some(mtime) = mtime {
                record.mtime = mtime;
            }
            record.touch_changed();
            Ok(())
        })
    }

    // ── extended attributes ─────────────────────────────────────────────────

    /// Set an xattr. `flags` takes `XATTR_CREATE` / `XATTR_REPLACE`.
    pub fn set_xattr(&self, path: &str, name: &str, value: &[u8], flags: i32) -> FsResult<()> {
        log::debug!("setxattr {} {}", path, name);
        self.modify_record(path, "setxattr", |record| {
            let exists = record.xattrs.contains_key(name);
            if flags & libc::XATTR_CREATE != 0 && exists {
                return Err(FsError::AlreadyExists);
            }
            if flags & libc::XATTR_REPLACE != 0 && !exists {
                return Err(FsError::NoAttribute);
            }
            record.xattrs.insert(name.to_string(), value.to_vec());
            record.touch_changed();
            Ok(())
        })
    }

    pub fn get_xattr(&self, path: &str, name: &str, size: u32) -> FsResult<XattrReply> {
        let record = self.get_attributes(path)?;
        let value = record.xattrs.get(name).ok_or(FsError::NoAttribute)?;
        size_or_data(value.clone(), size)
    }

    /// Names as NUL-terminated strings, concatenated.
    pub fn list_xattr_names(&self, path: &str, size: u32) -> FsResult<XattrReply> {
        let record = self.get_attributes(path)?;
        let mut names = Vec::new();
        for name in record.xattrs.keys() {
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        size_or_data(names, size)
    }

    /// Removing an absent name is a no-op.
    pub fn remove_xattr(&self, path: &str, name: &str) -> FsResult<()> {
        log::debug!("removexattr {} {}", path, name);
        self.modify_record(path, "removexattr", |record| {
            if record.xattrs.remove(name).is_some() {
                record.touch_changed();
            }
            Ok(())
        })
    }

    // ── namespace ───────────────────────────────────────────────────────────

    /// Create a regular file with an empty payload.
    pub fn create_file(&self, path: &str, mode: u32) -> FsResult<()> {
        log::debug!("create {} {:o}", path, mode);
        let record = NodeRecord::new(NodeKind::File, mode, self.uid, self.gid);
        self.create_entry(path, record, &[])
    }

    /// Like `create_file`, also recording a device number.
    pub fn create_node(&self, path: &str, mode: u32, dev: u64) -> FsResult<()> {
        log::debug!("mknod {} {:o} dev={}", path, mode, dev);
        let mut record = NodeRecord::new(NodeKind::File, mode, self.uid, self.gid);
        record.dev = dev;
        self.create_entry(path, record, &[])
    }

    pub fn make_directory(&self, path: &str, mode: u32) -> FsResult<()> {
        log::debug!("mkdir {} {:o}", path, mode);
        let listing = DirListing::new().encode()?;
        let mut record = NodeRecord::new(NodeKind::Directory, mode, self.uid, self.gid);
        record.datalen = listing.len() as u64;
        self.create_entry(path, record, &listing)
    }

    pub fn create_symlink(&self, path: &str, target: &str) -> FsResult<()> {
        log::debug!("symlink {} -> {}", path, target);
        let mut record =
            NodeRecord::new(NodeKind::Symlink, self.default_mode, self.uid, self.gid);
        record.datalen = target.len() as u64;
        self.create_entry(path, record, target.as_bytes())
    }

    pub fn read_symlink_target(&self, path: &str) -> FsResult<String> {
        let path = path::normalize(path)?;
        log::debug!("readlink {}", path);
        let _guard = self.locks.acquire(&[path.as_str()]);
        if !self.record(&path)?.is_symlink() {
            return Err(FsError::InvalidArgument);
        }
        let target = self.payload(&path)?;
        String::from_utf8(target).map_err(|_| FsError::InvalidArgument)
    }

    /// Remove a non-directory entry.
    pub fn remove(&self, path: &str) -> FsResult<()> {
        let path = path::normalize(path)?;
        log::debug!("unlink {}", path);
        if path == ROOT {
            return Err(FsError::InvalidArgument);
        }
        let _guard = self.locks.acquire(&[path.as_str(), path::parent(&path)]);

        if self.record(&path)?.is_dir() {
            return Err(FsError::IsADirectory);
        }
        self.handles.detach(&path);
        self.delete_entry(&path)?;
        dir_index::remove_child_from_parent(self.attrs.as_ref(), self.content.as_ref(), &path)
    }

    /// Remove an empty directory.
    pub fn remove_directory(&self, path: &str) -> FsResult<()> {
        let path = path::normalize(path)?;
        log::debug!("rmdir {}", path);
        if path == ROOT {
            return Err(FsError::InvalidArgument);
        }
        let _guard = self.locks.acquire(&[path.as_str(), path::parent(&path)]);

        if !self.record(&path)?.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if !dir_index::load(self.content.as_ref(), &path)?.is_empty() {
            return Err(FsError::NotEmpty);
        }
        self.delete_entry(&path)?;
        dir_index::remove_child_from_parent(self.attrs.as_ref(), self.content.as_ref(), &path)
    }

    pub fn list_directory(&self, path: &str) -> FsResult<DirEntries> {
        let path = path::normalize(path)?;
        log::debug!("readdir {}", path);
        let _guard = self.locks.acquire(&[path.as_str()]);
        if !self.record(&path)?.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let listing = dir_index::load(self.content.as_ref(), &path)?;
        Ok(DirEntries {
            names: listing.into_names(),
            pos: 0,
        })
    }

    /// All paths strictly below directory `dir`, parents before children.
    /// Read without locks; used only to size a lock set.
    fn subtree(&self, dir: &str) -> FsResult<Vec<String>> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([dir.to_string()]);
        while let Some(current) = queue.pop_front() {
            for name in dir_index::load(self.content.as_ref(), &current)?.into_names() {
                let child = path::join(&current, &name);
                if self.attrs.get(&child)?.is_some_and(|r| r.is_dir()) {
                    queue.push_back(child.clone());
                }
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Move a record and its payload (recursively for directories) from
    /// `from` to `to`. Parent listings are the caller's job.
    fn move_entry(&self, from: &str, to: &str, mut record: NodeRecord) -> FsResult<()> {
        let payload = match self.content.get(from)? {
            Some(bytes) => bytes,
            None => {
                log::warn!("inconsistent entry {}: moving record without content", from);
                Vec::new()
            }
        };

        self.content.update(to, &payload)?;
        self.content.commit()?;
        record.touch_changed();
        self.attrs.update(to, &record)?;

        if record.is_dir() {
            for name in DirListing::decode(&payload)?.into_names() {
                let child_from = path::join(from, &name);
                match self.attrs.get(&child_from)? {
                    Some(child) => self.move_entry(&child_from, &path::join(to, &name), child)?,
                    None => log::warn!("dangling entry {} skipped during rename", child_from),
                }
            }
        }

        self.delete_entry(from)
    }

    /// Rename `old` to `new`, replacing a compatible existing destination.
    pub fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        let old = path::normalize(old)?;
        let new = path::normalize(new)?;
        log::debug!("rename {} -> {}", old, new);
        if old == ROOT || new == ROOT {
            return Err(FsError::InvalidArgument);
        }

        let subtree = match self.attrs.get(&old)? {
            Some(r) if r.is_dir() => self.subtree(&old)?,
            _ => Vec::new(),
        };
        let moved: Vec<String> = subtree
            .iter()
            .map(|p| path::rebase(p, &old, &new))
            .collect();
        let mut lock_set = vec![
            old.as_str(),
            new.as_str(),
            path::parent(&old),
            path::parent(&new),
        ];
        lock_set.extend(subtree.iter().map(String::as_str));
        lock_set.extend(moved.iter().map(String::as_str));
        let _guard = self.locks.acquire(&lock_set);

        let record = self.record(&old)?;
        if old == new {
            return Ok(());
        }
        self.check_parent(&new)?;
        if record.is_dir() && path::is_within(&new, &old) {
            return Err(FsError::InvalidArgument);
        }

        if let Some(existing) = self.attrs.get(&new)? {
            match (record.is_dir(), existing.is_dir()) {
                (true, false) => return Err(FsError::NotADirectory),
                (false, true) => return Err(FsError::IsADirectory),
                (true, true) => {
                    if !dir_index::load(self.content.as_ref(), &new)?.is_empty() {
                        return Err(FsError::NotEmpty);
                    }
                }
                (false, false) => self.handles.detach(&new),
            }
            self.delete_entry(&new)?;
        }

        self.move_entry(&old, &new, record)?;
        dir_index::remove_child_from_parent(self.attrs.as_ref(), self.content.as_ref(), &old)?;
        dir_index::add_child_to_parent(self.attrs.as_ref(), self.content.as_ref(), &new)?;
        self.handles.rename_paths(&old, &new);
        Ok(())
    }

    // ── content ─────────────────────────────────────────────────────────────

    /// Shrink or zero-extend a file to `length` bytes.
    pub fn truncate(&self, path: &str, length: u64) -> FsResult<()> {
        let path = path::normalize(path)?;
        log::debug!("truncate {} {}", path, length);
        if length > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge);
        }
        let _guard = self.locks.acquire(&[path.as_str()]);

        let mut record = self.file_record(&path)?;
        let Some(stored) = self.content.get(&path)? else {
            log::warn!("inconsistent entry {}: truncate without content", path);
            return Ok(());
        };

        let truncated = self.codec.truncate(&stored, length)?;
        self.content.update(&path, &truncated)?;
        self.content.commit()?;

        record.datalen = length;
        record.touch_modified();
        self.attrs.update(&path, &record)?;
        Ok(())
    }

    /// Up to `size` bytes at `offset`; short at end of file.
    pub fn read(&self, path: &str, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        let path = path::normalize(path)?;
        log::debug!("read {} size={} offset={}", path, size, offset);
        let _guard = self.locks.acquire(&[path.as_str()]);

        let record = self.file_record(&path)?;
        let stored = self.payload(&path)?;
        let logical = self.codec.logical_len(&stored)?;
        if logical != record.datalen {
            log::warn!(
                "inconsistent entry {}: datalen {} but content holds {}",
                path,
                record.datalen,
                logical
            );
        }
        Ok(self.codec.read(&stored, offset, size)?)
    }

    /// Write through a call-scoped buffer. Returns `data.len()`.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<usize> {
        let path = path::normalize(path)?;
        log::debug!("write {} len={} offset={}", path, data.len(), offset);
        Self::check_extent(offset, data.len())?;
        let _guard = self.locks.acquire(&[path.as_str()]);

        self.file_record(&path)?;
        let mut buffer = WriteBuffer::new(self.codec.payload_size());
        let mut sink = ContentSink { fs: self, path: &path };
        buffer.write(&mut sink, data, offset)
    }

    // ── handles ─────────────────────────────────────────────────────────────

    /// Open a file and return its handle number.
    pub fn open(&self, path: &str, flags: i32) -> FsResult<u64> {
        let path = path::normalize(path)?;
        let _guard = self.locks.acquire(&[path.as_str()]);
        self.file_record(&path)?;

        let fh = self.handles.insert(OpenFileHandle::new(
            path.clone(),
            flags,
            self.codec.payload_size(),
        ));
        log::debug!("open {} fh={}", path, fh);
        Ok(fh)
    }

    /// Write through the handle's own buffer.
    pub fn write_handle(&self, fh: u64, data: &[u8], offset: u64) -> FsResult<usize> {
        let handle = self.handles.get(fh).ok_or(FsError::BadFileDescriptor)?;
        Self::check_extent(offset, data.len())?;
        loop {
            let path = handle.lock().unwrap_or_else(|e| e.into_inner()).path.clone();
            let _guard = self.locks.acquire(&[path.as_str()]);

            let mut h = handle.lock().unwrap_or_else(|e| e.into_inner());
            if h.unlinked {
                return Err(FsError::NotFound);
            }
            // Renamed between reading the path and taking the lock.
            if h.path != path {
                continue;
            }
            log::debug!("write fh={} {} len={} offset={}", fh, path, data.len(), offset);
            self.file_record(&path)?;
            let mut sink = ContentSink { fs: self, path: &path };
            return h.buffer.write(&mut sink, data, offset);
        }
    }

    /// Path a handle currently refers to.
    pub fn handle_path(&self, fh: u64) -> FsResult<String> {
        let handle = self.handles.get(fh).ok_or(FsError::BadFileDescriptor)?;
        let path = handle.lock().unwrap_or_else(|e| e.into_inner()).path.clone();
        Ok(path)
    }

    pub fn release(&self, fh: u64) -> FsResult<()> {
        log::debug!("release fh={}", fh);
        self.handles
            .remove(fh)
            .map(|_| ())
            .ok_or(FsError::BadFileDescriptor)
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    // ── maintenance ─────────────────────────────────────────────────────────

    /// Walk the tree from `/`, dropping listing entries whose record is gone.
    pub fn check_tree(&self) -> FsResult<RepairReport> {
        let mut report = RepairReport::default();
        let mut queue = VecDeque::from([ROOT.to_string()]);

        while let Some(dir) = queue.pop_front() {
            let _guard = self.locks.acquire(&[dir.as_str()]);
            let mut listing = dir_index::load(self.content.as_ref(), &dir)?;
            report.directories += 1;

            let mut dangling = Vec::new();
            for name in listing.names() {
                report.entries += 1;
                let child = path::join(&dir, name);
                match self.attrs.get(&child)? {
                    Some(record) if record.is_dir() => queue.push_back(child),
                    Some(_) => {}
                    None => dangling.push(name.to_string()),
                }
            }

            if dangling.is_empty() {
                continue;
            }
            for name in &dangling {
                let child = path::join(&dir, name);
                log::warn!("dropping dangling listing entry {}", child);
                listing.remove(name);
                report.dropped.push(child);
            }
            dir_index::store(self.attrs.as_ref(), self.content.as_ref(), &dir, &listing)?;
        }

        log::info!(
            "tree check: {} directories, {} entries, {} dropped",
            report.directories,
            report.entries,
            report.dropped.len()
        );
        Ok(report)
    }
}

fn size_or_data(value: Vec<u8>, size: u32) -> FsResult<XattrReply> {
    if size == 0 {
        return Ok(XattrReply::Size(value.len() as u32));
    }
    if value.len() > size as usize {
        return Err(FsError::Range);
    }
    Ok(XattrReply::Data(value))
}
