//! FUSE filesystem trait implementation for MetaFsMount.
//!
//! Each callback resolves inode numbers to paths, calls the matching
//! dispatcher operation, and maps `FsError` to an errno. Store failures are
//! logged at error level here, since this is where they leave the process.

#[cfg(feature = "fuse")]
mod implementation {
    use fuser::{
        FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
        ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request,
        TimeOrNow,
    };
    use std::ffi::OsStr;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use crate::error::{FsError, FsResult};
    use crate::fuse::inode::BLOCK_SIZE;
    use crate::fuse::MetaFsMount;
    use crate::vfs::node::{now_millis, NodeKind, NodeRecord};
    use crate::vfs::{path, XattrReply};

    /// Attribute and entry cache lifetime. Short, since another mount may
    /// share the same stores.
    const TTL: Duration = Duration::from_secs(1);

    /// Longest name accepted by statfs consumers.
    const NAME_MAX: u32 = 255;

    fn to_system_time(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    fn to_millis(time: TimeOrNow) -> u64 {
        match time {
            TimeOrNow::Now => now_millis(),
            TimeOrNow::SpecificTime(t) => t
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }

    fn file_type(record: &NodeRecord) -> FileType {
        match record.kind() {
            Some(NodeKind::Directory) => FileType::Directory,
            Some(NodeKind::Symlink) => FileType::Symlink,
            _ => FileType::RegularFile,
        }
    }

    /// Build the kernel view of a Node Record.
    pub(crate) fn file_attr(ino: u64, record: &NodeRecord) -> FileAttr {
        let kind = file_type(record);
        FileAttr {
            ino,
            size: record.datalen,
            blocks: record.datalen.div_ceil(512),
            atime: to_system_time(record.atime),
            mtime: to_system_time(record.mtime),
            ctime: to_system_time(record.ctime),
            crtime: to_system_time(record.ctime),
            kind,
            perm: record.permissions() as u16,
            nlink: if kind == FileType::Directory { 2 } else { 1 },
            uid: record.uid,
            gid: record.gid,
            rdev: record.dev as u32,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Log a failed operation and return its errno.
    fn errno(op: &str, target: &str, err: &FsError) -> libc::c_int {
        match err {
            FsError::Store(_) | FsError::Corrupt(_) => log::error!("{} {}: {}", op, target, err),
            _ => log::debug!("{} {}: {}", op, target, err),
        }
        err.errno()
    }

    impl MetaFsMount {
        fn resolve(&self, ino: u64) -> Option<String> {
            self.inodes.path_of(ino).map(str::to_string)
        }

        fn resolve_child(&self, parent: u64, name: &OsStr) -> Result<String, libc::c_int> {
            let name = name.to_str().ok_or(libc::EINVAL)?;
            self.inodes.child_path(parent, name).ok_or(libc::ENOENT)
        }

        /// Reply with the entry for a path that was just created or found.
        fn reply_entry(&mut self, op: &str, path: &str, reply: ReplyEntry) {
            match self.fs.get_attributes(path) {
                Ok(record) => {
                    let ino = self.inodes.ino_for(path);
                    reply.entry(&TTL, &file_attr(ino, &record), 0);
                }
                Err(e) => reply.error(errno(op, path, &e)),
            }
        }
    }

    impl Filesystem for MetaFsMount {
        fn init(
            &mut self,
            _req: &Request<'_>,
            _config: &mut fuser::KernelConfig,
        ) -> Result<(), libc::c_int> {
            log::info!("metafs session started");
            Ok(())
        }

        fn destroy(&mut self) {
            log::info!(
                "metafs session ended ({} inodes, {} open handles)",
                self.inodes.len(),
                self.fs.open_handles()
            );
        }

        fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
            match self.resolve_child(parent, name) {
                Ok(path) => self.reply_entry("lookup", &path, reply),
                Err(code) => reply.error(code),
            }
        }

        fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.get_attributes(&path) {
                Ok(record) => reply.attr(&TTL, &file_attr(ino, &record)),
                Err(e) => reply.error(errno("getattr", &path, &e)),
            }
        }

        fn setattr(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            mode: Option<u32>,
            uid: Option<u32>,
            gid: Option<u32>,
            size: Option<u64>,
            atime: Option<TimeOrNow>,
            mtime: Option<TimeOrNow>,
            _ctime: Option<SystemTime>,
            _fh: Option<u64>,
            _crtime: Option<SystemTime>,
            _chgtime: Option<SystemTime>,
            _bkuptime: Option<SystemTime>,
            _flags: Option<u32>,
            reply: ReplyAttr,
        ) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };

            let result = (|| -> FsResult<NodeRecord> {
                if let Some(mode) = mode {
                    self.fs.set_mode(&path, mode)?;
                }
                if uid.is_some() || gid.is_some() {
                    self.fs.set_owner(&path, uid, gid)?;
                }
                if let Some(size) = size {
                    self.fs.truncate(&path, size)?;
                }
                if atime.is_some() || mtime.is_some() {
                    self.fs
                        .set_times(&path, atime.map(to_millis), mtime.map(to_millis))?;
                }
                self.fs.get_attributes(&path)
            })();

            match result {
                Ok(record) => reply.attr(&TTL, &file_attr(ino, &record)),
                Err(e) => reply.error(errno("setattr", &path, &e)),
            }
        }

        fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.read_symlink_target(&path) {
                Ok(target) => reply.data(target.as_bytes()),
                Err(e) => reply.error(errno("readlink", &path, &e)),
            }
        }

        fn mknod(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            mode: u32,
            umask: u32,
            rdev: u32,
            reply: ReplyEntry,
        ) {
            let path = match self.resolve_child(parent, name) {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };
            match self.fs.create_node(&path, mode & !umask, rdev as u64) {
                Ok(()) => self.reply_entry("mknod", &path, reply),
                Err(e) => reply.error(errno("mknod", &path, &e)),
            }
        }

        fn mkdir(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            mode: u32,
            umask: u32,
            reply: ReplyEntry,
        ) {
            let path = match self.resolve_child(parent, name) {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };
            match self.fs.make_directory(&path, mode & !umask) {
                Ok(()) => self.reply_entry("mkdir", &path, reply),
                Err(e) => reply.error(errno("mkdir", &path, &e)),
            }
        }

        fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            let path = match self.resolve_child(parent, name) {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };
            match self.fs.remove(&path) {
                Ok(()) => {
                    self.inodes.forget(&path);
                    reply.ok();
                }
                Err(e) => reply.error(errno("unlink", &path, &e)),
            }
        }

        fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            let path = match self.resolve_child(parent, name) {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };
            match self.fs.remove_directory(&path) {
                Ok(()) => {
                    self.inodes.forget(&path);
                    reply.ok();
                }
                Err(e) => reply.error(errno("rmdir", &path, &e)),
            }
        }

        fn symlink(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            link_name: &OsStr,
            target: &Path,
            reply: ReplyEntry,
        ) {
            let path = match self.resolve_child(parent, link_name) {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };
            let Some(target) = target.to_str() else {
                reply.error(libc::EINVAL);
                return;
            };
            match self.fs.create_symlink(&path, target) {
                Ok(()) => self.reply_entry("symlink", &path, reply),
                Err(e) => reply.error(errno("symlink", &path, &e)),
            }
        }

        fn rename(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            newparent: u64,
            newname: &OsStr,
            _flags: u32,
            reply: ReplyEmpty,
        ) {
            let paths = self
                .resolve_child(parent, name)
                .and_then(|old| Ok((old, self.resolve_child(newparent, newname)?)));
            let (old, new) = match paths {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };
            match self.fs.rename(&old, &new) {
                Ok(()) => {
                    self.inodes.rename(&old, &new);
                    reply.ok();
                }
                Err(e) => reply.error(errno("rename", &old, &e)),
            }
        }

        fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.open(&path, flags) {
                Ok(fh) => reply.opened(fh, 0),
                Err(e) => reply.error(errno("open", &path, &e)),
            }
        }

        fn read(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            size: u32,
            _flags: i32,
            _lock: Option<u64>,
            reply: ReplyData,
        ) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            if offset < 0 {
                reply.error(libc::EINVAL);
                return;
            }
            match self.fs.read(&path, size as usize, offset as u64) {
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(errno("read", &path, &e)),
            }
        }

        fn write(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            fh: u64,
            offset: i64,
            data: &[u8],
            _write_flags: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyWrite,
        ) {
            if offset < 0 {
                reply.error(libc::EINVAL);
                return;
            }
            match self.fs.write_handle(fh, data, offset as u64) {
                Ok(n) => reply.written(n as u32),
                Err(e) => {
                    let target = self.resolve(ino).unwrap_or_default();
                    reply.error(errno("write", &target, &e))
                }
            }
        }

        /// Handle buffers are drained by every write, so there is nothing to flush.
        fn flush(
            &mut self,
            _req: &Request<'_>,
            _ino: u64,
            _fh: u64,
            _lock_owner: u64,
            reply: ReplyEmpty,
        ) {
            reply.ok();
        }

        fn release(
            &mut self,
            _req: &Request<'_>,
            _ino: u64,
            fh: u64,
            _flags: i32,
            _lock_owner: Option<u64>,
            _flush: bool,
            reply: ReplyEmpty,
        ) {
            match self.fs.release(fh) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(errno("release", &fh.to_string(), &e)),
            }
        }

        fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.get_attributes(&path) {
                Ok(record) if record.is_dir() => {
                    let fh = self.next_dir_fh.fetch_add(1, Ordering::SeqCst);
                    reply.opened(fh, 0);
                }
                Ok(_) => reply.error(libc::ENOTDIR),
                Err(e) => reply.error(errno("opendir", &path, &e)),
            }
        }

        fn readdir(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            mut reply: ReplyDirectory,
        ) {
            let Some(dir) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            let names = match self.fs.list_directory(&dir) {
                Ok(names) => names,
                Err(e) => return reply.error(errno("readdir", &dir, &e)),
            };

            let parent_ino = self.inodes.ino_for(path::parent(&dir));
            let mut entries = vec![
                (ino, FileType::Directory, ".".to_string()),
                (parent_ino, FileType::Directory, "..".to_string()),
            ];
            for name in names {
                let child = path::join(&dir, &name);
                match self.fs.get_attributes(&child) {
                    Ok(record) => {
                        entries.push((self.inodes.ino_for(&child), file_type(&record), name))
                    }
                    Err(FsError::NotFound) => {
                        log::warn!("readdir {}: listed entry {} has no record", dir, name)
                    }
                    Err(e) => return reply.error(errno("readdir", &child, &e)),
                }
            }

            for (i, (child_ino, kind, name)) in
                entries.into_iter().enumerate().skip(offset.max(0) as usize)
            {
                if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                    break;
                }
            }
            reply.ok();
        }

        fn releasedir(
            &mut self,
            _req: &Request<'_>,
            _ino: u64,
            _fh: u64,
            _flags: i32,
            reply: ReplyEmpty,
        ) {
            reply.ok();
        }

        /// Space is whatever the backing stores have; report an empty volume.
        fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
            let files = self.inodes.len() as u64;
            reply.statfs(0, 0, 0, files, u32::MAX as u64, BLOCK_SIZE, NAME_MAX, BLOCK_SIZE);
        }

        fn setxattr(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            name: &OsStr,
            value: &[u8],
            flags: i32,
            _position: u32,
            reply: ReplyEmpty,
        ) {
            let (Some(path), Some(name)) = (self.resolve(ino), name.to_str()) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.set_xattr(&path, name, value, flags) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(errno("setxattr", &path, &e)),
            }
        }

        fn getxattr(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            name: &OsStr,
            size: u32,
            reply: ReplyXattr,
        ) {
            let (Some(path), Some(name)) = (self.resolve(ino), name.to_str()) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.get_xattr(&path, name, size) {
                Ok(XattrReply::Size(n)) => reply.size(n),
                Ok(XattrReply::Data(value)) => reply.data(&value),
                Err(e) => reply.error(errno("getxattr", &path, &e)),
            }
        }

        fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
            let Some(path) = self.resolve(ino) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.list_xattr_names(&path, size) {
                Ok(XattrReply::Size(n)) => reply.size(n),
                Ok(XattrReply::Data(names)) => reply.data(&names),
                Err(e) => reply.error(errno("listxattr", &path, &e)),
            }
        }

        fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
            let (Some(path), Some(name)) = (self.resolve(ino), name.to_str()) else {
                reply.error(libc::ENOENT);
                return;
            };
            match self.fs.remove_xattr(&path, name) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(errno("removexattr", &path, &e)),
            }
        }

        fn create(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            mode: u32,
            umask: u32,
            flags: i32,
            reply: ReplyCreate,
        ) {
            let path = match self.resolve_child(parent, name) {
                Ok(p) => p,
                Err(code) => return reply.error(code),
            };

            let result = self
                .fs
                .create_file(&path, mode & !umask)
                .and_then(|()| self.fs.get_attributes(&path))
                .and_then(|record| Ok((record, self.fs.open(&path, flags)?)));

            match result {
                Ok((record, fh)) => {
                    let ino = self.inodes.ino_for(&path);
                    reply.created(&TTL, &file_attr(ino, &record), 0, fh, 0);
                }
                Err(e) => reply.error(errno("create", &path, &e)),
            }
        }
    }
}

#[cfg(all(test, feature = "fuse"))]
mod tests {
    use super::implementation::file_attr;
    use crate::vfs::node::{NodeKind, NodeRecord};
    use fuser::FileType;

    #[test]
    fn test_file_attr_from_record() {
        let mut record = NodeRecord::new(NodeKind::File, 0o640, 7, 8);
        record.datalen = 1025;
        record.mtime = 1_500;

        let attr = file_attr(42, &record);
        assert_eq!(attr.ino, 42);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o640);
        assert_eq!(attr.size, 1025);
        assert_eq!(attr.blocks, 3);
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.uid, 7);
        assert_eq!(
            attr.mtime,
            std::time::UNIX_EPOCH + std::time::Duration::from_millis(1_500)
        );
    }

    #[test]
    fn test_directory_and_symlink_kinds() {
        let dir = file_attr(1, &NodeRecord::new(NodeKind::Directory, 0o755, 0, 0));
        assert_eq!(dir.kind, FileType::Directory);
        assert_eq!(dir.nlink, 2);

        let link = file_attr(2, &NodeRecord::new(NodeKind::Symlink, 0o777, 0, 0));
        assert_eq!(link.kind, FileType::Symlink);
    }
}
