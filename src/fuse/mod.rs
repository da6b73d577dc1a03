//! FUSE boundary for the metafs dispatcher.
//!
//! `MetaFsMount` owns the inode table and forwards every kernel request to
//! the shared [`MetaFs`]. The session runs on a dedicated OS thread, never on
//! the tokio runtime, because store adapters block on that runtime.

pub mod inode;
pub mod operations;

use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

#[cfg(feature = "fuse")]
use fuser::MountOption;

use crate::vfs::MetaFs;

use self::inode::InodeTable;

/// Kernel-facing wrapper around the dispatcher.
pub struct MetaFsMount {
    pub fs: Arc<MetaFs>,
    pub inodes: InodeTable,
    /// Directory handle counter. Starts at 1: some FUSE backends treat fh=0
    /// as "no handle".
    pub next_dir_fh: AtomicU64,
}

impl MetaFsMount {
    pub fn new(fs: Arc<MetaFs>) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
            next_dir_fh: AtomicU64::new(1),
        }
    }
}

#[cfg(feature = "fuse")]
fn mount_options() -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName("metafs".to_string()),
        MountOption::RW,
        MountOption::DefaultPermissions,
    ];
    #[cfg(target_os = "macos")]
    options.push(MountOption::CUSTOM("volname=metafs".to_string()));
    options
}

/// Mount at `mountpoint` and serve requests until the filesystem is unmounted.
///
/// The session runs on its own thread; this call joins it.
#[cfg(feature = "fuse")]
pub fn mount(fs: Arc<MetaFs>, mountpoint: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(mountpoint)?;
    log::info!("Mounting metafs at {}", mountpoint.display());

    let session = MetaFsMount::new(fs);
    let options = mount_options();
    let target = mountpoint.to_path_buf();

    let handle = std::thread::Builder::new()
        .name("fuse-session".to_string())
        .spawn(move || fuser::mount2(session, &target, &options))?;

    match handle.join() {
        Ok(Ok(())) => {
            log::info!("metafs unmounted cleanly");
            Ok(())
        }
        Ok(Err(e)) => {
            log::error!("FUSE mount error: {}", e);
            Err(e)
        }
        Err(_) => Err(std::io::Error::other("FUSE session thread panicked")),
    }
}

#[cfg(not(feature = "fuse"))]
pub fn mount(_fs: Arc<MetaFs>, _mountpoint: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "metafs was built without the `fuse` feature",
    ))
}
