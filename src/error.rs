//! Error types for the metafs core.
//!
//! `FsError` is what every dispatcher operation returns. Each variant maps to
//! exactly one errno at the FUSE boundary via [`FsError::errno`].

use thiserror::Error;

/// Failure reported by a backing store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store request timed out")]
    Timeout,
    #[error("key already present: {0}")]
    Conflict(String),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding error: {0}")]
    Encoding(String),
}

/// Failure decoding or encoding encrypted pages.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("stored content is not a whole number of pages ({0} bytes)")]
    Misaligned(usize),
    #[error("page {index} declares payload length {len}")]
    BadLength { index: u64, len: u32 },
    #[error("page {0} failed authentication")]
    Decrypt(u64),
    #[error("page {0} encryption failed")]
    Encrypt(u64),
    #[error("logical length {0} exceeds the maximum file size")]
    TooLarge(u64),
}

/// Core filesystem error.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such entry")]
    NotFound,
    #[error("directory not empty")]
    NotEmpty,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("no such attribute")]
    NoAttribute,
    #[error("result does not fit the requested size")]
    Range,
    #[error("bad file handle")]
    BadFileDescriptor,
    #[error("file too large")]
    FileTooLarge,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt content: {0}")]
    Corrupt(#[from] PageError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type FsResult<T> = Result<T, FsError>;

#[cfg(target_os = "macos")]
const NO_ATTRIBUTE: libc::c_int = libc::ENOATTR;
#[cfg(not(target_os = "macos"))]
const NO_ATTRIBUTE: libc::c_int = libc::ENODATA;

impl FsError {
    /// Errno reported to the kernel for this error.
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::NoAttribute => NO_ATTRIBUTE,
            FsError::Range => libc::ERANGE,
            FsError::BadFileDescriptor => libc::EBADF,
            FsError::FileTooLarge | FsError::Corrupt(PageError::TooLarge(_)) => libc::EFBIG,
            FsError::Store(_) | FsError::Corrupt(_) => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::NotEmpty.errno(), libc::ENOTEMPTY);
        assert_eq!(FsError::IsADirectory.errno(), libc::EISDIR);
        assert_eq!(FsError::FileTooLarge.errno(), libc::EFBIG);
        assert_eq!(FsError::Corrupt(PageError::TooLarge(1)).errno(), libc::EFBIG);
        assert_eq!(FsError::Store(StoreError::Timeout).errno(), libc::EIO);
        assert_eq!(FsError::Corrupt(PageError::Decrypt(3)).errno(), libc::EIO);
    }

    #[test]
    fn test_store_error_converts() {
        let err: FsError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, FsError::Store(StoreError::Unavailable(_))));
    }
}
