use std::fmt;

use libc::{EEXIST, EIO, EISDIR, ENAMETOOLONG, ENOENT, ENOSPC, ENOTDIR, ENOTEMPTY};

/// Every way an operation on a mounted image can fail. Raw error numbers
/// never cross component boundaries; conversion happens once, at the
/// bridge, via [`FsError::errno`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// A path component does not exist.
    NotFound,
    /// Create target already resolves.
    AlreadyExists,
    /// Inode or data-block bitmap is exhausted, or a file hit its
    /// direct+indirect capacity.
    OutOfSpace,
    /// A directory operation hit a regular file.
    NotADirectory,
    /// A file operation hit a directory.
    IsDirectory,
    /// rmdir on a directory that still has children.
    NotEmpty,
    /// A dentry name does not fit its fixed-width slot.
    NameTooLong,
    /// Superblock failed validation at mount time. Unrecoverable.
    CorruptHeader,
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// POSIX error number for the host bridge.
    pub fn errno(self) -> i32 {
        match self {
            FsError::NotFound => ENOENT,
            FsError::AlreadyExists => EEXIST,
            FsError::OutOfSpace => ENOSPC,
            FsError::NotADirectory => ENOTDIR,
            FsError::IsDirectory => EISDIR,
            FsError::NotEmpty => ENOTEMPTY,
            FsError::NameTooLong => ENAMETOOLONG,
            FsError::CorruptHeader => EIO,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::NotFound => "no such file or directory",
            FsError::AlreadyExists => "file exists",
            FsError::OutOfSpace => "no space left on image",
            FsError::NotADirectory => "not a directory",
            FsError::IsDirectory => "is a directory",
            FsError::NotEmpty => "directory not empty",
            FsError::NameTooLong => "name too long",
            FsError::CorruptHeader => "corrupt superblock",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for FsError {}
