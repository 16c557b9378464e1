//! wfs: a user-space filesystem engine over a fixed-layout disk image.
//!
//! Image layout:
//! [ superblock | inode bitmap | data bitmap | inode table | data blocks ]
//!
//! The superblock carries the region offsets; inode records occupy one
//! 512-byte slot each and address their data through seven direct slots
//! plus one indirect block. Directory content is an array of fixed-width
//! dentries. The [`FsOps`] trait is the operation surface a host
//! bridge forwards kernel VFS calls into; [`fuse::WfsFuse`] is the
//! in-tree FUSE bridge.

mod bitmap;
mod common;
mod dir;
mod error;
mod fs;
pub mod fuse;
mod image;
mod inode;
mod io;
mod layout;
mod mkfs;
mod ops;
mod path;

pub use common::{BLOCK_SZ, MAX_FILE_BLOCKS, NAME_SZ, N_DENTRY, N_DIRECT, N_INDIRECT};
pub use error::{FsError, Result};
pub use fs::Wfs;
pub use image::Image;
pub use inode::ROOT_INO;
pub use layout::{Layout, SuperBlock};
pub use mkfs::mkfs;
pub use ops::{Attr, DirEntry, FsOps};
