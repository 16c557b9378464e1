use serde::{Deserialize, Serialize};

use crate::common::{unix_now, INODE_SZ, N_BLOCK_SLOTS};
use crate::fs::Inner;

/// Root directory, always allocated, never removed.
pub const ROOT_INO: u32 = 0;

/// On-disk inode record. One record per `BLOCK_SZ` slot of the inode
/// table; the slot index always equals `num`. The block array holds
/// absolute byte offsets of data blocks, 0 meaning unallocated (offset 0
/// is the superblock, never a data block). Slots `0..N_DIRECT` are
/// direct, the last slot addresses the indirect block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inode {
    /// Self index into the inode table
    pub num: u32,
    /// File type bits plus permission bits, S_IFDIR / S_IFREG
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// File size in bytes; for directories always a whole number of blocks
    pub size: u64,
    /// For directories: number of child dentries. Regular files stay at 1.
    pub nlinks: u32,
    pub atim: i64,
    pub mtim: i64,
    pub ctim: i64,
    /// Data block offsets, direct slots then one indirect slot
    pub blocks: [u64; N_BLOCK_SLOTS],
}

impl Inode {
    /// Fresh record with all timestamps at `now` and no blocks.
    pub fn new(num: u32, mode: u32, uid: u32, gid: u32, nlinks: u32) -> Self {
        let now = unix_now();
        Inode {
            num,
            mode,
            uid,
            gid,
            size: 0,
            nlinks,
            atim: now,
            mtim: now,
            ctim: now,
            blocks: [0; N_BLOCK_SLOTS],
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFREG
    }
}


impl Inner {
    /// Read inode record `num`. `num` values only originate from the
    /// allocator or from dentries this engine wrote, so the bounds assert
    /// inside [`crate::layout::Layout::inode_off`] guards an invariant.
    pub fn inode(&self, num: u32) -> Inode {
        let ino: Inode = self.img.read_record(self.layout.inode_off(num), INODE_SZ);
        debug_assert_eq!(ino.num, num, "inode record disagrees with its slot");
        ino
    }

    /// Write an inode record back to its slot.
    pub fn put_inode(&mut self, ino: &Inode) {
        self.img.write_record(self.layout.inode_off(ino.num), INODE_SZ, ino);
    }
}
