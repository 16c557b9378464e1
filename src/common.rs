use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies a formatted image, first field of the superblock.
pub const FSMAGIC: u32 = 0x7766_7330;

/// block size
pub const BLOCK_SZ: usize = 512;

/// direct block slots in an inode
pub const N_DIRECT: usize = 7;

/// index of the indirect slot in an inode's block array
pub const IND_SLOT: usize = N_DIRECT;

/// block slots per inode, direct plus one indirect
pub const N_BLOCK_SLOTS: usize = N_DIRECT + 1;

/// block offsets held by one indirect block
pub const N_INDIRECT: usize = BLOCK_SZ / size_of::<u64>();

/// max blocks a file can span
pub const MAX_FILE_BLOCKS: usize = N_DIRECT + N_INDIRECT;

/// max dentry name length, bytes
pub const NAME_SZ: usize = 28;

/// bincode-encoded dentry size
pub const DENTRY_SZ: usize = NAME_SZ + 4;

/// dentries per directory block
pub const N_DENTRY: usize = BLOCK_SZ / DENTRY_SZ;

/// Directories are addressed through direct slots only.
pub const DIR_MAX_BLOCKS: usize = N_DIRECT;

/// bincode-encoded superblock size
pub const SUPERBLOCK_SZ: usize = 4 + 6 * 8;

/// bincode-encoded inode record size (the record still owns a full block slot)
pub const INODE_SZ: usize = 5 * 4 + 8 + 3 * 8 + N_BLOCK_SLOTS * 8;

/// Seconds since the epoch, for inode timestamps.
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}
