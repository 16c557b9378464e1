use log::info;

use crate::bitmap::Bitmap;
use crate::common::{BLOCK_SZ, FSMAGIC, INODE_SZ, SUPERBLOCK_SZ};
use crate::error::{FsError, Result};
use crate::image::Image;
use crate::inode::{Inode, ROOT_INO};
use crate::layout::SuperBlock;

fn round_up(n: u64, to: u64) -> u64 {
    n.div_ceil(to) * to
}

/// Lay out a fresh image: superblock, the two bitmaps, a block-aligned
/// inode table and the data region. Counts are rounded up to multiples
/// of 8 so each bitmap covers whole bytes. The root directory (inode 0)
/// is created empty, with its bitmap bit set.
pub fn mkfs(num_inodes: u64, num_data_blocks: u64) -> Result<Image> {
    if num_inodes == 0 || num_data_blocks == 0 {
        return Err(FsError::CorruptHeader);
    }
    let num_inodes = round_up(num_inodes, 8);
    let num_data_blocks = round_up(num_data_blocks, 8);

    let i_bitmap_ptr = SUPERBLOCK_SZ as u64;
    let d_bitmap_ptr = i_bitmap_ptr + num_inodes / 8;
    let i_blocks_ptr = round_up(d_bitmap_ptr + num_data_blocks / 8, BLOCK_SZ as u64);
    let d_blocks_ptr = i_blocks_ptr + num_inodes * BLOCK_SZ as u64;
    let total = d_blocks_ptr + num_data_blocks * BLOCK_SZ as u64;

    let mut img = Image::from_vec(vec![0u8; total as usize]);
    let sb = SuperBlock {
        magic: FSMAGIC,
        num_inodes,
        num_data_blocks,
        i_bitmap_ptr,
        d_bitmap_ptr,
        i_blocks_ptr,
        d_blocks_ptr,
    };
    img.write_record(0, SUPERBLOCK_SZ, &sb);

    Bitmap::new(i_bitmap_ptr, num_inodes).claim(&mut img, ROOT_INO as u64);
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    let root = Inode::new(ROOT_INO, libc::S_IFDIR | 0o755, uid, gid, 0);
    img.write_record(i_blocks_ptr, INODE_SZ, &root);

    info!(
        "formatted image: {num_inodes} inodes, {num_data_blocks} data blocks, {total} bytes"
    );
    Ok(img)
}
