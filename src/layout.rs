use log::debug;
use serde::{Deserialize, Serialize};

use crate::common::{BLOCK_SZ, FSMAGIC, SUPERBLOCK_SZ};
use crate::error::{FsError, Result};
use crate::image::Image;

/// On-disk superblock, written once by mkfs and read-only afterwards.
/// Region pointers are absolute byte offsets into the image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperBlock {
    /// Must be FSMAGIC
    pub magic: u32,
    /// Number of inode records
    pub num_inodes: u64,
    /// Number of data blocks
    pub num_data_blocks: u64,
    /// Offset of the inode bitmap
    pub i_bitmap_ptr: u64,
    /// Offset of the data-block bitmap
    pub d_bitmap_ptr: u64,
    /// Offset of the inode table
    pub i_blocks_ptr: u64,
    /// Offset of the data region
    pub d_blocks_ptr: u64,
}

/// Validated image geometry. Every offset computation in the crate goes
/// through these accessors; nothing else hard-codes region math.
#[derive(Debug, Clone)]
pub struct Layout {
    pub num_inodes: u64,
    pub num_data_blocks: u64,
    pub i_bitmap_ptr: u64,
    pub d_bitmap_ptr: u64,
    pub i_blocks_ptr: u64,
    pub d_blocks_ptr: u64,
}

impl Layout {
    /// Interpret and validate the header region. Runs before any other
    /// component touches the image; a failure here aborts the mount.
    pub fn open(img: &Image) -> Result<Self> {
        if img.len() < SUPERBLOCK_SZ as u64 {
            return Err(FsError::CorruptHeader);
        }
        let sb: SuperBlock = img.read_record(0, SUPERBLOCK_SZ);
        if sb.magic != FSMAGIC {
            return Err(FsError::CorruptHeader);
        }
        // Bitmap regions are whole bytes.
        if sb.num_inodes == 0
            || sb.num_data_blocks == 0
            || sb.num_inodes % 8 != 0
            || sb.num_data_blocks % 8 != 0
        {
            return Err(FsError::CorruptHeader);
        }

        // Lengths and end offsets derive from untrusted header fields; a
        // sum that wraps u64 must read as corruption, not slip past the
        // ordering check below.
        let end = |ptr: u64, count: u64, unit: u64| {
            count.checked_mul(unit).and_then(|len| ptr.checked_add(len))
        };
        let (
            Some(i_bitmap_end),
            Some(d_bitmap_end),
            Some(i_blocks_end),
            Some(d_blocks_end),
        ) = (
            end(sb.i_bitmap_ptr, sb.num_inodes / 8, 1),
            end(sb.d_bitmap_ptr, sb.num_data_blocks / 8, 1),
            end(sb.i_blocks_ptr, sb.num_inodes, BLOCK_SZ as u64),
            end(sb.d_blocks_ptr, sb.num_data_blocks, BLOCK_SZ as u64),
        )
        else {
            return Err(FsError::CorruptHeader);
        };

        // Regions must sit behind the header, in order, without overlap,
        // and the data region must end inside the image.
        let ordered = (SUPERBLOCK_SZ as u64) <= sb.i_bitmap_ptr
            && i_bitmap_end <= sb.d_bitmap_ptr
            && d_bitmap_end <= sb.i_blocks_ptr
            && i_blocks_end <= sb.d_blocks_ptr
            && d_blocks_end <= img.len();
        if !ordered {
            return Err(FsError::CorruptHeader);
        }

        debug!(
            "layout: {} inodes, {} data blocks, data region at {:#x}",
            sb.num_inodes, sb.num_data_blocks, sb.d_blocks_ptr
        );
        Ok(Layout {
            num_inodes: sb.num_inodes,
            num_data_blocks: sb.num_data_blocks,
            i_bitmap_ptr: sb.i_bitmap_ptr,
            d_bitmap_ptr: sb.d_bitmap_ptr,
            i_blocks_ptr: sb.i_blocks_ptr,
            d_blocks_ptr: sb.d_blocks_ptr,
        })
    }

    /// Offset of inode record `num`. One record per block slot.
    pub fn inode_off(&self, num: u32) -> u64 {
        assert!((num as u64) < self.num_inodes, "inode {num} out of range");
        self.i_blocks_ptr + num as u64 * BLOCK_SZ as u64
    }

    /// Offset of data block `index`.
    pub fn data_off(&self, index: u64) -> u64 {
        assert!(index < self.num_data_blocks, "data block {index} out of range");
        self.d_blocks_ptr + index * BLOCK_SZ as u64
    }

    /// Bitmap index of an absolute data-block offset, as stored in inode
    /// block arrays. Offsets only ever originate from this engine, so a
    /// misaligned or out-of-range value is an invariant violation.
    pub fn data_index(&self, off: u64) -> u64 {
        assert!(off >= self.d_blocks_ptr, "offset {off:#x} before data region");
        let rel = off - self.d_blocks_ptr;
        assert!(rel % BLOCK_SZ as u64 == 0, "offset {off:#x} not block-aligned");
        let index = rel / BLOCK_SZ as u64;
        assert!(index < self.num_data_blocks, "offset {off:#x} past data region");
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FSMAGIC;

    fn sb_bytes(sb: &SuperBlock, img_len: usize) -> Image {
        let mut buf = vec![0u8; img_len];
        let enc = bincode::serialize(sb).unwrap();
        buf[..enc.len()].copy_from_slice(&enc);
        Image::from_vec(buf)
    }

    fn valid_sb() -> SuperBlock {
        let i_bitmap_ptr = SUPERBLOCK_SZ as u64;
        let d_bitmap_ptr = i_bitmap_ptr + 1; // 8 inodes
        let i_blocks_ptr = d_bitmap_ptr + 1; // 8 data blocks
        let d_blocks_ptr = i_blocks_ptr + 8 * BLOCK_SZ as u64;
        SuperBlock {
            magic: FSMAGIC,
            num_inodes: 8,
            num_data_blocks: 8,
            i_bitmap_ptr,
            d_bitmap_ptr,
            i_blocks_ptr,
            d_blocks_ptr,
        }
    }

    fn img_len(sb: &SuperBlock) -> usize {
        (sb.d_blocks_ptr + sb.num_data_blocks * BLOCK_SZ as u64) as usize
    }

    #[test]
    fn superblock_encodes_to_its_layout_constant() {
        let sb = valid_sb();
        assert_eq!(bincode::serialized_size(&sb).unwrap() as usize, SUPERBLOCK_SZ);
    }

    #[test]
    fn accepts_consistent_header() {
        let sb = valid_sb();
        let img = sb_bytes(&sb, img_len(&sb));
        let layout = Layout::open(&img).unwrap();
        assert_eq!(layout.num_inodes, 8);
        assert_eq!(layout.inode_off(0), sb.i_blocks_ptr);
        assert_eq!(layout.data_off(1), sb.d_blocks_ptr + BLOCK_SZ as u64);
        assert_eq!(layout.data_index(layout.data_off(5)), 5);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut sb = valid_sb();
        sb.magic = 0xdead_beef;
        let img = sb_bytes(&sb, img_len(&sb));
        assert!(matches!(Layout::open(&img), Err(FsError::CorruptHeader)));
    }

    #[test]
    fn rejects_overlapping_regions() {
        let mut sb = valid_sb();
        sb.i_blocks_ptr = sb.d_bitmap_ptr; // inode table over the data bitmap
        let img = sb_bytes(&sb, img_len(&sb));
        assert!(Layout::open(&img).is_err());
    }

    #[test]
    fn rejects_header_with_wrapping_region_sums() {
        // Counts and pointers chosen so the naive end-of-region sums wrap
        // u64 and would come out "ordered".
        let mut sb = valid_sb();
        sb.num_inodes = 1 << 61;
        sb.num_data_blocks = 1 << 61;
        sb.i_blocks_ptr = u64::MAX - BLOCK_SZ as u64;
        sb.d_blocks_ptr = u64::MAX - BLOCK_SZ as u64;
        let img = sb_bytes(&sb, SUPERBLOCK_SZ + 16);
        assert!(matches!(Layout::open(&img), Err(FsError::CorruptHeader)));
    }

    #[test]
    fn rejects_truncated_image() {
        let sb = valid_sb();
        let img = sb_bytes(&sb, img_len(&sb) - 1);
        assert!(Layout::open(&img).is_err());
    }

    #[test]
    fn rejects_tiny_image() {
        let img = Image::from_vec(vec![0u8; 8]);
        assert!(Layout::open(&img).is_err());
    }
}
