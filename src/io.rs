use log::debug;

use crate::common::{unix_now, BLOCK_SZ, IND_SLOT, MAX_FILE_BLOCKS, N_DIRECT};
use crate::error::{FsError, Result};
use crate::fs::Inner;
use crate::inode::Inode;

impl Inner {
    /// Physical offset of logical block `lbi`, if allocated. Blocks past
    /// the direct slots resolve through the indirect block. `None` means
    /// a hole: sparse writes allocate only the blocks they touch, so a
    /// block inside `size` may still be unmapped.
    fn bmap(&self, ino: &Inode, lbi: usize) -> Option<u64> {
        if lbi < N_DIRECT {
            return match ino.blocks[lbi] {
                0 => None,
                off => Some(off),
            };
        }
        assert!(lbi < MAX_FILE_BLOCKS, "logical block {lbi} beyond file capacity");
        let ind = ino.blocks[IND_SLOT];
        if ind == 0 {
            return None;
        }
        let entry: u64 = self.img.read_record(ind + ((lbi - N_DIRECT) * 8) as u64, 8);
        match entry {
            0 => None,
            off => Some(off),
        }
    }

    /// Like [`Inner::bmap`] but allocates the block (and, for overflow
    /// blocks, the indirect block itself) on demand. Does not persist the
    /// inode record; the caller does that once its update is complete.
    fn bmap_or_alloc(&mut self, ino: &mut Inode, lbi: usize) -> Result<u64> {
        if let Some(off) = self.bmap(ino, lbi) {
            return Ok(off);
        }
        if lbi < N_DIRECT {
            let off = self.alloc_data_block()?;
            ino.blocks[lbi] = off;
            return Ok(off);
        }
        if ino.blocks[IND_SLOT] == 0 {
            ino.blocks[IND_SLOT] = self.alloc_data_block()?;
        }
        let off = self.alloc_data_block()?;
        let entry_off = ino.blocks[IND_SLOT] + ((lbi - N_DIRECT) * 8) as u64;
        self.img.write_record(entry_off, 8, &off);
        Ok(off)
    }

    /// Bounded read. Reading at or past EOF yields an empty buffer, not
    /// an error; the range is clamped to `size` and copied out in chunks
    /// that never cross a block boundary. Holes read as zeros. Updates
    /// `atim`.
    pub fn read_file(&mut self, ino: &mut Inode, offset: u64, len: usize) -> Vec<u8> {
        if offset >= ino.size || len == 0 {
            return Vec::new();
        }
        let end = ino.size.min(offset + len as u64);
        let mut buf = Vec::with_capacity((end - offset) as usize);
        let mut pos = offset;
        while pos < end {
            let lbi = (pos / BLOCK_SZ as u64) as usize;
            let boff = (pos % BLOCK_SZ as u64) as usize;
            let n = (BLOCK_SZ - boff).min((end - pos) as usize);
            match self.bmap(ino, lbi) {
                Some(block_off) => {
                    buf.extend_from_slice(self.img.slice(block_off + boff as u64, n));
                }
                None => buf.resize(buf.len() + n, 0),
            }
            pos += n as u64;
        }
        ino.atim = unix_now();
        self.put_inode(ino);
        debug!("read inode {}: {} bytes at {}", ino.num, buf.len(), offset);
        buf
    }

    /// Bounded write, extending the file block by block as the logical
    /// index advances. Progress already committed when space runs out is
    /// kept: the caller sees the short count, or `OutOfSpace` when not a
    /// single byte landed. Updates `size` to cover the written range and
    /// `mtim`.
    pub fn write_file(&mut self, ino: &mut Inode, offset: u64, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        let mut pos = offset;
        while written < data.len() {
            let lbi = (pos / BLOCK_SZ as u64) as usize;
            if lbi >= MAX_FILE_BLOCKS {
                break;
            }
            let block_off = match self.bmap_or_alloc(ino, lbi) {
                Ok(off) => off,
                Err(FsError::OutOfSpace) => break,
                Err(e) => return Err(e),
            };
            let boff = (pos % BLOCK_SZ as u64) as usize;
            let n = (BLOCK_SZ - boff).min(data.len() - written);
            self.img
                .slice_mut(block_off + boff as u64, n)
                .copy_from_slice(&data[written..written + n]);
            written += n;
            pos += n as u64;
        }
        if written == 0 {
            // The indirect block may have been claimed even though no
            // data landed; persist the record so the bitmap and the
            // inode's block list stay in agreement.
            self.put_inode(ino);
            return Err(FsError::OutOfSpace);
        }
        ino.size = ino.size.max(offset + written as u64);
        ino.mtim = unix_now();
        self.put_inode(ino);
        debug!("write inode {}: {} of {} bytes at {}", ino.num, written, data.len(), offset);
        Ok(written)
    }
}
