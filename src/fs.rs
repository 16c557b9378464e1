use std::io;
use std::path::Path;
use std::sync::Mutex;

use log::{debug, info};

use crate::bitmap::Bitmap;
use crate::common::{BLOCK_SZ, IND_SLOT, INODE_SZ, N_DIRECT, N_INDIRECT};
use crate::error::{FsError, Result};
use crate::image::Image;
use crate::inode::Inode;
use crate::layout::Layout;

/// A mounted filesystem: the image buffer plus the views derived from its
/// validated layout, behind one coarse lock. Every operation that
/// allocates, frees, or resizes anything runs under that lock end to end,
/// so in-flight requests from the host bridge serialize here.
pub struct Wfs {
    inner: Mutex<Inner>,
}

/// Shared mutable state. Component modules (`inode`, `dir`, `path`, `io`,
/// `ops`) each add their `impl Inner` block.
pub(crate) struct Inner {
    pub img: Image,
    pub layout: Layout,
    /// One bit per inode number
    pub ibmap: Bitmap,
    /// One bit per data-block index
    pub dbmap: Bitmap,
}

impl Wfs {
    /// Validate the image header and build the derived views. The only
    /// fallible step is layout validation; `CorruptHeader` aborts the
    /// mount.
    pub fn mount(img: Image) -> Result<Self> {
        let layout = Layout::open(&img)?;
        let ibmap = Bitmap::new(layout.i_bitmap_ptr, layout.num_inodes);
        let dbmap = Bitmap::new(layout.d_bitmap_ptr, layout.num_data_blocks);
        // Root is formatted in; a clear root bit means the image was
        // never formatted or has been damaged.
        if !ibmap.is_set(&img, 0) {
            return Err(FsError::CorruptHeader);
        }
        // The record behind that bit must actually be the root directory;
        // every path resolution starts from it.
        let root: Inode = img.read_record(layout.inode_off(0), INODE_SZ);
        if root.num != 0 || !root.is_dir() {
            return Err(FsError::CorruptHeader);
        }
        info!(
            "mounted image: {} inodes, {} data blocks",
            layout.num_inodes, layout.num_data_blocks
        );
        Ok(Wfs {
            inner: Mutex::new(Inner { img, layout, ibmap, dbmap }),
        })
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Write the image back to its backing file. The engine mutates only
    /// the in-memory buffer; the bridge decides when to persist.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        self.lock().img.save(path)
    }

    pub fn into_image(self) -> Image {
        self.inner.into_inner().unwrap().img
    }
}

impl Inner {
    /// Claim the lowest free inode number.
    pub fn alloc_inode_num(&mut self) -> Result<u32> {
        let num = self.ibmap.find_free(&self.img).ok_or(FsError::OutOfSpace)?;
        self.ibmap.claim(&mut self.img, num);
        debug!("alloc inode {num}");
        Ok(num as u32)
    }

    pub fn release_inode_num(&mut self, num: u32) {
        debug!("release inode {num}");
        self.ibmap.release(&mut self.img, num as u64);
    }

    /// Claim the lowest free data block, zero it, and return its absolute
    /// byte offset (the form stored in inode block arrays).
    pub fn alloc_data_block(&mut self) -> Result<u64> {
        let index = self.dbmap.find_free(&self.img).ok_or(FsError::OutOfSpace)?;
        self.dbmap.claim(&mut self.img, index);
        let off = self.layout.data_off(index);
        self.img.slice_mut(off, BLOCK_SZ).fill(0);
        debug!("alloc data block {index} at {off:#x}");
        Ok(off)
    }

    /// Release the data block at absolute offset `off`.
    pub fn release_data_block(&mut self, off: u64) {
        let index = self.layout.data_index(off);
        debug!("release data block {index}");
        self.dbmap.release(&mut self.img, index);
    }

    /// Release every data block an inode addresses: direct slots, indirect
    /// entries, then the indirect block itself. Clears the slots as it
    /// goes; record hygiene for a record about to be orphaned.
    pub fn release_inode_blocks(&mut self, ino: &mut Inode) {
        for slot in 0..N_DIRECT {
            if ino.blocks[slot] != 0 {
                self.release_data_block(ino.blocks[slot]);
                ino.blocks[slot] = 0;
            }
        }
        let ind = ino.blocks[IND_SLOT];
        if ind != 0 {
            for j in 0..N_INDIRECT {
                let entry: u64 = self.img.read_record(ind + (j * 8) as u64, 8);
                if entry != 0 {
                    self.release_data_block(entry);
                }
            }
            self.release_data_block(ind);
            ino.blocks[IND_SLOT] = 0;
        }
        ino.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mkfs::mkfs;

    #[test]
    fn garbage_root_record_fails_mount() {
        let mut img = mkfs(8, 8).unwrap();
        let off = Layout::open(&img).unwrap().inode_off(0);
        img.slice_mut(off, INODE_SZ).fill(0);
        assert!(matches!(Wfs::mount(img), Err(FsError::CorruptHeader)));
    }

    #[test]
    fn mismatched_root_number_fails_mount() {
        let mut img = mkfs(8, 8).unwrap();
        let off = Layout::open(&img).unwrap().inode_off(0);
        // num is the record's leading little-endian u32
        img.slice_mut(off, 1)[0] = 3;
        assert!(matches!(Wfs::mount(img), Err(FsError::CorruptHeader)));
    }
}
