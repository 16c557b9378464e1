use log::debug;
use serde::{Deserialize, Serialize};

use crate::common::{BLOCK_SZ, DENTRY_SZ, DIR_MAX_BLOCKS, NAME_SZ, N_DENTRY};
use crate::error::{FsError, Result};
use crate::fs::Inner;
use crate::inode::Inode;

/// Directory entry: a name-to-inode binding packed into a directory's
/// data blocks. A zero first name byte marks a free slot; the empty name
/// can therefore never name a real entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dentry {
    /// NUL-padded name bytes
    pub name: [u8; NAME_SZ],
    /// Child inode number
    pub num: u32,
}

impl Dentry {
    pub fn free() -> Self {
        Dentry { name: [0; NAME_SZ], num: 0 }
    }

    pub fn new(name: &str, num: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() {
            return Err(FsError::NotFound);
        }
        if bytes.len() > NAME_SZ {
            return Err(FsError::NameTooLong);
        }
        let mut buf = [0u8; NAME_SZ];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Dentry { name: buf, num })
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    pub fn matches(&self, name: &str) -> bool {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_SZ {
            return false;
        }
        let (head, tail) = self.name.split_at(bytes.len());
        head == bytes && tail.iter().all(|&b| b == 0)
    }

    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_SZ);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

impl Inner {
    /// Walk a directory's dentry slots in block order then slot order,
    /// yielding `(slot offset, dentry)` pairs.
    fn dentry_slots(&self, dir: &Inode) -> Vec<(u64, Dentry)> {
        debug_assert!(dir.is_dir());
        debug_assert!(dir.size % BLOCK_SZ as u64 == 0);
        let nblocks = (dir.size / BLOCK_SZ as u64) as usize;
        let mut slots = Vec::with_capacity(nblocks * N_DENTRY);
        for &block_off in dir.blocks.iter().take(nblocks.min(DIR_MAX_BLOCKS)) {
            for j in 0..N_DENTRY {
                let off = block_off + (j * DENTRY_SZ) as u64;
                slots.push((off, self.img.read_record(off, DENTRY_SZ)));
            }
        }
        slots
    }

    /// First exact, case-sensitive match for `name`. Callers never pass
    /// an empty name here; free slots are found by [`Inner::dir_free_slot`].
    pub fn dir_find(&self, dir: &Inode, name: &str) -> Option<(u64, Dentry)> {
        debug_assert!(!name.is_empty());
        self.dentry_slots(dir)
            .into_iter()
            .find(|(_, d)| !d.is_free() && d.matches(name))
    }

    fn dir_free_slot(&self, dir: &Inode) -> Option<u64> {
        self.dentry_slots(dir)
            .into_iter()
            .find(|(_, d)| d.is_free())
            .map(|(off, _)| off)
    }

    /// An existing free slot, or one from a freshly grown block.
    /// Directories are addressed through direct slots only, so growth
    /// stops at `DIR_MAX_BLOCKS`. A block grown here stays allocated even
    /// if the enclosing create later fails; the bitmaps remain consistent.
    pub fn dir_find_or_grow(&mut self, dir: &mut Inode) -> Result<u64> {
        if let Some(off) = self.dir_free_slot(dir) {
            return Ok(off);
        }
        let nblocks = (dir.size / BLOCK_SZ as u64) as usize;
        if nblocks >= DIR_MAX_BLOCKS {
            return Err(FsError::OutOfSpace);
        }
        let block_off = self.alloc_data_block()?;
        for j in 0..N_DENTRY {
            self.img
                .write_record(block_off + (j * DENTRY_SZ) as u64, DENTRY_SZ, &Dentry::free());
        }
        dir.blocks[nblocks] = block_off;
        dir.size += BLOCK_SZ as u64;
        self.put_inode(dir);
        debug!("dir {}: grew to {} blocks", dir.num, nblocks + 1);
        // A fresh block always has free slots.
        Ok(self.dir_free_slot(dir).expect("grown directory block has a free slot"))
    }

    /// Clear the slot at `off` back to free. The directory keeps its
    /// blocks; removal never compacts or shrinks.
    pub fn dir_clear_slot(&mut self, off: u64) {
        self.img.write_record(off, DENTRY_SZ, &Dentry::free());
    }

    /// All live entries in block/slot order, i.e. creation order as long
    /// as no slot has been freed and reused.
    pub fn dir_entries(&self, dir: &Inode) -> Vec<Dentry> {
        self.dentry_slots(dir)
            .into_iter()
            .filter(|(_, d)| !d.is_free())
            .map(|(_, d)| d)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_encodes_to_its_layout_constant() {
        let d = Dentry::new("file", 3).unwrap();
        assert_eq!(bincode::serialized_size(&d).unwrap() as usize, DENTRY_SZ);
        assert_eq!(bincode::serialized_size(&Dentry::free()).unwrap() as usize, DENTRY_SZ);
    }

    #[test]
    fn empty_name_is_reserved() {
        assert!(matches!(Dentry::new("", 1), Err(FsError::NotFound)));
    }

    #[test]
    fn name_must_fit_slot() {
        let long = "x".repeat(NAME_SZ + 1);
        assert!(matches!(Dentry::new(&long, 1), Err(FsError::NameTooLong)));
        let exact = "y".repeat(NAME_SZ);
        let d = Dentry::new(&exact, 1).unwrap();
        assert!(d.matches(&exact));
        assert!(!d.matches(&exact[..NAME_SZ - 1]));
    }

    #[test]
    fn matching_is_exact() {
        let d = Dentry::new("file", 3).unwrap();
        assert!(d.matches("file"));
        assert!(!d.matches("File"));
        assert!(!d.matches("fil"));
        assert!(!d.matches("file2"));
        assert_eq!(d.name_str(), "file");
        assert!(!d.is_free());
        assert!(Dentry::free().is_free());
    }
}
