use log::debug;

use crate::common::{unix_now, DENTRY_SZ, NAME_SZ};
use crate::dir::Dentry;
use crate::error::{FsError, Result};
use crate::fs::{Inner, Wfs};
use crate::inode::Inode;

/// Attribute snapshot handed across the operation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub num: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub nlinks: u32,
    pub atim: i64,
    pub mtim: i64,
    pub ctim: i64,
}

impl Attr {
    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }
}

impl From<&Inode> for Attr {
    fn from(ino: &Inode) -> Self {
        Attr {
            num: ino.num,
            mode: ino.mode,
            uid: ino.uid,
            gid: ino.gid,
            size: ino.size,
            nlinks: ino.nlinks,
            atim: ino.atim,
            mtim: ino.mtim,
            ctim: ino.ctim,
        }
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub num: u32,
    pub is_dir: bool,
}

/// The operations the host bridge forwards into the engine. Path-based,
/// synchronous, and fully typed; errno translation happens on the bridge
/// side via [`FsError::errno`]. `Wfs` is the in-tree implementation; the
/// trait keeps the core testable without a live bridge.
pub trait FsOps: Send + Sync {
    fn getattr(&self, path: &str) -> Result<Attr>;
    fn create(&self, path: &str, mode: u32) -> Result<()>;
    fn mkdir(&self, path: &str, mode: u32) -> Result<()>;
    fn read(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;
    fn write(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize>;
    fn readdir(&self, path: &str) -> Result<Vec<DirEntry>>;
    fn unlink(&self, path: &str) -> Result<()>;
    fn rmdir(&self, path: &str) -> Result<()>;
}

impl Inner {
    /// Shared create path: absent -> allocated. A directory block grown
    /// along the way is kept even when inode allocation then fails; the
    /// bitmaps stay consistent and no dentry is linked.
    fn create_entry(&mut self, path: &str, mode: u32, dir: bool) -> Result<()> {
        if self.resolve(path).is_ok() {
            return Err(FsError::AlreadyExists);
        }
        let (mut parent, name) = self.resolve_parent(path)?;
        if name.len() > NAME_SZ {
            // Checked before any allocation happens.
            return Err(FsError::NameTooLong);
        }

        let slot = self.dir_find_or_grow(&mut parent)?;
        let num = self.alloc_inode_num()?;

        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        let kind = if dir { libc::S_IFDIR } else { libc::S_IFREG };
        // Directory nlinks count child dentries, so a fresh one is 0;
        // regular files carry a constant 1 (no hard links).
        let nlinks = if dir { 0 } else { 1 };
        let inode = Inode::new(num, kind | (mode & 0o7777), uid, gid, nlinks);
        self.put_inode(&inode);

        let dentry = Dentry::new(name, num)?;
        self.img.write_record(slot, DENTRY_SZ, &dentry);

        parent.nlinks += 1;
        let now = unix_now();
        parent.mtim = now;
        parent.ctim = now;
        self.put_inode(&parent);
        Ok(())
    }

    /// Shared removal path: allocated -> removed. Frees the target's data
    /// blocks and inode bit, then clears the owning dentry.
    fn remove_entry(&mut self, path: &str, want_dir: bool) -> Result<()> {
        let (mut parent, name) = self.resolve_parent(path)?;
        let (slot, dentry) = self.dir_find(&parent, name).ok_or(FsError::NotFound)?;
        let mut target = self.inode(dentry.num);
        match (want_dir, target.is_dir()) {
            (false, true) => return Err(FsError::IsDirectory),
            (true, false) => return Err(FsError::NotADirectory),
            _ => {}
        }
        if want_dir && target.nlinks != 0 {
            return Err(FsError::NotEmpty);
        }

        self.release_inode_blocks(&mut target);
        self.put_inode(&target);
        self.release_inode_num(target.num);
        self.dir_clear_slot(slot);

        parent.nlinks -= 1;
        let now = unix_now();
        parent.mtim = now;
        parent.ctim = now;
        self.put_inode(&parent);
        Ok(())
    }
}

impl FsOps for Wfs {
    fn getattr(&self, path: &str) -> Result<Attr> {
        debug!("getattr {path}");
        let inner = self.lock();
        inner.resolve(path).map(|ino| Attr::from(&ino))
    }

    fn create(&self, path: &str, mode: u32) -> Result<()> {
        debug!("create {path} mode {mode:o}");
        self.lock().create_entry(path, mode, false)
    }

    fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        debug!("mkdir {path} mode {mode:o}");
        self.lock().create_entry(path, mode, true)
    }

    fn read(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        debug!("read {path} offset {offset} len {len}");
        let mut inner = self.lock();
        let mut ino = inner.resolve(path)?;
        if ino.is_dir() {
            return Err(FsError::IsDirectory);
        }
        Ok(inner.read_file(&mut ino, offset, len))
    }

    fn write(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize> {
        debug!("write {path} offset {offset} len {}", data.len());
        let mut inner = self.lock();
        let mut ino = inner.resolve(path)?;
        if ino.is_dir() {
            return Err(FsError::IsDirectory);
        }
        inner.write_file(&mut ino, offset, data)
    }

    fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        debug!("readdir {path}");
        let inner = self.lock();
        let dir = inner.resolve(path)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(inner
            .dir_entries(&dir)
            .iter()
            .map(|d| {
                let child = inner.inode(d.num);
                DirEntry {
                    name: d.name_str(),
                    num: d.num,
                    is_dir: child.is_dir(),
                }
            })
            .collect())
    }

    fn unlink(&self, path: &str) -> Result<()> {
        debug!("unlink {path}");
        self.lock().remove_entry(path, false)
    }

    fn rmdir(&self, path: &str) -> Result<()> {
        debug!("rmdir {path}");
        self.lock().remove_entry(path, true)
    }
}
