use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyWrite, Request, TimeOrNow,
};
use log::{debug, warn};

use crate::common::BLOCK_SZ;
use crate::fs::Wfs;
use crate::ops::{Attr, FsOps};

const TTL: Duration = Duration::from_secs(1);

fn timestamp(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn file_attr(attr: &Attr, nlink: u32) -> FileAttr {
    let kind = if attr.is_dir() {
        FileType::Directory
    } else {
        FileType::RegularFile
    };
    FileAttr {
        // The kernel reserves ino 0 and calls the root 1, so inode
        // numbers shift up by one at this boundary.
        ino: attr.num as u64 + 1,
        size: attr.size,
        blocks: attr.size.div_ceil(BLOCK_SZ as u64),
        atime: timestamp(attr.atim),
        mtime: timestamp(attr.mtim),
        ctime: timestamp(attr.ctim),
        crtime: timestamp(attr.ctim),
        kind,
        perm: (attr.mode & 0o7777) as u16,
        nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SZ as u32,
        flags: 0,
    }
}

/// Host-bridge adapter: translates the kernel's ino-based callbacks into
/// the path-based [`FsOps`] surface. Paths are remembered per ino as the
/// kernel looks entries up; the kernel always issues a lookup before it
/// addresses an ino directly.
pub struct WfsFuse {
    fs: Wfs,
    backing: PathBuf,
    paths: HashMap<u64, String>,
}

impl WfsFuse {
    pub fn new(fs: Wfs, backing: PathBuf) -> Self {
        let mut paths = HashMap::new();
        paths.insert(fuser::FUSE_ROOT_ID, "/".to_string());
        Self { fs, backing, paths }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    /// Attributes as the kernel expects them. Directories report the
    /// POSIX link count, the self entry plus one ".." per child
    /// directory, so `st_nlink` traversal heuristics stay honest.
    fn kernel_attr(&self, path: &str, attr: &Attr) -> FileAttr {
        let nlink = if attr.is_dir() {
            let subdirs = self
                .fs
                .readdir(path)
                .map(|entries| entries.iter().filter(|e| e.is_dir).count() as u32)
                .unwrap_or(0);
            2 + subdirs
        } else {
            attr.nlinks.max(1)
        };
        file_attr(attr, nlink)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent = self.path_of(parent)?;
        let name = name.to_str()?;
        Some(if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        })
    }

    fn remember(&mut self, path: &str, attr: &Attr) {
        self.paths.insert(attr.num as u64 + 1, path.to_string());
    }

    fn forget_path(&mut self, path: &str) {
        self.paths.retain(|_, p| p != path);
    }

    fn flush_image(&self) -> bool {
        match self.fs.save(&self.backing) {
            Ok(()) => true,
            Err(e) => {
                warn!("image write-back failed: {e}");
                false
            }
        }
    }
}

impl Filesystem for WfsFuse {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(&path) {
            Ok(attr) => {
                self.remember(&path, &attr);
                reply.entry(&TTL, &self.kernel_attr(&path, &attr), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &self.kernel_attr(&path, &attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // Truncation and chmod/chown are not part of the engine; report
        // the current attributes so utilities like touch keep working.
        if let Some(size) = size {
            debug!("setattr ino {ino}: ignoring size change to {size}");
        }
        self.getattr(_req, ino, reply);
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if mode & libc::S_IFMT != libc::S_IFREG && mode & libc::S_IFMT != 0 {
            reply.error(libc::EPERM);
            return;
        }
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let result = self
            .fs
            .create(&path, mode & 0o7777)
            .and_then(|()| self.fs.getattr(&path));
        match result {
            Ok(attr) => {
                self.remember(&path, &attr);
                reply.entry(&TTL, &self.kernel_attr(&path, &attr), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let result = self
            .fs
            .mkdir(&path, mode & 0o7777)
            .and_then(|()| self.fs.getattr(&path));
        match result {
            Ok(attr) => {
                self.remember(&path, &attr);
                reply.entry(&TTL, &self.kernel_attr(&path, &attr), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.read(&path, offset.max(0) as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.write(&path, offset.max(0) as u64, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match self.fs.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        let mut rows: Vec<(u64, FileType, String)> =
            vec![(ino, FileType::Directory, ".".into()), (ino, FileType::Directory, "..".into())];
        rows.extend(entries.into_iter().map(|e| {
            let kind = if e.is_dir { FileType::Directory } else { FileType::RegularFile };
            (e.num as u64 + 1, kind, e.name)
        }));
        for (i, (entry_ino, kind, name)) in rows.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        if self.flush_image() {
            reply.ok();
        } else {
            reply.error(libc::EIO);
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        if self.flush_image() {
            reply.ok();
        } else {
            reply.error(libc::EIO);
        }
    }

    fn destroy(&mut self) {
        let _ = self.flush_image();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mkfs::mkfs;

    #[test]
    fn directory_link_counts_follow_posix_convention() {
        let fs = Wfs::mount(mkfs(16, 32).unwrap()).unwrap();
        fs.mkdir("/a", 0o755).unwrap();
        fs.mkdir("/a/b", 0o755).unwrap();
        fs.create("/a/f", 0o644).unwrap();
        let bridge = WfsFuse::new(fs, PathBuf::from("unused.img"));

        let root = bridge.fs.getattr("/").unwrap();
        assert_eq!(bridge.kernel_attr("/", &root).nlink, 3);

        // "/a" holds one subdirectory and one file; only the former
        // contributes a "..".
        let a = bridge.fs.getattr("/a").unwrap();
        assert_eq!(bridge.kernel_attr("/a", &a).nlink, 3);

        let b = bridge.fs.getattr("/a/b").unwrap();
        assert_eq!(bridge.kernel_attr("/a/b", &b).nlink, 2);

        let f = bridge.fs.getattr("/a/f").unwrap();
        assert_eq!(bridge.kernel_attr("/a/f", &f).nlink, 1);
    }
}
