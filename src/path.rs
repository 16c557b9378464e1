use crate::error::{FsError, Result};
use crate::fs::Inner;
use crate::inode::{Inode, ROOT_INO};

impl Inner {
    /// Walk `path` from the root, one dentry lookup per non-empty
    /// component. An empty path or "/" is the root itself. Descending
    /// through a regular file fails `NotADirectory`; a missing component
    /// fails `NotFound`.
    pub fn resolve(&self, path: &str) -> Result<Inode> {
        let mut curr = self.inode(ROOT_INO);
        for comp in path.split('/').filter(|c| !c.is_empty()) {
            if !curr.is_dir() {
                return Err(FsError::NotADirectory);
            }
            let (_, dentry) = self.dir_find(&curr, comp).ok_or(FsError::NotFound)?;
            curr = self.inode(dentry.num);
        }
        Ok(curr)
    }

    /// Resolve everything but the last component. Returns the parent
    /// directory inode and the final name, for create/remove paths that
    /// operate on the parent's dentry table. Fails on the root path,
    /// which has no parent entry.
    pub fn resolve_parent<'p>(&self, path: &'p str) -> Result<(Inode, &'p str)> {
        let trimmed = path.trim_end_matches('/');
        let (dir_part, name) = match trimmed.rfind('/') {
            Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
            None => ("", trimmed),
        };
        if name.is_empty() {
            // "" or "/": the root cannot be created or removed.
            return Err(FsError::NotFound);
        }
        let parent = self.resolve(dir_part)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok((parent, name))
    }
}
