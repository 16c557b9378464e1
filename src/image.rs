use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// The mapped disk image, owned for the mount's lifetime. Every on-disk
/// structure is a view into this buffer; offsets handed in here must
/// already be validated against [`crate::layout::Layout`], so a range
/// outside the buffer is an invariant violation, not a user error.
pub struct Image {
    buf: Vec<u8>,
}

impl Image {
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self { buf: fs::read(path)? })
    }

    /// Write the whole image back to its backing file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.buf)
    }

    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn slice(&self, off: u64, len: usize) -> &[u8] {
        let off = off as usize;
        assert!(
            off.checked_add(len).is_some_and(|end| end <= self.buf.len()),
            "image access out of bounds: {off}+{len} > {}",
            self.buf.len()
        );
        &self.buf[off..off + len]
    }

    pub fn slice_mut(&mut self, off: u64, len: usize) -> &mut [u8] {
        let off = off as usize;
        assert!(
            off.checked_add(len).is_some_and(|end| end <= self.buf.len()),
            "image access out of bounds: {off}+{len} > {}",
            self.buf.len()
        );
        &mut self.buf[off..off + len]
    }

    /// Decode one fixed-size record at `off`. bincode with its default
    /// options is the record codec everywhere: fixed-width little-endian
    /// integers, no padding.
    pub fn read_record<T: DeserializeOwned>(&self, off: u64, len: usize) -> T {
        bincode::deserialize(self.slice(off, len)).expect("on-disk record decode")
    }

    /// Encode one fixed-size record at `off`.
    pub fn write_record<T: Serialize>(&mut self, off: u64, len: usize, rec: &T) {
        let bytes = bincode::serialize(rec).expect("on-disk record encode");
        assert_eq!(bytes.len(), len, "record size drifted from its layout constant");
        self.slice_mut(off, len).copy_from_slice(&bytes);
    }
}
