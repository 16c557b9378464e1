use crate::image::Image;

/// One allocation bitmap: a byte range of the image, one bit per index.
/// Index `k` lives in byte `k / 8` at mask `0x80 >> (k % 8)`, so a scan
/// that walks bytes in order and bits from the high end returns the
/// lowest free index. Set bit means allocated.
///
/// Two instances exist per mount, one over inode numbers and one over
/// data-block indices. The struct itself is only the region geometry;
/// the bits live in the image.
#[derive(Debug, Clone)]
pub struct Bitmap {
    off: u64,
    bits: u64,
}

impl Bitmap {
    pub fn new(off: u64, bits: u64) -> Self {
        assert!(bits % 8 == 0, "bitmap must cover whole bytes");
        Self { off, bits }
    }

    fn byte_len(&self) -> usize {
        (self.bits / 8) as usize
    }

    /// Lowest free index, byte-major then bit-major. No side effects;
    /// `None` means the region is exhausted and the caller reports
    /// `OutOfSpace`.
    pub fn find_free(&self, img: &Image) -> Option<u64> {
        let bytes = img.slice(self.off, self.byte_len());
        for (i, &b) in bytes.iter().enumerate() {
            if b == 0xff {
                continue;
            }
            for j in 0..8 {
                if b & (0x80 >> j) == 0 {
                    return Some((i * 8 + j) as u64);
                }
            }
        }
        None
    }

    /// Mark `index` allocated. Claiming a set bit is a bug in the caller,
    /// never a user-facing condition.
    pub fn claim(&self, img: &mut Image, index: u64) {
        assert!(index < self.bits, "bitmap index {index} out of range");
        let byte = &mut img.slice_mut(self.off + index / 8, 1)[0];
        let mask = 0x80 >> (index % 8);
        assert!(*byte & mask == 0, "double claim of index {index}");
        *byte |= mask;
    }

    /// Mark `index` free again.
    pub fn release(&self, img: &mut Image, index: u64) {
        assert!(index < self.bits, "bitmap index {index} out of range");
        let byte = &mut img.slice_mut(self.off + index / 8, 1)[0];
        let mask = 0x80 >> (index % 8);
        assert!(*byte & mask != 0, "release of free index {index}");
        *byte &= !mask;
    }

    pub fn is_set(&self, img: &Image, index: u64) -> bool {
        assert!(index < self.bits, "bitmap index {index} out of range");
        img.slice(self.off + index / 8, 1)[0] & (0x80 >> (index % 8)) != 0
    }

    /// Population count, used by consistency checks and tests.
    pub fn count_set(&self, img: &Image) -> u64 {
        img.slice(self.off, self.byte_len())
            .iter()
            .map(|b| b.count_ones() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(bits: u64) -> (Bitmap, Image) {
        (Bitmap::new(0, bits), Image::from_vec(vec![0u8; (bits / 8) as usize]))
    }

    #[test]
    fn scan_is_lowest_first() {
        let (bm, mut img) = setup(16);
        assert_eq!(bm.find_free(&img), Some(0));
        bm.claim(&mut img, 0);
        assert_eq!(bm.find_free(&img), Some(1));
        bm.claim(&mut img, 1);
        bm.claim(&mut img, 2);
        assert_eq!(bm.find_free(&img), Some(3));
    }

    #[test]
    fn released_index_wins_again() {
        let (bm, mut img) = setup(16);
        for i in 0..8 {
            bm.claim(&mut img, i);
        }
        assert_eq!(bm.find_free(&img), Some(8));
        bm.release(&mut img, 3);
        assert_eq!(bm.find_free(&img), Some(3));
    }

    #[test]
    fn bit_convention_is_msb_first() {
        // Index 0 must land in the high bit of byte 0.
        let (bm, mut img) = setup(16);
        bm.claim(&mut img, 0);
        assert_eq!(img.slice(0, 1)[0], 0b1000_0000);
        bm.claim(&mut img, 9);
        assert_eq!(img.slice(1, 1)[0], 0b0100_0000);
        assert!(bm.is_set(&img, 9));
        assert!(!bm.is_set(&img, 8));
    }

    #[test]
    fn exhaustion_returns_none() {
        let (bm, mut img) = setup(8);
        for i in 0..8 {
            bm.claim(&mut img, i);
        }
        assert_eq!(bm.find_free(&img), None);
        assert_eq!(bm.count_set(&img), 8);
    }

    #[test]
    #[should_panic(expected = "double claim")]
    fn double_claim_is_a_bug() {
        let (bm, mut img) = setup(8);
        bm.claim(&mut img, 4);
        bm.claim(&mut img, 4);
    }
}
