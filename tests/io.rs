//! Block I/O engine behavior: multi-block transfers, indirect
//! addressing, sparse files, and space exhaustion.

use wfs::{mkfs, FsError, FsOps, Wfs, BLOCK_SZ, MAX_FILE_BLOCKS, N_DIRECT};

fn mount(inodes: u64, blocks: u64) -> Wfs {
    Wfs::mount(mkfs(inodes, blocks).unwrap()).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 241) as u8).collect()
}

#[test]
fn roundtrip_spanning_several_direct_blocks() {
    let fs = mount(32, 64);
    fs.create("/f", 0o644).unwrap();
    let data = pattern(5 * BLOCK_SZ + 13);
    assert_eq!(fs.write("/f", 0, &data).unwrap(), data.len());
    assert_eq!(fs.getattr("/f").unwrap().size, data.len() as u64);
    assert_eq!(fs.read("/f", 0, data.len()).unwrap(), data);
}

#[test]
fn roundtrip_through_the_indirect_block() {
    let fs = mount(32, 64);
    fs.create("/big", 0o644).unwrap();
    // Five blocks past the direct slots forces indirect addressing.
    let data = pattern((N_DIRECT + 5) * BLOCK_SZ);
    assert_eq!(fs.write("/big", 0, &data).unwrap(), data.len());
    assert_eq!(fs.read("/big", 0, data.len()).unwrap(), data);

    // Unaligned read window straddling the direct/indirect boundary.
    let from = N_DIRECT * BLOCK_SZ - 100;
    let got = fs.read("/big", from as u64, 300).unwrap();
    assert_eq!(got, &data[from..from + 300]);
}

#[test]
fn file_fills_to_full_capacity() {
    let fs = mount(8, 128);
    fs.create("/max", 0o644).unwrap();
    let capacity = MAX_FILE_BLOCKS * BLOCK_SZ;
    let data = pattern(capacity + BLOCK_SZ);
    // Everything past the direct+indirect capacity is cut off.
    assert_eq!(fs.write("/max", 0, &data).unwrap(), capacity);
    assert_eq!(fs.getattr("/max").unwrap().size, capacity as u64);
    assert_eq!(fs.read("/max", 0, capacity).unwrap(), &data[..capacity]);
    // A follow-up write entirely past capacity cannot land at all.
    assert_eq!(fs.write("/max", capacity as u64, b"x"), Err(FsError::OutOfSpace));
}

#[test]
fn read_at_or_past_eof_is_empty_not_an_error() {
    let fs = mount(32, 64);
    fs.create("/f", 0o644).unwrap();
    fs.write("/f", 0, b"abc").unwrap();
    assert!(fs.read("/f", 3, 10).unwrap().is_empty());
    assert!(fs.read("/f", 1000, 1).unwrap().is_empty());
    // A window crossing EOF is clamped.
    assert_eq!(fs.read("/f", 1, 100).unwrap(), b"bc");
}

#[test]
fn sparse_write_leaves_a_zero_hole() {
    let fs = mount(32, 64);
    fs.create("/sparse", 0o644).unwrap();
    let tail = pattern(100);
    let hole = 4 * BLOCK_SZ as u64;
    assert_eq!(fs.write("/sparse", hole, &tail).unwrap(), tail.len());
    assert_eq!(fs.getattr("/sparse").unwrap().size, hole + tail.len() as u64);

    let all = fs.read("/sparse", 0, (hole as usize) + tail.len()).unwrap();
    assert!(all[..hole as usize].iter().all(|&b| b == 0));
    assert_eq!(&all[hole as usize..], &tail[..]);
}

#[test]
fn overwrite_within_a_block_keeps_surroundings() {
    let fs = mount(32, 64);
    fs.create("/f", 0o644).unwrap();
    let data = pattern(2 * BLOCK_SZ);
    fs.write("/f", 0, &data).unwrap();
    fs.write("/f", 200, b"PATCH").unwrap();

    let mut expect = data.clone();
    expect[200..205].copy_from_slice(b"PATCH");
    assert_eq!(fs.read("/f", 0, expect.len()).unwrap(), expect);
    // Overwrites never grow the file.
    assert_eq!(fs.getattr("/f").unwrap().size, expect.len() as u64);
}

#[test]
fn exhausted_data_bitmap_yields_a_short_write() {
    // 8 data blocks total: one holds the root's dentries, 7 direct blocks
    // land, and the indirect block itself no longer fits.
    let fs = mount(8, 8);
    fs.create("/f", 0o644).unwrap();
    let data = pattern(9 * BLOCK_SZ);
    assert_eq!(fs.write("/f", 0, &data).unwrap(), N_DIRECT * BLOCK_SZ);
    let committed = N_DIRECT * BLOCK_SZ;
    assert_eq!(fs.getattr("/f").unwrap().size, committed as u64);
    assert_eq!(fs.read("/f", 0, committed).unwrap(), &data[..committed]);

    // Nothing at all fits any more.
    assert_eq!(fs.write("/f", committed as u64, b"y"), Err(FsError::OutOfSpace));
}

#[test]
fn freed_blocks_are_reusable_after_unlink() {
    let fs = mount(8, 8);
    fs.create("/a", 0o644).unwrap();
    let data = pattern(7 * BLOCK_SZ);
    assert_eq!(fs.write("/a", 0, &data).unwrap(), data.len());
    fs.unlink("/a").unwrap();

    // Every released block is claimable again by the next file.
    fs.create("/b", 0o644).unwrap();
    assert_eq!(fs.write("/b", 0, &data).unwrap(), data.len());
    assert_eq!(fs.read("/b", 0, data.len()).unwrap(), data);
}

#[test]
fn io_on_directories_is_rejected() {
    let fs = mount(32, 64);
    fs.mkdir("/d", 0o755).unwrap();
    assert_eq!(fs.read("/d", 0, 10), Err(FsError::IsDirectory));
    assert_eq!(fs.write("/d", 0, b"x"), Err(FsError::IsDirectory));
    assert_eq!(fs.read("/missing", 0, 10), Err(FsError::NotFound));
    assert_eq!(fs.write("/missing", 0, b"x"), Err(FsError::NotFound));
}
