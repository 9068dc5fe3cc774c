use super::helpers::*;
use crate::*;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

// --------------------- Create ---------------------

#[test]
fn fresh_heap_has_valid_header() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    let heap = Heap::<CounterRoot>::open(&path).unwrap();
    let h = heap.header();
    assert_eq!(h.magic, HEAP_MAGIC);
    assert_eq!(h.version, HEAP_VERSION);
    assert_eq!(h.reserved, 0);
    // 16 header + 4 root, rounded to a word
    assert_eq!(h.size, 24);
    assert_eq!(heap.size(), 24);
    assert_eq!(heap.capacity(), G);
    assert_eq!(heap.granule_count(), 1);
    assert_eq!(heap.root(), &CounterRoot::default());
    drop(heap);

    assert_eq!(file_len(&path), G);
}

#[test]
fn header_bytes_on_disk_are_little_endian() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    drop(Heap::<CounterRoot>::open(&path).unwrap());

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], &HEAP_MAGIC.to_le_bytes());
    assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    assert_eq!(&bytes[8..12], &24u32.to_le_bytes());
    assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
}

#[test]
fn root_larger_than_a_granule() {
    #[derive(Clone, Copy)]
    #[repr(C)]
    struct Big {
        blob: [u64; 20_000],
    }
    unsafe impl Plain for Big {}

    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    let mut heap = Heap::<Big>::open(&path).unwrap();
    assert_eq!(heap.capacity(), 2 * G);
    heap.root_mut().blob[19_999] = 42;
    assert_eq!(heap.root().blob[19_999], 42);
}

// --------------------- Reopen ---------------------

#[test]
fn reopen_preserves_header_and_root() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    let before = {
        let mut heap = Heap::<CounterRoot>::open(&path).unwrap();
        heap.root_mut().counter = 7;
        heap.header()
    };

    let heap = Heap::<CounterRoot>::open(&path).unwrap();
    assert_eq!(heap.header(), before);
    assert_eq!(heap.root().counter, 7);
}

#[test]
fn reopen_preserves_reserved_field() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    drop(Heap::<CounterRoot>::open(&path).unwrap());

    let mut bytes = fs::read(&path).unwrap();
    bytes[12..16].copy_from_slice(&0xCAFE_F00Du32.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    {
        let mut heap = Heap::<CounterRoot>::open(&path).unwrap();
        assert_eq!(heap.header().reserved, 0xCAFE_F00D);
        heap.alloc::<u64>().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[12..16], &0xCAFE_F00Du32.to_le_bytes());
}

#[test]
fn unaligned_file_is_rounded_up_to_granule() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    write_raw_heap(&path, Header::new(24), 84);
    assert_eq!(file_len(&path), 100);

    let heap = Heap::<CounterRoot>::open(&path).unwrap();
    assert_eq!(heap.size(), 24);
    assert_eq!(heap.capacity(), G);
    drop(heap);
    assert_eq!(file_len(&path), G);
}

// --------------------- Validation ---------------------

#[test]
fn bad_magic_is_rejected_without_touching_the_file() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    let mut header = Header::new(24);
    header.magic = 0x1234_5678;
    write_raw_heap(&path, header, 84);
    let before = fs::read(&path).unwrap();

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::BadMagic { found: 0x1234_5678 }));

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn corrupted_magic_in_existing_heap() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    {
        let mut heap = Heap::<CounterRoot>::open(&path).unwrap();
        heap.alloc::<Node>().unwrap();
    }

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::BadMagic { .. }));
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn unknown_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    let mut header = Header::new(24);
    header.version = 3;
    write_raw_heap(&path, header, 8);

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::UnsupportedVersion { found: 3 }));
    assert_eq!(file_len(&path), 24);
}

#[test]
fn file_shorter_than_header_and_root_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    fs::write(&path, [0xAAu8; 10]).unwrap();

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::CorruptHeader { .. }));
    assert_eq!(file_len(&path), 10);
}

#[test]
fn file_holding_header_but_not_root_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    // valid header, root of 4 bytes missing its last byte
    write_raw_heap(&path, Header::new(24), 3);

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::CorruptHeader { .. }));
}

#[test]
fn size_past_end_of_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    write_raw_heap(&path, Header::new(4096), 84);

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::CorruptHeader { .. }));
}

#[test]
fn size_below_core_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    write_raw_heap(&path, Header::new(16), 84);

    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::CorruptHeader { .. }));
}

#[test]
fn over_aligned_root_is_rejected() {
    #[derive(Clone, Copy)]
    #[repr(C, align(16))]
    struct Wide {
        x: u64,
    }
    unsafe impl Plain for Wide {}

    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    let err = Heap::<Wide>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::Misaligned { align: 16, .. }));
    assert!(!path.exists());
}

#[test]
fn directory_path_fails_to_open() {
    let dir = tempdir().unwrap();
    let err = Heap::<CounterRoot>::open(dir.path()).unwrap_err();
    assert!(matches!(err, HeapError::Open { .. }));
}

// --------------------- Locking ---------------------

#[test]
fn second_open_fails_while_locked() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    let first = Heap::<CounterRoot>::open(&path).unwrap();
    let err = Heap::<CounterRoot>::open(&path).unwrap_err();
    assert!(matches!(err, HeapError::Locked { .. }));

    drop(first);
    assert!(Heap::<CounterRoot>::open(&path).is_ok());
}

#[test]
fn failed_open_releases_the_lock() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);

    let mut header = Header::new(24);
    header.magic = 0;
    write_raw_heap(&path, header, 8);
    assert!(Heap::<CounterRoot>::open(&path).is_err());

    // Repair the file; the failed attempt must not have left a lock behind.
    write_raw_heap(&path, Header::new(24), 8);
    assert!(Heap::<CounterRoot>::open(&path).is_ok());
}

#[test]
fn wait_mode_opens_an_unlocked_file() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    let cfg = no_sync().with_lock(LockMode::Wait);

    let heap = Heap::<CounterRoot>::open_with(&path, &cfg).unwrap();
    assert_eq!(heap.size(), 24);
}

#[test]
fn wait_mode_blocks_until_the_holder_closes() {
    let dir = tempdir().unwrap();
    let path = heap_path(&dir);
    let cfg = no_sync().with_lock(LockMode::Wait);

    let holder = Heap::<CounterRoot>::open_with(&path, &no_sync()).unwrap();

    let waiter = {
        let path = path.clone();
        thread::spawn(move || {
            let heap = Heap::<CounterRoot>::open_with(&path, &cfg).unwrap();
            (Instant::now(), heap.size())
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(!waiter.is_finished());

    let released = Instant::now();
    drop(holder);

    let (acquired, size) = waiter.join().unwrap();
    assert!(acquired >= released);
    assert_eq!(size, 24);
}

#[test]
fn debug_output_mentions_size_and_capacity() {
    let dir = tempdir().unwrap();
    let heap = Heap::<CounterRoot>::open(heap_path(&dir)).unwrap();
    let s = format!("{:?}", heap);
    assert!(s.contains("size: 24"));
    assert!(s.contains("capacity: 131072"));
}
