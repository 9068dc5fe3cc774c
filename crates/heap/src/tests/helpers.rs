use crate::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const G: u64 = GRANULE_BYTES as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct CounterRoot {
    pub counter: u32,
}

unsafe impl Plain for CounterRoot {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Node {
    pub next: Offset<Node>,
    pub value: u32,
    pub weight: u64,
}

unsafe impl Plain for Node {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct ListRoot {
    pub head: Offset<Node>,
    pub len: u32,
}

unsafe impl Plain for ListRoot {}

pub fn heap_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.heap")
}

pub fn no_sync() -> HeapConfig {
    HeapConfig::default().with_sync_on_close(false)
}

pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

/// Writes a raw header followed by `root_len` zero bytes.
pub fn write_raw_heap(path: &Path, header: Header, root_len: usize) {
    let mut bytes = vec![0u8; HEADER_BYTES + root_len];
    header.encode_into(&mut bytes);
    fs::write(path, &bytes).unwrap();
}

/// Pushes `value` onto the front of the list anchored in the root.
pub fn push(heap: &mut Heap<ListRoot>, value: u32) -> Offset<Node> {
    let head = heap.root().head;
    let node = heap
        .alloc_value(Node {
            next: head,
            value,
            weight: u64::from(value) * 10,
        })
        .unwrap();
    let root = heap.root_mut();
    root.head = node;
    root.len += 1;
    node
}

/// Walks the list from the root, returning values front to back.
pub fn collect(heap: &Heap<ListRoot>) -> Vec<u32> {
    let mut out = Vec::new();
    let mut cur = heap.root().head;
    while !cur.is_null() {
        let node = heap.get(cur).unwrap();
        out.push(node.value);
        cur = node.next;
    }
    out
}
