//! A persistent singly linked list of text notes living inside a heap.
//!
//! ```text
//! root (NotesRoot)          note (Note + text bytes)
//! ┌──────────────┐          ┌────────────┬─────────┐
//! │ head ────────┼─────────►│ next ──────┼──► ...  │
//! │ count        │          │ len        │ text... │
//! │ total_bytes  │          └────────────┴─────────┘
//! └──────────────┘
//! ```
//!
//! New notes are pushed at the front, so listing walks newest to oldest.

use anyhow::{bail, Result};
use heap::{Heap, Offset, Plain};
use std::mem::size_of;

/// Longest note accepted by [`add_note`].
pub const MAX_NOTE_BYTES: usize = 64 * 1024;

const NOTE_HEADER_BYTES: u32 = size_of::<Note>() as u32;

#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct NotesRoot {
    pub head: Offset<Note>,
    pub count: u32,
    pub total_bytes: u64,
}

unsafe impl Plain for NotesRoot {}

/// Fixed part of a note; `len` text bytes follow it directly.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Note {
    pub next: Offset<Note>,
    pub len: u32,
}

unsafe impl Plain for Note {}

pub type NoteHeap = Heap<NotesRoot>;

/// Stores `text` as a new note at the front of the list.
pub fn add_note(heap: &mut NoteHeap, text: &str) -> Result<Offset<Note>> {
    if text.is_empty() {
        bail!("note is empty");
    }
    if text.len() > MAX_NOTE_BYTES {
        bail!(
            "note is {} bytes, maximum is {}",
            text.len(),
            MAX_NOTE_BYTES
        );
    }

    let head = heap.root().head;
    let at = heap.alloc_extra::<Note>(text.len())?;
    *heap.get_mut(at)? = Note {
        next: head,
        len: text.len() as u32,
    };
    heap.bytes_mut(at.get() + NOTE_HEADER_BYTES, text.len())?
        .copy_from_slice(text.as_bytes());

    let root = heap.root_mut();
    root.head = at;
    root.count += 1;
    root.total_bytes += text.len() as u64;
    Ok(at)
}

/// Reads the text of the note at `at`. Invalid UTF-8 is replaced lossily.
pub fn read_note(heap: &NoteHeap, at: Offset<Note>) -> Result<String> {
    let note = *heap.get(at)?;
    let text = heap.bytes(at.get() + NOTE_HEADER_BYTES, note.len as usize)?;
    Ok(String::from_utf8_lossy(text).into_owned())
}

/// All notes, newest first.
///
/// Fails if the chain is longer than the root's `count`, which can only
/// happen if the file was tampered with (e.g. a cycle).
pub fn list_notes(heap: &NoteHeap) -> Result<Vec<(Offset<Note>, String)>> {
    let expected = heap.root().count as usize;
    let mut out = Vec::with_capacity(expected);
    let mut cur = heap.root().head;
    while !cur.is_null() {
        if out.len() == expected {
            bail!("note chain is longer than the recorded count {}", expected);
        }
        out.push((cur, read_note(heap, cur)?));
        cur = heap.get(cur)?.next;
    }
    Ok(out)
}
