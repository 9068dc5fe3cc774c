//! # CLI - MapHeap Interactive Shell
//!
//! A REPL over a heap file whose root record anchors a linked list of text
//! notes. Reads commands from stdin and prints results to stdout; logs go to
//! stderr so the output stays scriptable.
//!
//! ## Commands
//!
//! ```text
//! ADD text          Store a note, prints its offset
//! LIST              Print every note, newest first
//! GET offset        Print the note at a raw offset
//! INFO              Print heap size, capacity and note count
//! RESERVE bytes     Grow the mapping to at least `bytes`
//! FLUSH             msync the heap to disk
//! EXIT / QUIT       Close the heap and leave
//! ```
//!
//! ## Configuration
//!
//! ```text
//! MAPHEAP_PATH           heap file path                 (default: "heap.bin")
//! MAPHEAP_LOCK           "try" or "wait"                (default: "try")
//! MAPHEAP_SYNC_ON_CLOSE  flush on exit                  (default: "true")
//! RUST_LOG               log filter                     (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! MapHeap opened (path=heap.bin, size=32, capacity=131072, notes=0)
//! > ADD buy milk
//! OK 32
//! > LIST
//! 32 buy milk
//! (1 notes)
//! > EXIT
//! bye
//! ```

mod notes;

use anyhow::Result;
use config::{env_or, HeapConfig};
use heap::Offset;
use notes::{add_note, list_notes, read_note, NoteHeap};
use std::io::{self, BufRead, Write};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let path = env_or("MAPHEAP_PATH", "heap.bin");
    let cfg = HeapConfig::from_env();
    let mut heap = NoteHeap::open_with(&path, &cfg)?;

    println!(
        "MapHeap opened (path={}, size={}, capacity={}, notes={})",
        path,
        heap.size(),
        heap.capacity(),
        heap.root().count
    );
    println!("Commands: ADD text | LIST | GET offset | INFO | RESERVE bytes | FLUSH | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };
        if !cmd.is_empty() {
            match cmd.to_uppercase().as_str() {
                "ADD" => {
                    if rest.is_empty() {
                        println!("ERR usage: ADD text");
                    } else {
                        match add_note(&mut heap, rest) {
                            Ok(at) => println!("OK {}", at),
                            Err(e) => {
                                debug!(command = "ADD", error = %e, "command failed");
                                println!("ERR add failed: {}", e)
                            }
                        }
                    }
                }
                "LIST" => match list_notes(&heap) {
                    Ok(all) => {
                        for (at, text) in &all {
                            println!("{} {}", at, text);
                        }
                        println!("({} notes)", all.len());
                    }
                    Err(e) => {
                        debug!(command = "LIST", error = %e, "command failed");
                        println!("ERR list failed: {}", e)
                    }
                },
                "GET" => match rest.parse::<u32>() {
                    Ok(raw) => match read_note(&heap, Offset::new(raw)) {
                        Ok(text) => println!("{}", text),
                        Err(e) => {
                            debug!(command = "GET", error = %e, "command failed");
                            println!("ERR read failed: {}", e)
                        }
                    },
                    Err(_) => println!("ERR usage: GET offset"),
                },
                "INFO" => {
                    let h = heap.header();
                    println!(
                        "magic={:#010x} version={} size={} capacity={} granules={} windows={} notes={} text_bytes={}",
                        h.magic,
                        h.version,
                        heap.size(),
                        heap.capacity(),
                        heap.granule_count(),
                        heap.window_count(),
                        heap.root().count,
                        heap.root().total_bytes
                    );
                }
                "RESERVE" => match rest.parse::<usize>() {
                    Ok(bytes) => match heap.reserve(bytes) {
                        Ok(()) => println!("OK capacity={}", heap.capacity()),
                        Err(e) => {
                            debug!(command = "RESERVE", error = %e, "command failed");
                            println!("ERR reserve failed: {}", e)
                        }
                    },
                    Err(_) => println!("ERR usage: RESERVE bytes"),
                },
                "FLUSH" => match heap.flush() {
                    Ok(()) => println!("OK"),
                    Err(e) => {
                        debug!(command = "FLUSH", error = %e, "command failed");
                        println!("ERR flush failed: {}", e)
                    }
                },
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    debug!(command = other, "unknown command");
                    println!("ERR unknown command")
                }
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
