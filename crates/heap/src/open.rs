//! Creating and opening heap files.

use config::{HeapConfig, LockMode};
use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::mem;
use std::path::Path;
use tracing::info;

use crate::error::HeapError;
use crate::granule::{round_up, GranuleMap, GRANULE_BYTES};
use crate::header::Header;
use crate::offset::Plain;
use crate::{core_bytes, Heap, MAX_HEAP_BYTES, ROOT_OFFSET, WORD_BYTES};

impl<R: Plain> Heap<R> {
    /// Opens (creating if absent) the heap at `path` with the default
    /// [`HeapConfig`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HeapError> {
        Self::open_with(path, &HeapConfig::default())
    }

    /// Opens (creating if absent) the heap at `path`.
    ///
    /// # Empty file
    ///
    /// The file is extended to the granule holding header + root, mapped, and
    /// stamped with a fresh header whose `size` is that core rounded up to
    /// [`WORD_BYTES`].
    ///
    /// # Existing file
    ///
    /// Validated **before anything is written**: it must hold at least
    /// header + root (`CorruptHeader`), start with the signature
    /// (`BadMagic`), carry version 0 (`UnsupportedVersion`), and record a
    /// `size` between the core and the file length (`CorruptHeader`). Only
    /// then is the file rounded up to whole granules and mapped.
    ///
    /// # Errors
    ///
    /// Any failure drops the partially built state, which releases the lock,
    /// unmaps whatever was mapped and closes the file.
    pub fn open_with<P: AsRef<Path>>(path: P, config: &HeapConfig) -> Result<Self, HeapError> {
        let path = path.as_ref().to_path_buf();

        let align = mem::align_of::<R>();
        if align > WORD_BYTES {
            return Err(HeapError::Misaligned {
                offset: ROOT_OFFSET as u32,
                align,
            });
        }
        let core = core_bytes::<R>();
        if round_up(core, GRANULE_BYTES as u64) > MAX_HEAP_BYTES {
            return Err(HeapError::Exhausted { requested: core });
        }

        let mut file = open_file(&path).map_err(|source| HeapError::Open {
            path: path.clone(),
            source,
        })?;
        lock_file(&file, config.lock).map_err(|source| HeapError::Locked {
            path: path.clone(),
            source,
        })?;

        let len = file
            .metadata()
            .map_err(|source| HeapError::Open {
                path: path.clone(),
                source,
            })?
            .len();

        let mut granules = GranuleMap::new();
        let size = if len == 0 {
            let capacity = round_up(core, GRANULE_BYTES as u64);
            file.set_len(capacity).map_err(|source| HeapError::Resize {
                size: 0,
                requested: capacity,
                source,
            })?;
            granules.map_window(&file, 0, capacity)?;

            let size = u32::try_from(round_up(core, WORD_BYTES as u64))
                .map_err(|_| HeapError::Exhausted { requested: core })?;
            let header_ptr = granules
                .locate(0, crate::HEADER_BYTES)
                .ok_or_else(|| HeapError::corrupt("header is not mapped"))?;
            // SAFETY: the window was just mapped and nothing else refers to it yet.
            let bytes = unsafe {
                std::slice::from_raw_parts_mut(header_ptr.as_ptr(), crate::HEADER_BYTES)
            };
            Header::new(size).encode_into(bytes);

            info!(path = %path.display(), size, capacity, "created heap");
            size
        } else {
            if len < core {
                return Err(HeapError::corrupt(format!(
                    "file is {len} bytes, header and root need {core}"
                )));
            }
            let header = Header::read_from(&mut file).map_err(|source| HeapError::Open {
                path: path.clone(),
                source,
            })?;
            header.validate(core, len)?;

            let capacity = round_up(len, GRANULE_BYTES as u64);
            if capacity > MAX_HEAP_BYTES {
                return Err(HeapError::Exhausted { requested: len });
            }
            if capacity != len {
                file.set_len(capacity).map_err(|source| HeapError::Resize {
                    size: len,
                    requested: capacity,
                    source,
                })?;
            }
            granules.map_window(&file, 0, capacity)?;

            info!(path = %path.display(), size = header.size, capacity, "opened heap");
            header.size
        };

        let base = granules
            .locate(0, core as usize)
            .ok_or_else(|| HeapError::corrupt("header and root are not mapped"))?;

        Ok(Self {
            granules,
            file,
            path,
            base,
            size,
            sync_on_close: config.sync_on_close,
            _root: PhantomData,
        })
    }
}

fn open_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}

fn lock_file(file: &File, mode: LockMode) -> std::io::Result<()> {
    match mode {
        LockMode::Try => fs2::FileExt::try_lock_exclusive(file),
        LockMode::Wait => fs2::FileExt::lock_exclusive(file),
    }
}
