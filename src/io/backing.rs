//! Growable byte stores behind the arena and offset index.
//!
//! Both files grow by appending canary-filled chunks, so anything past the last
//! committed write reads back as `0xFF`. The persistent variant remaps its file after
//! every growth; the heap variant just extends its buffer.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use memmap2::MmapMut;
use once_cell::sync::Lazy;

use crate::constants::{CANARY_BYTE, DEFAULT_GROWTH_CHUNK_BYTES};
use crate::error::{DictError, Result};

/// Shared fill template for growth chunks. Never mutated after init.
static CANARY_BUFFER: Lazy<Box<[u8]>> =
    Lazy::new(|| vec![CANARY_BYTE; DEFAULT_GROWTH_CHUNK_BYTES].into_boxed_slice());

/// Capability interface over the two storage variants.
///
/// Callers only see bounded slices; growth and sync are explicit.
pub(crate) trait Backing: Send + Sync {
    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    /// Append `chunk` canary bytes and make them addressable.
    fn grow(&mut self, chunk: usize) -> Result<()>;

    /// Flush dirty pages and fsync. No-op for heap buffers.
    fn sync(&self) -> Result<()>;

    fn len(&self) -> usize {
        self.bytes().len()
    }
}

/// A shared read/write mapping over one dictionary file.
pub(crate) struct MappedFile {
    map: Option<MmapMut>,
    file: File,
    path: PathBuf,
}

impl MappedFile {
    /// Open (or create) `path`, taking an exclusive advisory lock.
    ///
    /// With `recover` the existing bytes are kept; otherwise the file is truncated.
    pub(crate) fn open(path: &Path, recover: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(!recover)
            .open(path)
            .map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    tracing::error!(dict.path = %path.display(), "dictionary path does not exist");
                    DictError::PayloadUnavailable {
                        path: path.to_path_buf(),
                    }
                } else {
                    DictError::Io(err)
                }
            })?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(DictError::Locked {
                    path: path.to_path_buf(),
                });
            }
            return Err(err.into());
        }

        let mut mapped = Self {
            map: None,
            file,
            path: path.to_path_buf(),
        };
        if mapped.file.metadata()?.len() > 0 {
            mapped.remap()?;
        }
        Ok(mapped)
    }

    #[must_use]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn remap(&mut self) -> Result<()> {
        // Drop the old view first so the new mapping covers the grown file.
        self.map = None;
        // Safety: the file is exclusively locked by this handle and only mutated
        // through this mapping while the engine holds its write lock.
        let map = unsafe { MmapMut::map_mut(&self.file)? };
        self.map = Some(map);
        Ok(())
    }
}

impl Backing for MappedFile {
    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self.map.as_mut() {
            Some(map) => &mut map[..],
            None => &mut [],
        }
    }

    fn grow(&mut self, chunk: usize) -> Result<()> {
        self.file.seek(SeekFrom::End(0))?;
        write_canary(&mut self.file, chunk)?;
        tracing::debug!(
            dict.path = %self.path.display(),
            dict.grow_bytes = chunk,
            dict.file_len = self.len() + chunk,
            "dictionary file grown"
        );
        self.remap()
    }

    fn sync(&self) -> Result<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        self.file.sync_all()?;
        Ok(())
    }
}

/// In-memory variant for ephemeral dictionaries.
#[derive(Default)]
pub(crate) struct HeapBuffer {
    buf: Vec<u8>,
}

impl Backing for HeapBuffer {
    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn grow(&mut self, chunk: usize) -> Result<()> {
        self.buf.reserve_exact(chunk);
        write_canary(&mut self.buf, chunk)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

fn write_canary<W: Write>(out: &mut W, mut remaining: usize) -> Result<()> {
    while remaining > 0 {
        let step = remaining.min(CANARY_BUFFER.len());
        out.write_all(&CANARY_BUFFER[..step])?;
        remaining -= step;
    }
    Ok(())
}
