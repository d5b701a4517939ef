//! Bundle file reading.
//!
//! Full ATT&CK bundles run to tens of megabytes, so large files are
//! memory-mapped and parsed in place instead of being copied into memory.

use crate::error::{Result, StixError};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Files larger than this are memory-mapped (zero-copy).
const MMAP_THRESHOLD: u64 = 8 * 1024 * 1024; // 8 MB

/// File contents, either memory-mapped or owned.
pub enum FileData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl FileData {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            FileData::Mapped(mmap) => mmap,
            FileData::Owned(vec) => vec,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for FileData {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Read a file, memory-mapping it when it is larger than [`MMAP_THRESHOLD`].
pub fn read_file_smart(path: &Path) -> Result<FileData> {
    let metadata = std::fs::metadata(path).map_err(|e| StixError::io(path, e))?;
    let file_size = metadata.len();

    if file_size > MMAP_THRESHOLD {
        let file = File::open(path).map_err(|e| StixError::io(path, e))?;
        // SAFETY: bundles are read-only inputs; nothing in this process writes to them.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| StixError::io(path, e))?;
        tracing::debug!(
            "Memory-mapped bundle ({:.2} MB): {}",
            file_size as f64 / 1024.0 / 1024.0,
            path.display()
        );
        Ok(FileData::Mapped(mmap))
    } else {
        let data = std::fs::read(path).map_err(|e| StixError::io(path, e))?;
        Ok(FileData::Owned(data))
    }
}
