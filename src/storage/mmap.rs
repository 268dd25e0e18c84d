//! Memory-mapped files for random-access tables.
//!
//! Offset tables (document metadata, term lists, postings directories) are
//! read by position, so they are mapped instead of streamed. A mapping is
//! cheap to clone and is released when the last clone drops.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::{Mmap, MmapOptions};

use crate::error::{QuiverError, Result};
use crate::storage::StorageError;

/// A read-only memory map of one repository file.
#[derive(Debug, Clone)]
pub struct MappedFile {
    name: String,
    mmap: Arc<Mmap>,
}

impl MappedFile {
    /// Map `path`, naming it `name` in error messages.
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::FileNotFound(name.to_string())
            } else {
                StorageError::IoError(format!("Failed to open file {name}: {e}"))
            }
        })?;

        // SAFETY: repositories are immutable once built; nothing in this crate
        // writes to a mapped file and the build tool never rewrites in place.
        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| StorageError::IoError(format!("Failed to mmap file {name}: {e}")))?
        };

        Ok(MappedFile {
            name: name.to_string(),
            mmap: Arc::new(mmap),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// The whole mapping.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Bounds-checked sub-slice.
    pub fn slice(&self, offset: u64, length: u64) -> Result<&[u8]> {
        let size = self.mmap.len() as u64;
        match offset.checked_add(length) {
            Some(end) if end <= size => Ok(&self.mmap[offset as usize..end as usize]),
            _ => Err(StorageError::OutOfBounds {
                name: self.name.clone(),
                offset,
                length,
                size,
            }
            .into()),
        }
    }

    pub fn read_u32_at(&self, offset: u64) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.slice(offset, 4)?))
    }

    pub fn read_u64_at(&self, offset: u64) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.slice(offset, 8)?))
    }

    /// Check the 4-byte magic and the format version at the start of the file.
    ///
    /// Returns the offset of the first byte after the header.
    pub fn check_header(&self, magic: u32, version: u32) -> Result<u64> {
        let found = self.read_u32_at(0)?;
        if found != magic {
            return Err(QuiverError::corrupt(format!(
                "{}: bad magic number {found:#010x}, expected {magic:#010x}",
                self.name
            )));
        }

        let found = self.read_u32_at(4)?;
        if found != version {
            return Err(QuiverError::corrupt(format!(
                "{}: unsupported format version {found}",
                self.name
            )));
        }

        Ok(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_slice_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_file(&temp_dir, "table", &[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let mapped = MappedFile::open("table", &path).unwrap();
        assert_eq!(mapped.len(), 9);
        assert_eq!(mapped.slice(2, 3).unwrap(), &[3, 4, 5]);
        assert_eq!(mapped.read_u64_at(0).unwrap(), 0x0807060504030201);

        let err = mapped.slice(8, 4).unwrap_err();
        assert!(matches!(err, QuiverError::Storage(_)));
        assert!(mapped.slice(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_check_header() {
        let temp_dir = TempDir::new().unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x5449_5551u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        let path = write_file(&temp_dir, "header", &bytes);

        let mapped = MappedFile::open("header", &path).unwrap();
        assert_eq!(mapped.check_header(0x5449_5551, 1).unwrap(), 8);
        assert!(matches!(
            mapped.check_header(0x5449_5551, 2),
            Err(QuiverError::Corrupt(_))
        ));
        assert!(matches!(
            mapped.check_header(0xdead_beef, 1),
            Err(QuiverError::Corrupt(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = MappedFile::open("gone", &temp_dir.path().join("gone")).unwrap_err();
        assert!(err.to_string().contains("File not found: gone"));
    }
}
