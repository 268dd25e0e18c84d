//! Read-only storage layer for repository files.
//!
//! Repositories are produced by an external build tool and never modified
//! here, so the storage facade only exposes the read side:
//!
//! - **Storage trait**: named-file access relative to a root directory
//! - **StorageInput**: sequential readers, used by forward-only cursors
//! - **MappedFile**: memory-mapped files for random-access tables
//! - **StructReader / StructWriter**: little-endian records with varints
//!   and a trailing CRC-32
//!
//! # Example
//!
//! ```no_run
//! use quiver::storage::{FileStorage, Storage};
//!
//! # fn main() -> quiver::error::Result<()> {
//! let storage = FileStorage::open("/data/robust04/collection")?;
//! let docno = storage.open_mapped("docno")?;
//! println!("{} bytes of document metadata", docno.len());
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};

use thiserror::Error;

use crate::error::{QuiverError, Result};

pub mod file;
pub mod mmap;
pub mod structured;

pub use file::{FileInput, FileOutput, FileStorage};
pub use mmap::MappedFile;
pub use structured::{StructReader, StructWriter};

/// A read-only view of a directory of named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for sequential reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Map a file into memory for random access.
    fn open_mapped(&self, name: &str) -> Result<MappedFile>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;

    /// Close the input stream.
    fn close(&mut self) -> Result<()>;
}

/// A trait for writing data to storage.
///
/// Only the fixture writer in [`crate::testing`] produces files.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Close the output stream.
    fn close(&mut self) -> Result<()>;
}

impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Error types specific to storage operations.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A record lies outside the file it is read from.
    #[error("Read past end of {name}: offset {offset}, length {length}, size {size}")]
    OutOfBounds {
        name: String,
        offset: u64,
        length: u64,
        size: u64,
    },
}

impl From<StorageError> for QuiverError {
    fn from(err: StorageError) -> Self {
        QuiverError::storage(err.to_string())
    }
}
