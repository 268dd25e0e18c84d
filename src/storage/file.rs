//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::{MappedFile, Storage, StorageError, StorageInput, StorageOutput};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

fn map_open_error(name: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string())
    } else {
        StorageError::IoError(format!("{name}: {e}"))
    }
}

/// A read-only view of one directory on disk.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
}

impl FileStorage {
    /// Open an existing directory. Unlike a writable store this never creates it.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.is_dir() {
            return Err(StorageError::FileNotFound(format!(
                "{} is not a directory",
                directory.display()
            ))
            .into());
        }

        Ok(FileStorage { directory })
    }

    /// Get the full path for a file name.
    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.file_path(name)).map_err(|e| map_open_error(name, e))?;
        Ok(Box::new(FileInput::new(file, DEFAULT_BUFFER_SIZE)?))
    }

    fn open_mapped(&self, name: &str) -> Result<MappedFile> {
        MappedFile::open(name, &self.file_path(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }
}

/// A buffered file input.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl FileInput {
    fn new(file: File, buffer_size: usize) -> Result<Self> {
        let size = file
            .metadata()
            .map_err(|e| StorageError::IoError(format!("Failed to get file metadata: {e}")))?
            .len();
        let reader = BufReader::with_capacity(buffer_size, file);

        Ok(FileInput { reader, size })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn close(&mut self) -> Result<()> {
        // The descriptor is released when the reader is dropped.
        Ok(())
    }
}

/// A buffered file output, used by the fixture writer.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
}

impl FileOutput {
    /// Create (or truncate) a file, creating parent directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        Ok(FileOutput {
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file),
        })
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush_and_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuiverError;
    use tempfile::TempDir;

    #[test]
    fn test_open_requires_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let result = FileStorage::open(&missing);
        assert!(matches!(result, Err(QuiverError::Storage(_))));
        assert!(!missing.exists());
    }

    #[test]
    fn test_read_written_file() {
        let temp_dir = TempDir::new().unwrap();

        let mut output = FileOutput::create(temp_dir.path().join("data.bin")).unwrap();
        output.write_all(b"Hello, World!").unwrap();
        output.close().unwrap();

        let storage = FileStorage::open(temp_dir.path()).unwrap();
        assert!(storage.file_exists("data.bin"));
        assert!(!storage.file_exists("other.bin"));

        let mut input = storage.open_input("data.bin").unwrap();
        let mut buffer = String::new();
        input.read_to_string(&mut buffer).unwrap();
        assert_eq!(buffer, "Hello, World!");
        assert_eq!(input.size().unwrap(), 13);
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::open(temp_dir.path()).unwrap();

        let err = storage.open_input("nope").unwrap_err();
        assert!(err.to_string().contains("File not found: nope"));
    }

    #[test]
    fn test_mapped_and_sequential_reads_agree() {
        let temp_dir = TempDir::new().unwrap();

        let mut output = FileOutput::create(temp_dir.path().join("nested/data.bin")).unwrap();
        output.write_all(&[1, 2, 3, 4, 5]).unwrap();
        output.close().unwrap();

        let storage = FileStorage::open(temp_dir.path().join("nested")).unwrap();
        let mapped = storage.open_mapped("data.bin").unwrap();
        assert_eq!(mapped.bytes(), &[1, 2, 3, 4, 5]);

        let mut input = storage.open_input("data.bin").unwrap();
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, mapped.bytes());
        assert!(storage.open_mapped("absent").is_err());
    }
}
