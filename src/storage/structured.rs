//! Structured binary records.
//!
//! Sequential repository files (statistics, vocabulary) are written as a
//! stream of little-endian integers, varints and length-prefixed strings,
//! followed by a CRC-32 of everything before it.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{QuiverError, Result};
use crate::storage::{StorageInput, StorageOutput};
use crate::util::varint::{encode_u64, read_u64};

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    /// Write the 4-byte magic and format version.
    pub fn write_header(&mut self, magic: u32, version: u32) -> Result<()> {
        self.write_u32(magic)?;
        self.write_u32(version)
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.track(&[value]);
        Ok(())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.track(&value.to_le_bytes());
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.track(&value.to_le_bytes());
        Ok(())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let encoded = encode_u64(value);
        self.write_raw(&encoded)
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.write_varint(bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.track(value);
        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn track(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.position += data.len() as u64;
    }

    /// Append the checksum, flush and close.
    pub fn close(mut self) -> Result<()> {
        let checksum = self.hasher.clone().finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush_and_sync()?;
        self.writer.close()?;
        Ok(())
    }
}

/// A structured file reader for binary data.
pub struct StructReader<R: StorageInput> {
    reader: R,
    hasher: crc32fast::Hasher,
    position: u64,
    file_size: u64,
}

impl<R: StorageInput> std::fmt::Debug for StructReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructReader")
            .field("position", &self.position)
            .field("file_size", &self.file_size)
            .finish()
    }
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured file reader.
    pub fn new(reader: R) -> Result<Self> {
        let file_size = reader.size()?;
        Ok(StructReader {
            reader,
            hasher: crc32fast::Hasher::new(),
            position: 0,
            file_size,
        })
    }

    /// Read and check the 4-byte magic and format version.
    pub fn read_header(&mut self, name: &str, magic: u32, version: u32) -> Result<()> {
        let found = self.read_u32()?;
        if found != magic {
            return Err(QuiverError::corrupt(format!(
                "{name}: bad magic number {found:#010x}, expected {magic:#010x}"
            )));
        }

        let found = self.read_u32()?;
        if found != version {
            return Err(QuiverError::corrupt(format!(
                "{name}: unsupported format version {found}"
            )));
        }

        Ok(())
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8()?;
        self.track(&[value]);
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.track(&value.to_le_bytes());
        Ok(value)
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.reader.read_u64::<LittleEndian>()?;
        self.track(&value.to_le_bytes());
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let value = read_u64(&mut self.reader)?;
        self.track(&encode_u64(value));
        Ok(value)
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_varint()?;
        if self.position + length > self.file_size {
            return Err(QuiverError::corrupt(format!(
                "string of {length} bytes runs past end of file"
            )));
        }

        let bytes = self.read_raw(length as usize)?;
        String::from_utf8(bytes).map_err(|e| QuiverError::corrupt(format!("Invalid UTF-8: {e}")))
    }

    /// Read exact number of raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        self.reader.read_exact(&mut bytes)?;
        self.track(&bytes);
        Ok(bytes)
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get file size.
    pub fn size(&self) -> u64 {
        self.file_size
    }

    fn track(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.position += data.len() as u64;
    }

    /// Read the trailing checksum and compare it with everything read so far.
    ///
    /// Must be called once the last record has been consumed.
    pub fn verify_checksum(&mut self) -> Result<bool> {
        if self.position + 4 > self.file_size {
            return Err(QuiverError::corrupt("File too short for checksum"));
        }

        let stored_checksum = self.reader.read_u32::<LittleEndian>()?;
        Ok(stored_checksum == self.hasher.clone().finalize())
    }

    /// Close the reader.
    pub fn close(mut self) -> Result<()> {
        self.reader.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileOutput, FileStorage, Storage};
    use tempfile::TempDir;

    #[test]
    fn test_struct_writer_reader() {
        let temp_dir = TempDir::new().unwrap();

        {
            let output = FileOutput::create(temp_dir.path().join("test.struct")).unwrap();
            let mut writer = StructWriter::new(output);

            writer.write_header(0x5153_5452, 3).unwrap();
            writer.write_u8(42).unwrap();
            writer.write_u64(9876543210).unwrap();
            writer.write_varint(12345).unwrap();
            writer.write_string("Hello, World!").unwrap();
            assert_eq!(writer.position(), 8 + 1 + 8 + 2 + 14);

            writer.close().unwrap();
        }

        let storage = FileStorage::open(temp_dir.path()).unwrap();
        let input = storage.open_input("test.struct").unwrap();
        let mut reader = StructReader::new(input).unwrap();

        reader.read_header("test.struct", 0x5153_5452, 3).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 42);
        assert_eq!(reader.read_u64().unwrap(), 9876543210);
        assert_eq!(reader.read_varint().unwrap(), 12345);
        assert_eq!(reader.read_string().unwrap(), "Hello, World!");

        assert!(reader.verify_checksum().unwrap());
    }

    #[test]
    fn test_checksum_detects_damage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("damaged");

        {
            let output = FileOutput::create(&path).unwrap();
            let mut writer = StructWriter::new(output);
            writer.write_u64(7).unwrap();
            writer.close().unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let storage = FileStorage::open(temp_dir.path()).unwrap();
        let mut reader = StructReader::new(storage.open_input("damaged").unwrap()).unwrap();
        reader.read_u64().unwrap();
        assert!(!reader.verify_checksum().unwrap());
    }

    #[test]
    fn test_header_mismatch() {
        let temp_dir = TempDir::new().unwrap();

        {
            let output = FileOutput::create(temp_dir.path().join("h")).unwrap();
            let mut writer = StructWriter::new(output);
            writer.write_header(1, 1).unwrap();
            writer.close().unwrap();
        }

        let storage = FileStorage::open(temp_dir.path()).unwrap();
        let mut reader = StructReader::new(storage.open_input("h").unwrap()).unwrap();
        assert!(matches!(
            reader.read_header("h", 2, 1),
            Err(QuiverError::Corrupt(_))
        ));
    }
}
