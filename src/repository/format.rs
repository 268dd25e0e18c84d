//! On-disk layout shared by the readers and the fixture writer.
//!
//! ```text
//! <repo>/manifest                  JSON manifest
//! <repo>/collection/docno          record table: external id per document
//! <repo>/collection/docno.lookup   keyed table: external id -> internal id
//! <repo>/collection/documents      record table: bincode ParsedDocument (optional)
//! <repo>/index/<name>/stats        base, maximum, total terms, unique terms
//! <repo>/index/<name>/vocabulary   forward-only term entries, end marker, crc32
//! <repo>/index/<name>/lexicon      keyed table: term -> id, df, cf
//! <repo>/index/<name>/lexicon.ids  (term id, lexicon entry) pairs sorted by id
//! <repo>/index/<name>/termlist     record table: varint term ids per document
//! <repo>/index/<name>/postings     directory + positional postings per term
//! ```
//!
//! Every binary file starts with a 4-byte magic and a format version. All
//! fixed-width integers are little-endian.

use crate::document::DocId;
use crate::error::{QuiverError, Result};
use crate::storage::MappedFile;
use crate::util::varint::{VarIntCursor, decode_u64};

pub const MANIFEST_FILE: &str = "manifest";
pub const COLLECTION_DIR: &str = "collection";
pub const INDEX_DIR: &str = "index";

pub const DOCNO_FILE: &str = "docno";
pub const DOCNO_LOOKUP_FILE: &str = "docno.lookup";
pub const DOCUMENTS_FILE: &str = "documents";

pub const STATS_FILE: &str = "stats";
pub const VOCABULARY_FILE: &str = "vocabulary";
pub const LEXICON_FILE: &str = "lexicon";
pub const LEXICON_IDS_FILE: &str = "lexicon.ids";
pub const TERMLIST_FILE: &str = "termlist";
pub const POSTINGS_FILE: &str = "postings";

pub const FORMAT_VERSION: u32 = 1;

const fn magic(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

pub const DOCNO_MAGIC: u32 = magic(b"QDNO");
pub const DOCNO_LOOKUP_MAGIC: u32 = magic(b"QDLK");
pub const DOCUMENTS_MAGIC: u32 = magic(b"QDOC");
pub const STATS_MAGIC: u32 = magic(b"QSTA");
pub const VOCABULARY_MAGIC: u32 = magic(b"QVOC");
pub const LEXICON_MAGIC: u32 = magic(b"QLEX");
pub const LEXICON_IDS_MAGIC: u32 = magic(b"QLID");
pub const TERMLIST_MAGIC: u32 = magic(b"QTLS");
pub const POSTINGS_MAGIC: u32 = magic(b"QPST");

/// Tag byte preceding every vocabulary entry.
pub const VOCABULARY_ENTRY: u8 = 1;
/// Tag byte marking the end of the vocabulary.
pub const VOCABULARY_END: u8 = 0;

fn corrupt_table(file: &MappedFile, what: &str) -> QuiverError {
    QuiverError::corrupt(format!("{}: {what}", file.name()))
}

/// Records addressed by internal document id.
///
/// Layout: header, `u64 base`, `u64 count`, `count + 1` offsets (relative to
/// the data section), data.
#[derive(Debug, Clone)]
pub struct RecordTable {
    file: MappedFile,
    base: DocId,
    count: u64,
    offsets_start: u64,
    data_start: u64,
}

impl RecordTable {
    pub fn open(file: MappedFile, magic: u32) -> Result<Self> {
        let header_end = file.check_header(magic, FORMAT_VERSION)?;
        let base = file.read_u64_at(header_end)?;
        let count = file.read_u64_at(header_end + 8)?;
        let offsets_start = header_end + 16;

        let data_start = count
            .checked_add(1)
            .and_then(|n| n.checked_mul(8))
            .and_then(|n| n.checked_add(offsets_start))
            .filter(|end| *end <= file.len() as u64)
            .ok_or_else(|| corrupt_table(&file, "offset table runs past end of file"))?;

        let data_len = file.read_u64_at(offsets_start + count * 8)?;
        if data_start.checked_add(data_len) != Some(file.len() as u64) {
            return Err(corrupt_table(&file, "data section length mismatch"));
        }

        Ok(RecordTable {
            file,
            base,
            count,
            offsets_start,
            data_start,
        })
    }

    pub fn base(&self) -> DocId {
        self.base
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// One past the last id.
    pub fn maximum(&self) -> DocId {
        self.base + self.count
    }

    /// The raw record for `id`.
    pub fn record(&self, id: DocId) -> Result<&[u8]> {
        if id < self.base || id >= self.maximum() {
            return Err(QuiverError::OutOfRange {
                id,
                base: self.base,
                maximum: self.maximum(),
            });
        }

        let index = id - self.base;
        let start = self.file.read_u64_at(self.offsets_start + index * 8)?;
        let end = self.file.read_u64_at(self.offsets_start + (index + 1) * 8)?;
        if end < start {
            return Err(corrupt_table(&self.file, "offsets are not ascending"));
        }
        let offset = self
            .data_start
            .checked_add(start)
            .ok_or_else(|| corrupt_table(&self.file, "record offset overflows"))?;

        self.file.slice(offset, end - start)
    }
}

/// Entries sorted by a length-prefixed UTF-8 key.
///
/// Layout: header, `u64 count`, `count` offsets (relative to the data
/// section, in key order), data. Each entry is a varint key length, the key
/// bytes and entry-specific varints.
#[derive(Debug, Clone)]
pub struct KeyedTable {
    file: MappedFile,
    count: u64,
    offsets_start: u64,
    data_start: u64,
}

impl KeyedTable {
    pub fn open(file: MappedFile, magic: u32) -> Result<Self> {
        let header_end = file.check_header(magic, FORMAT_VERSION)?;
        let count = file.read_u64_at(header_end)?;
        let offsets_start = header_end + 8;

        let data_start = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(offsets_start))
            .filter(|end| *end <= file.len() as u64)
            .ok_or_else(|| corrupt_table(&file, "offset table runs past end of file"))?;

        Ok(KeyedTable {
            file,
            count,
            offsets_start,
            data_start,
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Key of entry `index` and a cursor over the values that follow it.
    pub fn entry(&self, index: u64) -> Result<(&str, VarIntCursor<'_>)> {
        let offset = self.file.read_u64_at(self.offsets_start + index * 8)?;
        let start = self
            .data_start
            .checked_add(offset)
            .filter(|start| *start < self.file.len() as u64)
            .ok_or_else(|| corrupt_table(&self.file, "entry offset past end of file"))?;

        let bytes = &self.file.bytes()[start as usize..];
        let (key_len, read) = decode_u64(bytes)?;
        let key_end = (read as u64)
            .checked_add(key_len)
            .filter(|end| *end <= bytes.len() as u64)
            .ok_or_else(|| corrupt_table(&self.file, "key runs past end of file"))?
            as usize;

        let key = std::str::from_utf8(&bytes[read..key_end])
            .map_err(|e| corrupt_table(&self.file, &format!("invalid UTF-8 key: {e}")))?;

        Ok((key, VarIntCursor::new(&bytes[key_end..])))
    }

    /// Index of the first entry whose key is not less than `key`.
    pub fn lower_bound(&self, key: &str) -> Result<u64> {
        let (mut low, mut high) = (0, self.count);
        while low < high {
            let mid = low + (high - low) / 2;
            let (found, _) = self.entry(mid)?;
            if found < key {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// Cursors over the values of every entry keyed `key`.
    pub fn find_all(&self, key: &str) -> Result<Vec<VarIntCursor<'_>>> {
        let mut found = Vec::new();
        let mut index = self.lower_bound(key)?;
        while index < self.count {
            let (entry_key, values) = self.entry(index)?;
            if entry_key != key {
                break;
            }
            found.push(values);
            index += 1;
        }
        Ok(found)
    }

    /// Cursor over the values of the first entry keyed `key`.
    pub fn find(&self, key: &str) -> Result<Option<VarIntCursor<'_>>> {
        let index = self.lower_bound(key)?;
        if index >= self.count {
            return Ok(None);
        }

        let (entry_key, values) = self.entry(index)?;
        Ok((entry_key == key).then_some(values))
    }
}
