//! One on-disk index: statistics, lexicon, term lists and postings.

use log::debug;

use crate::document::{DocId, TermId};
use crate::error::{QuiverError, Result};
use crate::repository::format::{
    FORMAT_VERSION, KeyedTable, LEXICON_FILE, LEXICON_IDS_FILE, LEXICON_IDS_MAGIC, LEXICON_MAGIC,
    POSTINGS_FILE, POSTINGS_MAGIC, RecordTable, STATS_FILE, STATS_MAGIC, TERMLIST_FILE,
    TERMLIST_MAGIC,
};
use crate::storage::{FileStorage, MappedFile, Storage, StructReader};
use crate::util::varint::VarIntCursor;

/// Corpus-level counts recorded when the index was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStatistics {
    /// Lowest valid internal document id.
    pub base: DocId,
    /// One past the highest valid internal document id.
    pub maximum: DocId,
    /// Number of term occurrences in the collection.
    pub total_terms: u64,
    /// Number of distinct terms.
    pub unique_terms: u64,
}

impl IndexStatistics {
    pub fn document_count(&self) -> u64 {
        self.maximum - self.base
    }

    /// Mean document length, zero for an empty collection.
    pub fn average_document_length(&self) -> f64 {
        match self.document_count() {
            0 => 0.0,
            n => self.total_terms as f64 / n as f64,
        }
    }
}

/// Lexicon entry for one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermRecord {
    pub term_id: TermId,
    /// Number of documents containing the term.
    pub document_frequency: u64,
    /// Number of occurrences in the collection.
    pub collection_frequency: u64,
}

/// Occurrences of a term in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub document: DocId,
    /// Term positions, ascending.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn frequency(&self) -> usize {
        self.positions.len()
    }
}

const ID_RECORD_SIZE: u64 = 16;
const POSTINGS_RECORD_SIZE: u64 = 24;

/// Read-only handle on `index/<name>/`.
#[derive(Debug)]
pub struct DiskIndex {
    name: String,
    storage: FileStorage,
    statistics: IndexStatistics,
    lexicon: KeyedTable,
    lexicon_ids: MappedFile,
    /// First id record, just past the header and count.
    ids_start: u64,
    termlist: RecordTable,
    postings: MappedFile,
    postings_count: u64,
    /// First directory record, just past the header and count.
    directory_start: u64,
}

impl DiskIndex {
    /// Open the index stored in `storage`, checking that its files agree
    /// with each other.
    pub fn open(name: &str, storage: FileStorage) -> Result<Self> {
        let statistics = Self::read_statistics(&storage)?;
        if statistics.maximum < statistics.base {
            return Err(QuiverError::corrupt(format!(
                "index {name}: maximum document {} below base {}",
                statistics.maximum, statistics.base
            )));
        }

        let lexicon = KeyedTable::open(storage.open_mapped(LEXICON_FILE)?, LEXICON_MAGIC)?;
        let lexicon_ids = storage.open_mapped(LEXICON_IDS_FILE)?;
        let ids_start = lexicon_ids.check_header(LEXICON_IDS_MAGIC, FORMAT_VERSION)?;
        let ids_count = lexicon_ids.read_u64_at(ids_start)?;

        for (file, count) in [(LEXICON_FILE, lexicon.count()), (LEXICON_IDS_FILE, ids_count)] {
            if count != statistics.unique_terms {
                return Err(QuiverError::corrupt(format!(
                    "index {name}: {file} has {count} terms, statistics record {}",
                    statistics.unique_terms
                )));
            }
        }
        let ids_start = ids_start + 8;
        lexicon_ids.slice(ids_start, ids_count.saturating_mul(ID_RECORD_SIZE))?;

        let termlist = RecordTable::open(storage.open_mapped(TERMLIST_FILE)?, TERMLIST_MAGIC)?;
        if termlist.base() != statistics.base || termlist.maximum() != statistics.maximum {
            return Err(QuiverError::corrupt(format!(
                "index {name}: term lists cover [{}, {}), statistics record [{}, {})",
                termlist.base(),
                termlist.maximum(),
                statistics.base,
                statistics.maximum
            )));
        }

        let postings = storage.open_mapped(POSTINGS_FILE)?;
        let postings_start = postings.check_header(POSTINGS_MAGIC, FORMAT_VERSION)?;
        let postings_count = postings.read_u64_at(postings_start)?;
        let directory_start = postings_start + 8;
        postings.slice(
            directory_start,
            postings_count.saturating_mul(POSTINGS_RECORD_SIZE),
        )?;

        debug!(
            "index {name} opened: {} documents, {} unique terms, {} term occurrences",
            statistics.document_count(),
            statistics.unique_terms,
            statistics.total_terms
        );

        Ok(DiskIndex {
            name: name.to_string(),
            storage,
            statistics,
            lexicon,
            lexicon_ids,
            ids_start,
            termlist,
            postings,
            postings_count,
            directory_start,
        })
    }

    fn read_statistics(storage: &FileStorage) -> Result<IndexStatistics> {
        let mut reader = StructReader::new(storage.open_input(STATS_FILE)?)?;
        reader.read_header(STATS_FILE, STATS_MAGIC, FORMAT_VERSION)?;

        let statistics = IndexStatistics {
            base: reader.read_u64()?,
            maximum: reader.read_u64()?,
            total_terms: reader.read_u64()?,
            unique_terms: reader.read_u64()?,
        };

        if !reader.verify_checksum()? {
            return Err(QuiverError::corrupt(format!("{STATS_FILE}: checksum mismatch")));
        }
        reader.close()?;

        Ok(statistics)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statistics(&self) -> &IndexStatistics {
        &self.statistics
    }

    pub(crate) fn storage(&self) -> &FileStorage {
        &self.storage
    }

    fn read_term_record(values: &mut VarIntCursor<'_>) -> Result<TermRecord> {
        Ok(TermRecord {
            term_id: values.next_u64()?,
            document_frequency: values.next_u64()?,
            collection_frequency: values.next_u64()?,
        })
    }

    /// Lexicon entry of an already-normalised term.
    pub fn term(&self, term: &str) -> Result<Option<TermRecord>> {
        match self.lexicon.find(term)? {
            Some(mut values) => Ok(Some(Self::read_term_record(&mut values)?)),
            None => Ok(None),
        }
    }

    /// Term string and lexicon entry of `term_id`.
    pub fn term_by_id(&self, term_id: TermId) -> Result<Option<(String, TermRecord)>> {
        let (mut low, mut high) = (0u64, self.statistics.unique_terms);

        while low < high {
            let mid = low + (high - low) / 2;
            let record = self.ids_start + mid * ID_RECORD_SIZE;
            let found = self.lexicon_ids.read_u64_at(record)?;

            if found < term_id {
                low = mid + 1;
            } else if found > term_id {
                high = mid;
            } else {
                let index = self.lexicon_ids.read_u64_at(record + 8)?;
                if index >= self.lexicon.count() {
                    return Err(QuiverError::corrupt(format!(
                        "{LEXICON_IDS_FILE}: entry {index} out of range"
                    )));
                }
                let (term, mut values) = self.lexicon.entry(index)?;
                let term = term.to_string();
                return Ok(Some((term, Self::read_term_record(&mut values)?)));
            }
        }

        Ok(None)
    }

    /// Term-id sequence of document `id`.
    pub fn document_terms(&self, id: DocId) -> Result<Vec<TermId>> {
        let mut cursor = VarIntCursor::new(self.termlist.record(id)?);
        let length = cursor.next_u64()?;
        cursor.take_u64s(length as usize)
    }

    /// Number of term positions in document `id`.
    pub fn document_length(&self, id: DocId) -> Result<u64> {
        VarIntCursor::new(self.termlist.record(id)?).next_u64()
    }

    /// Positional postings of `term_id`, ordered by document.
    pub fn postings(&self, term_id: TermId) -> Result<Vec<Posting>> {
        let data_start = self.directory_start + self.postings_count * POSTINGS_RECORD_SIZE;
        let (mut low, mut high) = (0u64, self.postings_count);

        while low < high {
            let mid = low + (high - low) / 2;
            let record = self.directory_start + mid * POSTINGS_RECORD_SIZE;
            let found = self.postings.read_u64_at(record)?;

            if found < term_id {
                low = mid + 1;
            } else if found > term_id {
                high = mid;
            } else {
                let offset = self.postings.read_u64_at(record + 8)?;
                let length = self.postings.read_u64_at(record + 16)?;
                let start = data_start.checked_add(offset).ok_or_else(|| {
                    QuiverError::corrupt(format!(
                        "{POSTINGS_FILE}: term {term_id} offset {offset} overflows"
                    ))
                })?;
                let bytes = self.postings.slice(start, length)?;
                return self.decode_postings(term_id, bytes);
            }
        }

        Ok(Vec::new())
    }

    fn decode_postings(&self, term_id: TermId, bytes: &[u8]) -> Result<Vec<Posting>> {
        let mut cursor = VarIntCursor::new(bytes);
        let count = cursor.next_u64()? as usize;
        let mut postings = Vec::with_capacity(count.min(bytes.len()));
        let mut document: u64 = 0;

        for _ in 0..count {
            document = document.saturating_add(cursor.next_u64()?);
            if document < self.statistics.base || document >= self.statistics.maximum {
                return Err(QuiverError::corrupt(format!(
                    "postings of term {term_id} reference document {document} outside [{}, {})",
                    self.statistics.base, self.statistics.maximum
                )));
            }

            let frequency = cursor.next_u64()? as usize;
            let mut positions = Vec::with_capacity(frequency.min(bytes.len()));
            let mut position = 0u64;
            for _ in 0..frequency {
                position = position.saturating_add(cursor.next_u64()?);
                let position = u32::try_from(position).map_err(|_| {
                    QuiverError::corrupt(format!("position {position} of term {term_id} overflows"))
                })?;
                positions.push(position);
            }

            postings.push(Posting {
                document,
                positions,
            });
        }

        Ok(postings)
    }
}
