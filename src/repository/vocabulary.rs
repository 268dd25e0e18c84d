//! Forward-only iteration over the persisted vocabulary.
//!
//! The vocabulary file is a stream of entries terminated by an explicit end
//! marker and a checksum. [`VocabularyCursor`] reads it one entry at a time
//! without loading it; [`build_dictionary`] and [`build_term_frequencies`]
//! make one pass each and cross-check the result against the index
//! statistics.

use std::io::ErrorKind;

use ahash::AHashMap;
use log::debug;

use crate::document::TermId;
use crate::error::{QuiverError, Result};
use crate::repository::disk_index::DiskIndex;
use crate::repository::format::{
    FORMAT_VERSION, VOCABULARY_END, VOCABULARY_ENTRY, VOCABULARY_FILE, VOCABULARY_MAGIC,
};
use crate::storage::{Storage, StorageInput, StructReader};

/// One term of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub term_id: TermId,
    pub term: String,
    /// Number of documents containing the term.
    pub document_frequency: u64,
    /// Number of occurrences of the term in the collection.
    pub term_frequency: u64,
}

/// Scoped reader over the vocabulary file.
///
/// The underlying file is released when the end marker is reached, on the
/// first error, or when the cursor is dropped, whichever comes first.
#[derive(Debug)]
pub struct VocabularyCursor {
    reader: Option<StructReader<Box<dyn StorageInput>>>,
    current: Option<VocabularyEntry>,
    entries_read: u64,
}

impl VocabularyCursor {
    /// Open the vocabulary of `index`, positioned on the first entry.
    pub fn open(index: &DiskIndex) -> Result<Self> {
        let input = index.storage().open_input(VOCABULARY_FILE)?;
        let mut reader = StructReader::new(input)?;
        reader.read_header(VOCABULARY_FILE, VOCABULARY_MAGIC, FORMAT_VERSION)?;

        let mut cursor = VocabularyCursor {
            reader: Some(reader),
            current: None,
            entries_read: 0,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    /// Whether the end marker has been reached.
    pub fn finished(&self) -> bool {
        self.current.is_none()
    }

    /// The entry the cursor is positioned on.
    pub fn current(&self) -> Option<&VocabularyEntry> {
        self.current.as_ref()
    }

    /// Number of entries read so far.
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Move to the next entry.
    pub fn advance(&mut self) -> Result<()> {
        self.current = None;
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };

        match Self::read_entry(reader) {
            Ok(Some(entry)) => {
                self.entries_read += 1;
                self.current = Some(entry);
                Ok(())
            }
            Ok(None) => {
                self.release();
                Ok(())
            }
            Err(e) => {
                self.release();
                Err(e)
            }
        }
    }

    fn read_entry(
        reader: &mut StructReader<Box<dyn StorageInput>>,
    ) -> Result<Option<VocabularyEntry>> {
        let tag = reader.read_u8().map_err(Self::truncated)?;
        match tag {
            VOCABULARY_ENTRY => {
                let term_id = reader.read_varint().map_err(Self::truncated)?;
                let term = reader.read_string().map_err(Self::truncated)?;
                let document_frequency = reader.read_varint().map_err(Self::truncated)?;
                let term_frequency = reader.read_varint().map_err(Self::truncated)?;
                Ok(Some(VocabularyEntry {
                    term_id,
                    term,
                    document_frequency,
                    term_frequency,
                }))
            }
            VOCABULARY_END => {
                if !reader.verify_checksum()? {
                    return Err(QuiverError::corrupt(format!(
                        "{VOCABULARY_FILE}: checksum mismatch"
                    )));
                }
                Ok(None)
            }
            other => Err(QuiverError::corrupt(format!(
                "{VOCABULARY_FILE}: unknown entry tag {other}"
            ))),
        }
    }

    fn truncated(err: QuiverError) -> QuiverError {
        match err {
            QuiverError::Io(e) if e.kind() == ErrorKind::UnexpectedEof => QuiverError::corrupt(
                format!("{VOCABULARY_FILE} ends without an end-of-vocabulary marker"),
            ),
            other => other,
        }
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.close() {
                debug!("closing {VOCABULARY_FILE} failed: {e}");
            }
        }
    }
}

impl Iterator for VocabularyCursor {
    type Item = Result<VocabularyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.current.take()?;
        match self.advance() {
            Ok(()) => Some(Ok(entry)),
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for VocabularyCursor {
    fn drop(&mut self) {
        self.release();
    }
}

/// The three vocabulary mappings, a snapshot of the full corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermDictionary {
    pub term_to_id: AHashMap<String, TermId>,
    pub id_to_term: AHashMap<TermId, String>,
    pub id_to_document_frequency: AHashMap<TermId, u64>,
}

impl TermDictionary {
    pub fn len(&self) -> usize {
        self.term_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_to_id.is_empty()
    }
}

/// Cap on capacity reserved from on-disk counts.
const PREALLOCATE_LIMIT: u64 = 1 << 20;

fn check_size(what: &str, size: usize, expected: u64) -> Result<()> {
    if size as u64 != expected {
        return Err(QuiverError::corrupt(format!(
            "vocabulary {what} has {size} entries, index records {expected} unique terms"
        )));
    }
    Ok(())
}

/// Read the whole vocabulary into term and id mappings.
pub fn build_dictionary(index: &DiskIndex) -> Result<TermDictionary> {
    let expected = index.statistics().unique_terms;
    let capacity = expected.min(PREALLOCATE_LIMIT) as usize;
    let mut dictionary = TermDictionary {
        term_to_id: AHashMap::with_capacity(capacity),
        id_to_term: AHashMap::with_capacity(capacity),
        id_to_document_frequency: AHashMap::with_capacity(capacity),
    };

    for entry in VocabularyCursor::open(index)? {
        let entry = entry?;
        if entry.document_frequency == 0 {
            return Err(QuiverError::corrupt(format!(
                "term {:?} (id {}) has document frequency 0",
                entry.term, entry.term_id
            )));
        }

        dictionary.term_to_id.insert(entry.term.clone(), entry.term_id);
        dictionary.id_to_term.insert(entry.term_id, entry.term);
        dictionary
            .id_to_document_frequency
            .insert(entry.term_id, entry.document_frequency);
    }

    check_size("term-to-id mapping", dictionary.term_to_id.len(), expected)?;
    check_size("id-to-term mapping", dictionary.id_to_term.len(), expected)?;
    check_size(
        "document-frequency mapping",
        dictionary.id_to_document_frequency.len(),
        expected,
    )?;

    debug!("built dictionary of {} terms", dictionary.len());
    Ok(dictionary)
}

/// Read the collection frequency of every term.
pub fn build_term_frequencies(index: &DiskIndex) -> Result<AHashMap<TermId, u64>> {
    let expected = index.statistics().unique_terms;
    let mut frequencies = AHashMap::with_capacity(expected.min(PREALLOCATE_LIMIT) as usize);

    for entry in VocabularyCursor::open(index)? {
        let entry = entry?;
        if entry.term_frequency == 0 {
            return Err(QuiverError::corrupt(format!(
                "term {:?} (id {}) has term frequency 0",
                entry.term, entry.term_id
            )));
        }
        frequencies.insert(entry.term_id, entry.term_frequency);
    }

    check_size("term-frequency mapping", frequencies.len(), expected)?;
    Ok(frequencies)
}
