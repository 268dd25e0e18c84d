//! Fixture writer for repositories.
//!
//! Repositories are normally produced by an external build tool; tests and
//! benchmarks use [`RepositoryBuilder`] to write small ones in the same
//! on-disk format.
//!
//! ```
//! use quiver::testing::RepositoryBuilder;
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! RepositoryBuilder::scenario().build(dir.path()).unwrap();
//!
//! let repository = quiver::open(dir.path()).unwrap();
//! assert_eq!(repository.document_count().unwrap(), 3);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::analysis::{StemmerKind, TermProcessor};
use crate::document::{DocId, ParsedDocument, TermId};
use crate::error::{QuiverError, Result};
use crate::repository::RepositoryManifest;
use crate::repository::format::{
    COLLECTION_DIR, DOCNO_FILE, DOCNO_LOOKUP_FILE, DOCNO_LOOKUP_MAGIC, DOCNO_MAGIC,
    DOCUMENTS_FILE, DOCUMENTS_MAGIC, FORMAT_VERSION, INDEX_DIR, LEXICON_FILE, LEXICON_IDS_FILE,
    LEXICON_IDS_MAGIC, LEXICON_MAGIC, POSTINGS_FILE, POSTINGS_MAGIC, STATS_FILE, STATS_MAGIC,
    TERMLIST_FILE, TERMLIST_MAGIC, VOCABULARY_END, VOCABULARY_ENTRY, VOCABULARY_FILE,
    VOCABULARY_MAGIC,
};
use crate::storage::{FileOutput, StorageOutput, StructWriter};
use crate::util::varint::encode_u64_into;

/// Term id recorded in term lists for stopwords.
pub const STOPWORD_ID: TermId = 0;

/// Text of the three-document scenario repository.
pub const SCENARIO: [(&str, &str); 3] = [("doc_a", "cat"), ("doc_b", "cat dog cat"), ("doc_c", "dog")];

/// Writes a complete repository directory from in-memory documents.
#[derive(Debug, Clone)]
pub struct RepositoryBuilder {
    index_name: String,
    base: DocId,
    first_term_id: TermId,
    stemmer: Option<StemmerKind>,
    stopwords: AHashSet<String>,
    store_docs: bool,
    documents: Vec<(String, String)>,
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        RepositoryBuilder {
            index_name: "main".to_string(),
            base: 1,
            first_term_id: 1,
            stemmer: None,
            stopwords: AHashSet::new(),
            store_docs: true,
            documents: Vec::new(),
        }
    }
}

/// Postings of one term while building.
#[derive(Debug, Default)]
struct TermPostings {
    term: String,
    documents: BTreeMap<DocId, Vec<u32>>,
}

impl TermPostings {
    fn collection_frequency(&self) -> u64 {
        self.documents.values().map(|p| p.len() as u64).sum()
    }
}

impl RepositoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `doc_a: "cat"`, `doc_b: "cat dog cat"`, `doc_c: "dog"` with ids
    /// starting at 0, so `cat` is term 0 and `dog` term 1.
    pub fn scenario() -> Self {
        let mut builder = RepositoryBuilder::new().base(0).first_term_id(0);
        for (name, text) in SCENARIO {
            builder = builder.document(name, text);
        }
        builder
    }

    pub fn index_name<S: Into<String>>(mut self, index_name: S) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// First internal document id.
    pub fn base(mut self, base: DocId) -> Self {
        self.base = base;
        self
    }

    /// Id given to the first distinct term; later terms count up from it.
    pub fn first_term_id(mut self, first_term_id: TermId) -> Self {
        self.first_term_id = first_term_id;
        self
    }

    pub fn stemmer(mut self, stemmer: Option<StemmerKind>) -> Self {
        self.stemmer = stemmer;
        self
    }

    /// Words recorded as [`STOPWORD_ID`] and left out of the vocabulary.
    pub fn stopwords<I, S>(mut self, stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords = stopwords
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Whether parsed document text is stored for snippets.
    pub fn store_docs(mut self, store_docs: bool) -> Self {
        self.store_docs = store_docs;
        self
    }

    pub fn document<S: Into<String>, T: Into<String>>(mut self, external_id: S, text: T) -> Self {
        self.documents.push((external_id.into(), text.into()));
        self
    }

    /// Directory of the index inside a repository rooted at `root`.
    pub fn index_path(&self, root: &Path) -> PathBuf {
        root.join(INDEX_DIR).join(&self.index_name)
    }

    /// Write the repository under `root`, creating directories as needed.
    pub fn build(&self, root: &Path) -> Result<()> {
        if !self.stopwords.is_empty() && self.first_term_id <= STOPWORD_ID {
            return Err(QuiverError::invalid_argument(
                "term ids must start above the stopword id when stopwords are configured",
            ));
        }

        let processor = TermProcessor::new(self.stemmer);
        let parsed: Vec<ParsedDocument> = self
            .documents
            .iter()
            .map(|(name, text)| ParsedDocument::from_text(name.clone(), text.clone()))
            .collect();

        let mut term_ids: AHashMap<String, TermId> = AHashMap::new();
        let mut terms: BTreeMap<TermId, TermPostings> = BTreeMap::new();
        let mut termlists: Vec<Vec<TermId>> = Vec::with_capacity(parsed.len());
        let mut total_terms = 0u64;

        for (offset, document) in parsed.iter().enumerate() {
            let id = self.base + offset as DocId;
            let mut termlist = Vec::with_capacity(document.len());

            for position in 0..document.len() {
                let Some(word) = document.token_text(position) else {
                    continue;
                };
                if self.stopwords.contains(&word.to_lowercase()) {
                    termlist.push(STOPWORD_ID);
                    continue;
                }

                let term = processor.process(word);
                let next_id = self.first_term_id + term_ids.len() as TermId;
                let term_id = *term_ids.entry(term.clone()).or_insert(next_id);
                terms
                    .entry(term_id)
                    .or_insert_with(|| TermPostings {
                        term,
                        ..Default::default()
                    })
                    .documents
                    .entry(id)
                    .or_default()
                    .push(position as u32);
                termlist.push(term_id);
            }

            total_terms += termlist.len() as u64;
            termlists.push(termlist);
        }

        std::fs::create_dir_all(root)?;
        RepositoryManifest::single(self.index_name.clone(), self.stemmer, self.store_docs)
            .save(root)?;

        self.write_collection(&root.join(COLLECTION_DIR), &parsed)?;

        let index_dir = self.index_path(root);
        let maximum = self.base + parsed.len() as DocId;
        write_statistics(&index_dir, self.base, maximum, total_terms, terms.len() as u64)?;
        write_vocabulary(&index_dir, &terms)?;
        write_lexicon(&index_dir, &terms)?;
        write_postings(&index_dir, &terms)?;

        let termlist_records: Vec<Vec<u8>> = termlists
            .iter()
            .map(|termlist| {
                let mut record = Vec::new();
                encode_u64_into(termlist.len() as u64, &mut record);
                for &term_id in termlist {
                    encode_u64_into(term_id, &mut record);
                }
                record
            })
            .collect();
        write_record_table(
            &index_dir.join(TERMLIST_FILE),
            TERMLIST_MAGIC,
            self.base,
            &termlist_records,
        )?;

        debug!(
            "built repository {}: {} documents, {} terms",
            root.display(),
            parsed.len(),
            terms.len()
        );
        Ok(())
    }

    fn write_collection(&self, dir: &Path, parsed: &[ParsedDocument]) -> Result<()> {
        let names: Vec<Vec<u8>> = parsed
            .iter()
            .map(|d| d.external_id.as_bytes().to_vec())
            .collect();
        write_record_table(&dir.join(DOCNO_FILE), DOCNO_MAGIC, self.base, &names)?;

        let mut lookup: Vec<(String, Vec<u64>)> = parsed
            .iter()
            .enumerate()
            .map(|(offset, d)| (d.external_id.clone(), vec![self.base + offset as DocId]))
            .collect();
        lookup.sort();
        write_keyed_table(&dir.join(DOCNO_LOOKUP_FILE), DOCNO_LOOKUP_MAGIC, &lookup)?;

        if self.store_docs {
            let records = parsed
                .iter()
                .map(bincode::serialize)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            write_record_table(&dir.join(DOCUMENTS_FILE), DOCUMENTS_MAGIC, self.base, &records)?;
        }
        Ok(())
    }
}

fn write_statistics(
    dir: &Path,
    base: DocId,
    maximum: DocId,
    total_terms: u64,
    unique_terms: u64,
) -> Result<()> {
    let mut writer = StructWriter::new(FileOutput::create(dir.join(STATS_FILE))?);
    writer.write_header(STATS_MAGIC, FORMAT_VERSION)?;
    writer.write_u64(base)?;
    writer.write_u64(maximum)?;
    writer.write_u64(total_terms)?;
    writer.write_u64(unique_terms)?;
    writer.close()
}

fn write_vocabulary(dir: &Path, terms: &BTreeMap<TermId, TermPostings>) -> Result<()> {
    let mut writer = StructWriter::new(FileOutput::create(dir.join(VOCABULARY_FILE))?);
    writer.write_header(VOCABULARY_MAGIC, FORMAT_VERSION)?;
    for (&term_id, postings) in terms {
        writer.write_u8(VOCABULARY_ENTRY)?;
        writer.write_varint(term_id)?;
        writer.write_string(&postings.term)?;
        writer.write_varint(postings.documents.len() as u64)?;
        writer.write_varint(postings.collection_frequency())?;
    }
    writer.write_u8(VOCABULARY_END)?;
    writer.close()
}

fn write_lexicon(dir: &Path, terms: &BTreeMap<TermId, TermPostings>) -> Result<()> {
    let mut entries: Vec<(String, Vec<u64>)> = terms
        .iter()
        .map(|(&term_id, postings)| {
            (
                postings.term.clone(),
                vec![
                    term_id,
                    postings.documents.len() as u64,
                    postings.collection_frequency(),
                ],
            )
        })
        .collect();
    entries.sort();
    write_keyed_table(&dir.join(LEXICON_FILE), LEXICON_MAGIC, &entries)?;

    let mut ids: Vec<(TermId, u64)> = entries
        .iter()
        .enumerate()
        .map(|(index, (_, values))| (values[0], index as u64))
        .collect();
    ids.sort_unstable();

    let mut output = FileOutput::create(dir.join(LEXICON_IDS_FILE))?;
    write_header(&mut output, LEXICON_IDS_MAGIC)?;
    output.write_u64::<LittleEndian>(ids.len() as u64)?;
    for (term_id, index) in ids {
        output.write_u64::<LittleEndian>(term_id)?;
        output.write_u64::<LittleEndian>(index)?;
    }
    output.close()
}

fn write_postings(dir: &Path, terms: &BTreeMap<TermId, TermPostings>) -> Result<()> {
    let mut data = Vec::new();
    let mut directory = Vec::with_capacity(terms.len());

    for (&term_id, postings) in terms {
        let offset = data.len() as u64;
        encode_u64_into(postings.documents.len() as u64, &mut data);
        let mut previous_document = 0;
        for (&document, positions) in &postings.documents {
            encode_u64_into(document - previous_document, &mut data);
            previous_document = document;
            encode_u64_into(positions.len() as u64, &mut data);
            let mut previous_position = 0;
            for &position in positions {
                encode_u64_into(u64::from(position - previous_position), &mut data);
                previous_position = position;
            }
        }
        directory.push((term_id, offset, data.len() as u64 - offset));
    }

    let mut output = FileOutput::create(dir.join(POSTINGS_FILE))?;
    write_header(&mut output, POSTINGS_MAGIC)?;
    output.write_u64::<LittleEndian>(directory.len() as u64)?;
    for (term_id, offset, length) in directory {
        output.write_u64::<LittleEndian>(term_id)?;
        output.write_u64::<LittleEndian>(offset)?;
        output.write_u64::<LittleEndian>(length)?;
    }
    std::io::Write::write_all(&mut output, &data)?;
    output.close()
}

fn write_header(output: &mut FileOutput, magic: u32) -> Result<()> {
    output.write_u32::<LittleEndian>(magic)?;
    output.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    Ok(())
}

/// Dense table: base, count, `count + 1` offsets, then the records.
fn write_record_table(path: &Path, magic: u32, base: DocId, records: &[Vec<u8>]) -> Result<()> {
    let mut output = FileOutput::create(path)?;
    write_header(&mut output, magic)?;
    output.write_u64::<LittleEndian>(base)?;
    output.write_u64::<LittleEndian>(records.len() as u64)?;

    let mut offset = 0u64;
    output.write_u64::<LittleEndian>(offset)?;
    for record in records {
        offset += record.len() as u64;
        output.write_u64::<LittleEndian>(offset)?;
    }
    for record in records {
        std::io::Write::write_all(&mut output, record)?;
    }
    output.close()
}

/// Sorted table: count, `count` offsets, then key-prefixed varint entries.
fn write_keyed_table(path: &Path, magic: u32, entries: &[(String, Vec<u64>)]) -> Result<()> {
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(entries.len());
    for (key, values) in entries {
        offsets.push(data.len() as u64);
        encode_u64_into(key.len() as u64, &mut data);
        data.extend_from_slice(key.as_bytes());
        for &value in values {
            encode_u64_into(value, &mut data);
        }
    }

    let mut output = FileOutput::create(path)?;
    write_header(&mut output, magic)?;
    output.write_u64::<LittleEndian>(entries.len() as u64)?;
    for offset in offsets {
        output.write_u64::<LittleEndian>(offset)?;
    }
    std::io::Write::write_all(&mut output, &data)?;
    output.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stopwords_need_nonzero_term_ids() {
        let dir = TempDir::new().unwrap();
        let builder = RepositoryBuilder::scenario().stopwords(["the"]);
        assert!(matches!(
            builder.build(dir.path()),
            Err(QuiverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_build_writes_layout() {
        let dir = TempDir::new().unwrap();
        let builder = RepositoryBuilder::scenario().index_name("idx");
        builder.build(dir.path()).unwrap();

        let index = builder.index_path(dir.path());
        for file in [
            STATS_FILE,
            VOCABULARY_FILE,
            LEXICON_FILE,
            LEXICON_IDS_FILE,
            TERMLIST_FILE,
            POSTINGS_FILE,
        ] {
            assert!(index.join(file).is_file(), "missing {file}");
        }
        for file in [DOCNO_FILE, DOCNO_LOOKUP_FILE, DOCUMENTS_FILE] {
            assert!(dir.path().join(COLLECTION_DIR).join(file).is_file());
        }
    }
}
