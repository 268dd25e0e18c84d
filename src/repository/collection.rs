//! Collection metadata: external document identifiers and stored text.

use std::collections::BTreeSet;

use log::debug;

use crate::document::{DocId, ParsedDocument};
use crate::error::{QuiverError, Result};
use crate::repository::format::{
    DOCNO_FILE, DOCNO_LOOKUP_FILE, DOCNO_LOOKUP_MAGIC, DOCNO_MAGIC, DOCUMENTS_FILE,
    DOCUMENTS_MAGIC, KeyedTable, RecordTable,
};
use crate::storage::{FileStorage, Storage};

/// Read access to the `collection/` directory.
#[derive(Debug)]
pub struct CollectionStore {
    docno: RecordTable,
    lookup: KeyedTable,
    documents: Option<RecordTable>,
}

impl CollectionStore {
    /// Open the collection store.
    ///
    /// Stored documents are only opened when `store_docs` is set; a manifest
    /// that promises them while the file is missing is rejected.
    pub fn open(storage: &FileStorage, store_docs: bool) -> Result<Self> {
        let docno = RecordTable::open(storage.open_mapped(DOCNO_FILE)?, DOCNO_MAGIC)?;
        let lookup = KeyedTable::open(
            storage.open_mapped(DOCNO_LOOKUP_FILE)?,
            DOCNO_LOOKUP_MAGIC,
        )?;

        if lookup.count() != docno.count() {
            return Err(QuiverError::corrupt(format!(
                "{DOCNO_LOOKUP_FILE} has {} entries for {} documents",
                lookup.count(),
                docno.count()
            )));
        }

        let documents = if store_docs {
            if !storage.file_exists(DOCUMENTS_FILE) {
                return Err(QuiverError::configuration(
                    "manifest declares stored documents but collection/documents is missing",
                ));
            }
            let table = RecordTable::open(storage.open_mapped(DOCUMENTS_FILE)?, DOCUMENTS_MAGIC)?;
            if table.base() != docno.base() || table.count() != docno.count() {
                return Err(QuiverError::corrupt(
                    "stored documents do not cover the document range",
                ));
            }
            Some(table)
        } else {
            None
        };

        debug!(
            "collection store opened: documents [{}, {}), stored text: {}",
            docno.base(),
            docno.maximum(),
            documents.is_some()
        );

        Ok(CollectionStore {
            docno,
            lookup,
            documents,
        })
    }

    pub fn base(&self) -> DocId {
        self.docno.base()
    }

    pub fn maximum(&self) -> DocId {
        self.docno.maximum()
    }

    /// Whether parsed document text is available.
    pub fn has_documents(&self) -> bool {
        self.documents.is_some()
    }

    /// External identifier of `id`.
    pub fn external_id(&self, id: DocId) -> Result<String> {
        let bytes = self.docno.record(id)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            QuiverError::storage(format!("external id of document {id} is not UTF-8: {e}"))
        })
    }

    /// Internal ids of every document named `external_id`.
    pub fn internal_ids(&self, external_id: &str) -> Result<Vec<DocId>> {
        self.lookup
            .find_all(external_id)?
            .into_iter()
            .map(|mut values| values.next_u64())
            .collect()
    }

    /// Resolve a batch of external ids.
    ///
    /// Duplicate names are looked up once, unknown names are dropped and
    /// the result is ordered by internal id.
    pub fn resolve<'a, I>(&self, external_ids: I) -> Result<Vec<(String, DocId)>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = external_ids.into_iter().collect();

        let mut resolved = Vec::with_capacity(unique.len());
        for name in unique {
            for id in self.internal_ids(name)? {
                resolved.push((name.to_string(), id));
            }
        }

        resolved.sort_by_key(|(_, id)| *id);
        Ok(resolved)
    }

    /// Parsed text of `id`.
    pub fn parsed_document(&self, id: DocId) -> Result<ParsedDocument> {
        let table = self.documents.as_ref().ok_or_else(|| {
            QuiverError::snippet_unavailable("repository does not store document text")
        })?;

        let bytes = table.record(id)?;
        Ok(bincode::deserialize(bytes)?)
    }
}
