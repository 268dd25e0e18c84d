//! Document access, corpus statistics and term normalisation.

use ahash::AHashMap;

use crate::analysis::{escape, tokenize};
use crate::document::{DocId, DocumentRecord, TermId};
use crate::error::Result;
use crate::repository::Repository;

/// Distribution of document lengths across the collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthStatistics {
    pub documents: u64,
    pub mean: f64,
    /// Population standard deviation.
    pub standard_deviation: f64,
    pub minimum: u64,
    pub maximum: u64,
}

/// Welford's online mean and variance.
#[derive(Debug, Default)]
struct RunningMoments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn variance(&self) -> f64 {
        match self.count {
            0 => 0.0,
            n => self.m2 / n as f64,
        }
    }
}

impl Repository {
    /// Lowest valid internal document id.
    pub fn document_base(&self) -> Result<DocId> {
        Ok(self.ready()?.handle.document_base)
    }

    /// One past the highest valid internal document id.
    pub fn document_maximum(&self) -> Result<DocId> {
        Ok(self.ready()?.handle.document_maximum)
    }

    pub fn document_count(&self) -> Result<u64> {
        Ok(self.ready()?.handle.document_count)
    }

    /// External id and term-id sequence of document `id`.
    pub fn document(&self, id: DocId) -> Result<DocumentRecord> {
        let open = self.ready()?;
        open.handle.check_document(id)?;

        let external_id = open.collection.external_id(id)?;
        let terms = open.index.document_terms(id)?;
        Ok(DocumentRecord::new(external_id, terms))
    }

    /// Number of term positions in document `id`.
    pub fn document_length(&self, id: DocId) -> Result<u64> {
        let open = self.ready()?;
        open.handle.check_document(id)?;
        open.index.document_length(id)
    }

    /// Term occurrences in the whole collection.
    pub fn total_term_count(&self) -> Result<u64> {
        Ok(self.ready()?.handle.total_terms)
    }

    /// Number of distinct terms in the vocabulary.
    pub fn unique_term_count(&self) -> Result<u64> {
        Ok(self.ready()?.handle.unique_terms)
    }

    /// Collection occurrences of `term` after normalisation; 0 if unknown.
    pub fn term_count(&self, term: &str) -> Result<u64> {
        let open = self.ready()?;
        let processed = open.processor.process(term);
        Ok(open
            .index
            .term(&processed)?
            .map_or(0, |record| record.collection_frequency))
    }

    /// Number of documents containing `term` after normalisation; 0 if unknown.
    pub fn document_frequency(&self, term: &str) -> Result<u64> {
        let open = self.ready()?;
        let processed = open.processor.process(term);
        Ok(open
            .index
            .term(&processed)?
            .map_or(0, |record| record.document_frequency))
    }

    /// Normalise `term` the way the index was built (lower-case, stem).
    pub fn process_term(&self, term: &str) -> Result<String> {
        Ok(self.ready()?.processor.process(term))
    }

    /// External id and term strings of document `id`.
    ///
    /// Positions holding a term id unknown to the vocabulary (stopwords are
    /// recorded as id 0) are skipped.
    pub fn document_terms(&self, id: DocId) -> Result<(String, Vec<String>)> {
        let record = self.document(id)?;
        let index = &self.ready()?.index;

        let mut names: AHashMap<TermId, Option<String>> = AHashMap::new();
        let mut terms = Vec::with_capacity(record.terms.len());
        for term_id in record.terms {
            if !names.contains_key(&term_id) {
                let name = index.term_by_id(term_id)?.map(|(term, _)| term);
                names.insert(term_id, name);
            }
            if let Some(Some(term)) = names.get(&term_id) {
                terms.push(term.clone());
            }
        }

        Ok((record.external_id, terms))
    }

    /// Escape, tokenize and normalise free text into index terms.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let processor = &self.ready()?.processor;
        Ok(tokenize(&escape(text))?
            .iter()
            .map(|token| processor.process(token))
            .collect())
    }

    /// Mean and spread of document lengths, in one pass over the term lists.
    pub fn length_statistics(&self) -> Result<LengthStatistics> {
        let open = self.ready()?;
        let mut moments = RunningMoments::default();
        let mut minimum = u64::MAX;
        let mut maximum = 0;

        for id in open.handle.document_base..open.handle.document_maximum {
            let length = open.index.document_length(id)?;
            moments.push(length as f64);
            minimum = minimum.min(length);
            maximum = maximum.max(length);
        }

        Ok(LengthStatistics {
            documents: moments.count,
            mean: moments.mean,
            standard_deviation: moments.variance().sqrt(),
            minimum: if moments.count == 0 { 0 } else { minimum },
            maximum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_moments() {
        let mut moments = RunningMoments::default();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            moments.push(value);
        }
        assert_eq!(moments.count, 8);
        assert!((moments.mean - 5.0).abs() < 1e-12);
        assert!((moments.variance().sqrt() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_moments() {
        let moments = RunningMoments::default();
        assert_eq!(moments.variance(), 0.0);
    }
}
