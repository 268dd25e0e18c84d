//! Term dictionary for bag-of-words pipelines.
//!
//! [`Dictionary`] mirrors the interface topic-modelling libraries expect
//! (token lookup, id lookup, `doc2bow`). [`extract_dictionary`] builds one
//! from a repository, optionally keeping only the most frequent terms and
//! renumbering ids to be contiguous from zero.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;
use log::debug;

use crate::document::TermId;
use crate::error::Result;
use crate::repository::{Repository, TermDictionary};

/// Mapping between tokens and term ids plus document frequencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    token_to_id: AHashMap<String, TermId>,
    id_to_token: AHashMap<TermId, String>,
    document_frequencies: AHashMap<TermId, u64>,
}

impl From<TermDictionary> for Dictionary {
    fn from(dictionary: TermDictionary) -> Self {
        Dictionary {
            token_to_id: dictionary.term_to_id,
            id_to_token: dictionary.id_to_term,
            document_frequencies: dictionary.id_to_document_frequency,
        }
    }
}

impl Dictionary {
    /// Id of `token`, if known.
    pub fn translate_token(&self, token: &str) -> Option<TermId> {
        self.token_to_id.get(token).copied()
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Token of `id`, if known.
    pub fn token(&self, id: TermId) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    pub fn contains_id(&self, id: TermId) -> bool {
        self.id_to_token.contains_key(&id)
    }

    pub fn document_frequency(&self, id: TermId) -> Option<u64> {
        self.document_frequencies.get(&id).copied()
    }

    /// Every term id, ascending.
    pub fn ids(&self) -> Vec<TermId> {
        let mut ids: Vec<TermId> = self.id_to_token.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    /// `(id, count)` pairs of the known tokens in `document`, ascending by id.
    ///
    /// ```
    /// use quiver::dictionary::Dictionary;
    /// use quiver::repository::TermDictionary;
    ///
    /// let mut terms = TermDictionary::default();
    /// for (token, id) in [("cat", 1), ("dog", 2)] {
    ///     terms.term_to_id.insert(token.to_string(), id);
    ///     terms.id_to_term.insert(id, token.to_string());
    ///     terms.id_to_document_frequency.insert(id, 1);
    /// }
    /// let dictionary = Dictionary::from(terms);
    /// assert_eq!(dictionary.doc2bow(["dog", "cat", "dog", "emu"]), vec![(1, 1), (2, 2)]);
    /// ```
    pub fn doc2bow<I, S>(&self, document: I) -> Vec<(TermId, u64)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for token in document {
            if let Some(id) = self.translate_token(token.as_ref()) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts.into_iter().collect()
    }

    /// Like [`Dictionary::doc2bow`] for documents already given as term ids.
    pub fn ids2bow<I: IntoIterator<Item = TermId>>(&self, document: I) -> Vec<(TermId, u64)> {
        let mut counts = BTreeMap::new();
        for id in document {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    /// Keep only the given ids.
    fn retain(&mut self, keep: impl Fn(TermId) -> bool) {
        self.token_to_id.retain(|_, id| keep(*id));
        self.id_to_token.retain(|id, _| keep(*id));
        self.document_frequencies.retain(|id, _| keep(*id));
    }

    /// Renumber ids to `0..len` in ascending order of the current ids.
    ///
    /// Returns the old-to-new id mapping.
    fn make_contiguous(&mut self) -> AHashMap<TermId, TermId> {
        let mapping: AHashMap<TermId, TermId> = self
            .ids()
            .into_iter()
            .enumerate()
            .map(|(new, old)| (old, new as TermId))
            .collect();

        let id_to_token: AHashMap<TermId, String> = self
            .id_to_token
            .drain()
            .map(|(old, token)| (mapping[&old], token))
            .collect();
        self.token_to_id = id_to_token
            .iter()
            .map(|(id, token)| (token.clone(), *id))
            .collect();
        self.document_frequencies = self
            .document_frequencies
            .drain()
            .map(|(old, df)| (mapping[&old], df))
            .collect();
        self.id_to_token = id_to_token;

        mapping
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dictionary({} unique tokens)", self.len())
    }
}

/// Build a [`Dictionary`] from `repository`.
///
/// With `max_terms`, only the terms with the highest collection frequency
/// are kept (ties go to the lower id). With `make_contiguous`, ids are
/// renumbered from zero and the repository-to-dictionary id mapping is
/// returned alongside.
pub fn extract_dictionary(
    repository: &Repository,
    max_terms: Option<usize>,
    make_contiguous: bool,
) -> Result<(Dictionary, Option<AHashMap<TermId, TermId>>)> {
    debug!("extracting dictionary from {repository}");
    let mut dictionary = Dictionary::from(repository.build_dictionary()?);

    if let Some(max_terms) = max_terms.filter(|n| *n > 0) {
        let frequencies = repository.build_term_frequencies()?;
        let mut ranked: Vec<(TermId, u64)> = frequencies.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(max_terms);

        let keep: ahash::AHashSet<TermId> = ranked.into_iter().map(|(id, _)| id).collect();
        dictionary.retain(|id| keep.contains(&id));
    }

    let mapping = make_contiguous.then(|| dictionary.make_contiguous());
    Ok((dictionary, mapping))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        let mut terms = TermDictionary::default();
        for (token, id, df) in [("apple", 4, 2), ("banana", 9, 1), ("cherry", 7, 3)] {
            terms.term_to_id.insert(token.to_string(), id);
            terms.id_to_term.insert(id, token.to_string());
            terms.id_to_document_frequency.insert(id, df);
        }
        Dictionary::from(terms)
    }

    #[test]
    fn test_lookups() {
        let dictionary = sample();
        assert_eq!(dictionary.translate_token("cherry"), Some(7));
        assert_eq!(dictionary.translate_token("durian"), None);
        assert!(dictionary.has_token("apple"));
        assert_eq!(dictionary.token(9), Some("banana"));
        assert!(!dictionary.contains_id(5));
        assert_eq!(dictionary.document_frequency(7), Some(3));
        assert_eq!(dictionary.ids(), vec![4, 7, 9]);
        assert_eq!(dictionary.to_string(), "Dictionary(3 unique tokens)");
    }

    #[test]
    fn test_ids2bow() {
        assert_eq!(sample().ids2bow([9, 4, 9]), vec![(4, 1), (9, 2)]);
    }

    #[test]
    fn test_make_contiguous() {
        let mut dictionary = sample();
        let mapping = dictionary.make_contiguous();

        assert_eq!(mapping[&4], 0);
        assert_eq!(mapping[&7], 1);
        assert_eq!(mapping[&9], 2);
        assert_eq!(dictionary.translate_token("banana"), Some(2));
        assert_eq!(dictionary.token(1), Some("cherry"));
        assert_eq!(dictionary.document_frequency(0), Some(2));
    }

    #[test]
    fn test_retain() {
        let mut dictionary = sample();
        dictionary.retain(|id| id != 7);
        assert_eq!(dictionary.len(), 2);
        assert!(!dictionary.has_token("cherry"));
        assert_eq!(dictionary.document_frequency(7), None);
    }
}
