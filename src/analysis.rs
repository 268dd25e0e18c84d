//! Term analysis for Quiver.
//!
//! This module provides what is needed to turn user text into the terms a
//! repository was indexed with: the query-language parser, tokenizers,
//! stemmers, and [`TermProcessor`] which applies the repository's
//! normalisation.

use std::fmt;
use std::sync::Arc;

pub mod query_parser;
pub mod stemmer;
pub mod tokenizer;

pub use query_parser::{QueryNode, parse_query};
pub use stemmer::{IdentityStemmer, KrovetzStemmer, PorterStemmer, Stemmer, StemmerKind, stem};
pub use tokenizer::{TextToken, escape, tokenize, tokenize_text};

/// Normalises a term exactly as the index did: lower-case, then stem.
#[derive(Clone)]
pub struct TermProcessor {
    stemmer: Arc<dyn Stemmer>,
}

impl TermProcessor {
    /// Processor for a repository built with `kind` (`None` for no stemming).
    pub fn new(kind: Option<StemmerKind>) -> Self {
        match kind {
            Some(kind) => Self::with_stemmer(kind.build()),
            None => Self::with_stemmer(Arc::new(IdentityStemmer::new())),
        }
    }

    pub fn with_stemmer(stemmer: Arc<dyn Stemmer>) -> Self {
        TermProcessor { stemmer }
    }

    /// Normalise one term.
    pub fn process(&self, term: &str) -> String {
        self.stemmer.stem(&term.to_lowercase())
    }

    /// Name of the configured stemmer.
    pub fn stemmer_name(&self) -> &'static str {
        self.stemmer.name()
    }
}

impl Default for TermProcessor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for TermProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermProcessor")
            .field("stemmer", &self.stemmer.name())
            .finish()
    }
}
