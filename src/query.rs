//! Ranked query execution.
//!
//! A [`QueryRequest`] describes one query; [`executor::execute`] runs it
//! against any [`crate::engine::RankingEngine`] and returns a
//! [`QueryOutcome`] in the engine's rank order.

use log::debug;

use crate::document::DocId;

pub mod executor;
pub mod snippet;

pub use snippet::{SnippetConfig, build_snippet};

/// Results requested when neither a count nor a candidate set is given.
pub const DEFAULT_RESULTS_REQUESTED: usize = 100;

/// One ranked query.
///
/// ```
/// use quiver::query::QueryRequest;
///
/// let request = QueryRequest::new("#od1(new york) times")
///     .document_set([4_i64, 9, -1])
///     .include_snippets(true);
/// assert_eq!(request.candidates(), Some(&[4, 9][..]));
/// assert_eq!(request.resolved_results_requested(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    text: String,
    candidates: Option<Vec<DocId>>,
    results_requested: Option<usize>,
    include_snippets: bool,
    snippet_config: SnippetConfig,
}

impl QueryRequest {
    pub fn new<S: Into<String>>(text: S) -> Self {
        QueryRequest {
            text: text.into(),
            candidates: None,
            results_requested: None,
            include_snippets: false,
            snippet_config: SnippetConfig::default(),
        }
    }

    /// Restrict evaluation to these documents; every one of them is scored.
    ///
    /// Ids that do not convert to a [`DocId`] (negative values) are skipped.
    pub fn document_set<I, T>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: TryInto<DocId> + Copy + std::fmt::Debug,
    {
        let mut candidates = Vec::new();
        for document in documents {
            match document.try_into() {
                Ok(id) => candidates.push(id),
                Err(_) => debug!("skipping candidate {document:?}: not a document id"),
            }
        }
        self.candidates = Some(candidates);
        self
    }

    /// Maximum number of results. Defaults to the candidate-set size, or
    /// [`DEFAULT_RESULTS_REQUESTED`] without one.
    pub fn results_requested(mut self, results_requested: usize) -> Self {
        self.results_requested = Some(results_requested);
        self
    }

    /// Attach a plain-text snippet to every result.
    pub fn include_snippets(mut self, include_snippets: bool) -> Self {
        self.include_snippets = include_snippets;
        self
    }

    pub fn snippet_config(mut self, snippet_config: SnippetConfig) -> Self {
        self.snippet_config = snippet_config;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn candidates(&self) -> Option<&[DocId]> {
        self.candidates.as_deref()
    }

    pub fn wants_snippets(&self) -> bool {
        self.include_snippets
    }

    pub fn snippet_settings(&self) -> &SnippetConfig {
        &self.snippet_config
    }

    /// The result count after defaulting.
    pub fn resolved_results_requested(&self) -> usize {
        match (self.results_requested, &self.candidates) {
            (Some(n), _) => n,
            (None, Some(candidates)) => candidates.len(),
            (None, None) => DEFAULT_RESULTS_REQUESTED,
        }
    }
}

/// One ranked document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub document: DocId,
    pub score: f64,
    pub snippet: Option<String>,
}

/// Results of one query, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    results: Vec<ScoredResult>,
}

impl QueryOutcome {
    pub fn new(results: Vec<ScoredResult>) -> Self {
        QueryOutcome { results }
    }

    pub fn results(&self) -> &[ScoredResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `(document, score)` pairs in rank order.
    pub fn scores(&self) -> Vec<(DocId, f64)> {
        self.results.iter().map(|r| (r.document, r.score)).collect()
    }

    pub fn into_results(self) -> Vec<ScoredResult> {
        self.results
    }
}

impl IntoIterator for QueryOutcome {
    type Item = ScoredResult;
    type IntoIter = std::vec::IntoIter<ScoredResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
