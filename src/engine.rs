//! Ranking engine contract and the built-in on-disk implementation.
//!
//! The query executor talks to an engine only through [`RankingEngine`]:
//! run a query (optionally restricted to a candidate set) and return the
//! ranked documents with the positions that matched, then fetch parsed
//! documents for snippets. [`QueryEnvironment`] implements it over a
//! repository's index with query-likelihood or baseline scoring.

use std::fmt;

use ahash::AHashMap;
use thiserror::Error;

use crate::analysis::QueryNode;
use crate::document::{DocId, ParsedDocument};

pub mod environment;
pub mod evaluator;
pub mod model;

pub use environment::QueryEnvironment;
pub use model::RetrievalModel;

/// Half-open range `[begin, end)` of term positions in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extent {
    pub begin: u32,
    pub end: u32,
}

impl Extent {
    pub fn new(begin: u32, end: u32) -> Self {
        Extent { begin, end }
    }

    /// Single-position extent.
    pub fn at(position: u32) -> Self {
        Extent {
            begin: position,
            end: position + 1,
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    pub fn contains(&self, position: u32) -> bool {
        position >= self.begin && position < self.end
    }
}

/// One ranked document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument {
    pub document: DocId,
    pub score: f64,
}

/// Ranked results of one query plus the extents that matched in each
/// result document.
#[derive(Debug, Clone)]
pub struct QueryAnnotation {
    query: QueryNode,
    results: Vec<ScoredDocument>,
    matches: AHashMap<DocId, Vec<Extent>>,
}

impl QueryAnnotation {
    pub fn new(
        query: QueryNode,
        results: Vec<ScoredDocument>,
        matches: AHashMap<DocId, Vec<Extent>>,
    ) -> Self {
        QueryAnnotation {
            query,
            results,
            matches,
        }
    }

    /// The parsed, normalised query that was evaluated.
    pub fn query(&self) -> &QueryNode {
        &self.query
    }

    /// Results in rank order.
    pub fn results(&self) -> &[ScoredDocument] {
        &self.results
    }

    /// Matched extents in `document`, ascending.
    pub fn matches(&self, document: DocId) -> &[Extent] {
        self.matches.get(&document).map_or(&[], Vec::as_slice)
    }
}

/// Failure inside a ranking engine.
///
/// Never escapes the query executor, which reports it as
/// [`crate::error::QuiverError::Retrieval`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("cannot parse query: {0}")]
    Parse(String),

    #[error("index read failed: {0}")]
    Index(String),

    #[error("cannot fetch documents: {0}")]
    Fetch(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Query evaluation as seen by the executor.
pub trait RankingEngine: Send + Sync + fmt::Debug {
    /// Rank documents for `query`.
    ///
    /// With `candidates`, exactly those documents are scored (ids outside
    /// the collection are ignored); otherwise every document with a match is
    /// eligible. At most `results_requested` results are returned, best
    /// first, ties broken by ascending document id.
    fn run_annotated_query(
        &self,
        query: &str,
        candidates: Option<&[DocId]>,
        results_requested: usize,
    ) -> EngineResult<QueryAnnotation>;

    /// Parsed text of `documents`, in the same order.
    fn fetch_documents(&self, documents: &[DocId]) -> EngineResult<Vec<ParsedDocument>>;
}
