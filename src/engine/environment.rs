//! Query environments: a retrieval model bound to an open repository.

use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::analysis::{QueryNode, TermProcessor, parse_query};
use crate::document::{DocId, ParsedDocument};
use crate::engine::evaluator::Evaluator;
use crate::engine::model::RetrievalModel;
use crate::engine::{EngineError, EngineResult, QueryAnnotation, RankingEngine};
use crate::error::{QuiverError, Result};
use crate::query::executor;
use crate::query::{QueryOutcome, QueryRequest};
use crate::repository::{CollectionStore, DiskIndex, Repository};

/// Ranks documents of one repository with one [`RetrievalModel`].
///
/// Environments share the repository's stores, so creating several with
/// different models is cheap. An environment keeps the stores alive even
/// after the repository that created it is closed.
///
/// ```no_run
/// use quiver::engine::QueryEnvironment;
/// use quiver::query::QueryRequest;
///
/// # fn main() -> quiver::error::Result<()> {
/// let repository = quiver::open("/data/robust04")?;
/// let okapi = QueryEnvironment::okapi(&repository, 1.2, 0.75, 7.0)?;
/// let outcome = okapi.query(&QueryRequest::new("airbus subsidies"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueryEnvironment {
    index: Arc<DiskIndex>,
    collection: Arc<CollectionStore>,
    processor: TermProcessor,
    model: RetrievalModel,
}

impl QueryEnvironment {
    pub(crate) fn from_parts(
        index: Arc<DiskIndex>,
        collection: Arc<CollectionStore>,
        processor: TermProcessor,
        model: RetrievalModel,
    ) -> Self {
        QueryEnvironment {
            index,
            collection,
            processor,
            model,
        }
    }

    pub fn new(repository: &Repository, model: RetrievalModel) -> Result<Self> {
        let open = repository.ready()?;
        Ok(Self::from_parts(
            Arc::clone(&open.index),
            Arc::clone(&open.collection),
            open.processor.clone(),
            model,
        ))
    }

    /// Environment configured from Indri smoothing rules.
    ///
    /// No rule selects the default model; more than one is rejected since a
    /// repository has a single text field.
    pub fn with_rules<S: AsRef<str>>(repository: &Repository, rules: &[S]) -> Result<Self> {
        let model = match rules {
            [] => RetrievalModel::default(),
            [rule] => RetrievalModel::parse_rule(rule.as_ref())?,
            _ => {
                return Err(QuiverError::invalid_argument(format!(
                    "expected at most one smoothing rule, got {}",
                    rules.len()
                )));
            }
        };
        Self::new(repository, model)
    }

    /// TF-IDF baseline.
    pub fn tfidf(repository: &Repository, k1: f64, b: f64) -> Result<Self> {
        Self::new(repository, RetrievalModel::tfidf(k1, b)?)
    }

    /// Okapi BM25 baseline.
    pub fn okapi(repository: &Repository, k1: f64, b: f64, k3: f64) -> Result<Self> {
        Self::new(repository, RetrievalModel::okapi(k1, b, k3)?)
    }

    pub fn model(&self) -> &RetrievalModel {
        &self.model
    }

    /// Run a ranked query.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        executor::execute(self, request)
    }

    /// Matches of a single term or window expression per document, keyed by
    /// external id. Documents without a match are absent.
    ///
    /// A top-level `#combine` of one child is unwrapped, so `#combine(a)` and
    /// `a` are equivalent; anything else that is not a term or window is an
    /// [`QuiverError::InvalidArgument`].
    pub fn expression_list(&self, expression: &str) -> Result<AHashMap<String, u64>> {
        let mut node = self.prepare(expression)?;
        if let QueryNode::Combine(children) = &mut node {
            if children.len() == 1 {
                node = children.remove(0);
            }
        }
        if !node.is_countable() {
            return Err(QuiverError::invalid_argument(format!(
                "{node} is not a term or window expression"
            )));
        }

        let matches = Evaluator::new(&self.index, &self.model).extents(&node)?;
        let mut counts = AHashMap::with_capacity(matches.documents.len());
        for (document, extents) in matches.documents {
            let external_id = self.collection.external_id(document)?;
            *counts.entry(external_id).or_insert(0) += extents.len() as u64;
        }

        debug!("expression {node} matched in {} documents", counts.len());
        Ok(counts)
    }

    /// Parse `query` and normalise its terms the way the index was built.
    fn prepare(&self, query: &str) -> Result<QueryNode> {
        let mut node = parse_query(query)?;
        node.map_terms(&|term| self.processor.process(term));
        Ok(node)
    }
}

impl RankingEngine for QueryEnvironment {
    fn run_annotated_query(
        &self,
        query: &str,
        candidates: Option<&[DocId]>,
        results_requested: usize,
    ) -> EngineResult<QueryAnnotation> {
        let node = self
            .prepare(query)
            .map_err(|e| EngineError::Parse(e.to_string()))?;
        debug!("evaluating {node} with {}", self.model);

        Evaluator::new(&self.index, &self.model)
            .rank(&node, candidates, results_requested)
            .map_err(|e| EngineError::Index(e.to_string()))
    }

    fn fetch_documents(&self, documents: &[DocId]) -> EngineResult<Vec<ParsedDocument>> {
        documents
            .iter()
            .map(|&document| {
                self.collection
                    .parsed_document(document)
                    .map_err(|e| EngineError::Fetch(e.to_string()))
            })
            .collect()
    }
}
