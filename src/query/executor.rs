//! Per-call query execution.
//!
//! Each call walks `Validate → ResolveCandidates → Execute →
//! CollectSnippets → Assemble`; snippet collection only runs when the
//! request asks for it. Engine failures are reported as
//! [`QuiverError::Retrieval`] and never yield partial results.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, warn};

use crate::document::DocId;
use crate::engine::{QueryAnnotation, RankingEngine};
use crate::error::{QuiverError, Result};
use crate::query::snippet::{SnippetConfig, build_snippet};
use crate::query::{QueryOutcome, QueryRequest, ScoredResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validate,
    ResolveCandidates,
    Execute,
    CollectSnippets,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::ResolveCandidates => "resolve-candidates",
            Stage::Execute => "execute",
            Stage::CollectSnippets => "collect-snippets",
            Stage::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// Run `request` against `engine`.
pub fn execute(engine: &dyn RankingEngine, request: &QueryRequest) -> Result<QueryOutcome> {
    debug!("[{}] {:?}", Stage::Validate, request.text());
    let results_requested = validate(request)?;

    let candidates = resolve_candidates(request);

    debug!("[{}] up to {results_requested} results", Stage::Execute);
    let annotation = engine
        .run_annotated_query(request.text(), candidates.as_deref(), results_requested)
        .map_err(|e| QuiverError::retrieval(e.to_string()))?;

    let snippets = if request.wants_snippets() {
        Some(collect_snippets(
            engine,
            &annotation,
            request.snippet_settings(),
        )?)
    } else {
        None
    };

    Ok(assemble(annotation, snippets))
}

fn validate(request: &QueryRequest) -> Result<usize> {
    if request.text().trim().is_empty() {
        return Err(QuiverError::invalid_argument("query text is empty"));
    }

    match request.resolved_results_requested() {
        0 => Err(QuiverError::invalid_argument(
            "results_requested must be positive",
        )),
        n => Ok(n),
    }
}

fn resolve_candidates(request: &QueryRequest) -> Option<Vec<DocId>> {
    let candidates = request.candidates()?;
    let unique: BTreeSet<DocId> = candidates.iter().copied().collect();
    debug!(
        "[{}] {} candidates ({} distinct)",
        Stage::ResolveCandidates,
        candidates.len(),
        unique.len()
    );
    Some(unique.into_iter().collect())
}

/// One snippet per result, in rank order.
///
/// A failed fetch degrades to no snippets; results without any snippet are
/// an error, an empty result list is not.
fn collect_snippets(
    engine: &dyn RankingEngine,
    annotation: &QueryAnnotation,
    config: &SnippetConfig,
) -> Result<Vec<String>> {
    let results = annotation.results();
    if results.is_empty() {
        return Ok(Vec::new());
    }

    let documents: Vec<DocId> = results.iter().map(|r| r.document).collect();
    let snippets = match engine.fetch_documents(&documents) {
        Ok(parsed) if parsed.len() == documents.len() => documents
            .iter()
            .zip(&parsed)
            .map(|(&document, parsed)| build_snippet(document, parsed, annotation, config))
            .collect(),
        Ok(parsed) => {
            warn!(
                "[{}] engine returned {} documents for {} results; no snippets",
                Stage::CollectSnippets,
                parsed.len(),
                documents.len()
            );
            Vec::new()
        }
        Err(e) => {
            warn!("[{}] {e}; no snippets", Stage::CollectSnippets);
            Vec::new()
        }
    };

    if snippets.is_empty() {
        return Err(QuiverError::snippet_unavailable(format!(
            "no snippets could be built for {} results",
            results.len()
        )));
    }
    Ok(snippets)
}

fn assemble(annotation: QueryAnnotation, snippets: Option<Vec<String>>) -> QueryOutcome {
    let mut snippets = snippets.map(Vec::into_iter);
    let results = annotation
        .results()
        .iter()
        .map(|scored| ScoredResult {
            document: scored.document,
            score: scored.score,
            snippet: snippets.as_mut().and_then(Iterator::next),
        })
        .collect::<Vec<_>>();

    debug!("[{}] {} results", Stage::Assemble, results.len());
    drop(annotation);
    QueryOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;

    use super::*;
    use crate::analysis::QueryNode;
    use crate::document::ParsedDocument;
    use crate::engine::{EngineError, EngineResult, Extent, ScoredDocument};

    #[derive(Debug, Default)]
    struct MockEngine {
        fail_query: bool,
        fail_fetch: bool,
    }

    impl RankingEngine for MockEngine {
        fn run_annotated_query(
            &self,
            query: &str,
            candidates: Option<&[DocId]>,
            results_requested: usize,
        ) -> EngineResult<QueryAnnotation> {
            if self.fail_query {
                return Err(EngineError::Index("postings unreadable".to_string()));
            }
            let mut results = vec![
                ScoredDocument {
                    document: 2,
                    score: -1.0,
                },
                ScoredDocument {
                    document: 1,
                    score: -2.0,
                },
            ];
            if let Some(candidates) = candidates {
                results.retain(|r| candidates.contains(&r.document));
            }
            results.truncate(results_requested);

            let mut matches = AHashMap::new();
            matches.insert(1, vec![Extent::at(0)]);
            matches.insert(2, vec![Extent::at(1)]);
            Ok(QueryAnnotation::new(QueryNode::term(query), results, matches))
        }

        fn fetch_documents(&self, documents: &[DocId]) -> EngineResult<Vec<ParsedDocument>> {
            if self.fail_fetch {
                return Err(EngineError::Fetch("no stored text".to_string()));
            }
            Ok(documents
                .iter()
                .map(|d| ParsedDocument::from_text(format!("doc{d}"), "cat dog"))
                .collect())
        }
    }

    #[test]
    fn test_results_in_engine_order() {
        let outcome = execute(&MockEngine::default(), &QueryRequest::new("cat")).unwrap();
        assert_eq!(outcome.scores(), vec![(2, -1.0), (1, -2.0)]);
        assert!(outcome.results().iter().all(|r| r.snippet.is_none()));
    }

    #[test]
    fn test_validation() {
        let engine = MockEngine::default();
        assert!(matches!(
            execute(&engine, &QueryRequest::new("  ")),
            Err(QuiverError::InvalidArgument(_))
        ));
        assert!(matches!(
            execute(&engine, &QueryRequest::new("cat").results_requested(0)),
            Err(QuiverError::InvalidArgument(_))
        ));
        assert!(matches!(
            execute(&engine, &QueryRequest::new("cat").document_set(Vec::<u64>::new())),
            Err(QuiverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_candidates_forwarded() {
        let request = QueryRequest::new("cat").document_set([1_i64, 1, -4]);
        let outcome = execute(&MockEngine::default(), &request).unwrap();
        assert_eq!(outcome.scores(), vec![(1, -2.0)]);
    }

    #[test]
    fn test_engine_error_maps_to_retrieval() {
        let engine = MockEngine {
            fail_query: true,
            ..Default::default()
        };
        match execute(&engine, &QueryRequest::new("cat")) {
            Err(QuiverError::Retrieval(message)) => assert!(message.contains("postings unreadable")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_snippets() {
        let request = QueryRequest::new("cat").include_snippets(true);
        let outcome = execute(&MockEngine::default(), &request).unwrap();
        let snippets: Vec<_> = outcome
            .results()
            .iter()
            .map(|r| r.snippet.clone().unwrap())
            .collect();
        assert_eq!(snippets, vec!["cat DOG", "CAT dog"]);
    }

    #[test]
    fn test_fetch_failure_is_snippet_unavailable() {
        let engine = MockEngine {
            fail_fetch: true,
            ..Default::default()
        };
        let request = QueryRequest::new("cat").include_snippets(true);
        assert!(matches!(
            execute(&engine, &request),
            Err(QuiverError::SnippetUnavailable(_))
        ));
    }

    #[test]
    fn test_no_results_with_snippets_is_ok() {
        let request = QueryRequest::new("cat")
            .document_set([7_u64])
            .include_snippets(true);
        let outcome = execute(&MockEngine::default(), &request).unwrap();
        assert!(outcome.is_empty());
    }
}
