//! Query-tree evaluation over positional postings.
//!
//! Countable nodes (terms and windows) are resolved to per-document match
//! extents; belief nodes (`#combine`, `#weight`) are then scored document
//! by document with the active [`RetrievalModel`].

use std::cmp::Ordering;
use std::collections::BTreeSet;

use ahash::AHashMap;
use log::debug;

use crate::analysis::QueryNode;
use crate::document::DocId;
use crate::engine::model::{CollectionStatistics, RetrievalModel, TermStatistics};
use crate::engine::{Extent, QueryAnnotation, ScoredDocument};
use crate::error::{QuiverError, Result};
use crate::repository::DiskIndex;

/// Matches of one countable expression across the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtentList {
    /// Matched extents per document, ascending and non-overlapping.
    pub documents: AHashMap<DocId, Vec<Extent>>,
}

impl ExtentList {
    /// Total matches in the collection.
    pub fn collection_frequency(&self) -> u64 {
        self.documents.values().map(|e| e.len() as u64).sum()
    }

    /// Number of documents with at least one match.
    pub fn document_frequency(&self) -> u64 {
        self.documents.len() as u64
    }

    pub fn occurrences(&self, document: DocId) -> u64 {
        self.documents.get(&document).map_or(0, |e| e.len() as u64)
    }
}

/// Belief tree with leaves already resolved against the index.
#[derive(Debug)]
enum BeliefNode {
    Leaf {
        matches: ExtentList,
        document_frequency: u64,
        collection_frequency: u64,
        query_frequency: f64,
    },
    /// Weighted children; weights are not normalised.
    Combine(Vec<(f64, BeliefNode)>),
}

impl BeliefNode {
    fn collect_documents(&self, out: &mut BTreeSet<DocId>) {
        match self {
            BeliefNode::Leaf { matches, .. } => out.extend(matches.documents.keys().copied()),
            BeliefNode::Combine(children) => {
                for (_, child) in children {
                    child.collect_documents(out);
                }
            }
        }
    }

    fn collect_extents(&self, document: DocId, out: &mut Vec<Extent>) {
        match self {
            BeliefNode::Leaf { matches, .. } => {
                if let Some(extents) = matches.documents.get(&document) {
                    out.extend_from_slice(extents);
                }
            }
            BeliefNode::Combine(children) => {
                for (_, child) in children {
                    child.collect_extents(document, out);
                }
            }
        }
    }
}

/// Evaluates processed query trees against one index.
pub struct Evaluator<'a> {
    index: &'a DiskIndex,
    model: &'a RetrievalModel,
    collection: CollectionStatistics,
}

impl<'a> Evaluator<'a> {
    pub fn new(index: &'a DiskIndex, model: &'a RetrievalModel) -> Self {
        let statistics = index.statistics();
        Evaluator {
            index,
            model,
            collection: CollectionStatistics {
                documents: statistics.document_count(),
                total_terms: statistics.total_terms,
                average_document_length: statistics.average_document_length(),
            },
        }
    }

    /// Matches of a term or window expression.
    pub fn extents(&self, node: &QueryNode) -> Result<ExtentList> {
        match node {
            QueryNode::Term { text, .. } => self.term_extents(text),
            QueryNode::OrderedWindow { width, terms } => {
                let children = self.child_extents(terms)?;
                Ok(ordered_window(&children, *width))
            }
            QueryNode::UnorderedWindow { width, terms } => {
                let children = self.child_extents(terms)?;
                Ok(unordered_window(&children, *width))
            }
            QueryNode::Combine(_) | QueryNode::Weight(_) => Err(QuiverError::query_syntax(
                format!("{node} does not produce matches"),
            )),
        }
    }

    fn child_extents(&self, terms: &[QueryNode]) -> Result<Vec<ExtentList>> {
        terms.iter().map(|term| self.extents(term)).collect()
    }

    fn term_extents(&self, text: &str) -> Result<ExtentList> {
        let mut list = ExtentList::default();
        let Some(record) = self.index.term(text)? else {
            return Ok(list);
        };

        for posting in self.index.postings(record.term_id)? {
            let extents = posting.positions.iter().map(|&p| Extent::at(p)).collect();
            list.documents.insert(posting.document, extents);
        }
        Ok(list)
    }

    /// Rank documents for `query`, keeping the best `results_requested`.
    pub fn rank(
        &self,
        query: &QueryNode,
        candidates: Option<&[DocId]>,
        results_requested: usize,
    ) -> Result<QueryAnnotation> {
        let Some(root) = self.belief_tree(query)? else {
            debug!("no query term occurs in index {}", self.index.name());
            return Ok(QueryAnnotation::new(
                query.clone(),
                Vec::new(),
                AHashMap::new(),
            ));
        };

        let documents = match candidates {
            Some(candidates) => {
                let statistics = self.index.statistics();
                let mut documents = BTreeSet::new();
                for &candidate in candidates {
                    if candidate >= statistics.base && candidate < statistics.maximum {
                        documents.insert(candidate);
                    } else {
                        debug!("skipping candidate {candidate} outside the collection");
                    }
                }
                documents
            }
            None => {
                let mut documents = BTreeSet::new();
                root.collect_documents(&mut documents);
                documents
            }
        };

        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let length = self.index.document_length(document)?;
            results.push(ScoredDocument {
                document,
                score: self.belief(&root, document, length),
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.document.cmp(&b.document))
        });
        results.truncate(results_requested);

        let mut matches = AHashMap::with_capacity(results.len());
        for result in &results {
            let mut extents = Vec::new();
            root.collect_extents(result.document, &mut extents);
            extents.sort_unstable();
            extents.dedup();
            matches.insert(result.document, extents);
        }

        Ok(QueryAnnotation::new(query.clone(), results, matches))
    }

    fn belief(&self, node: &BeliefNode, document: DocId, length: u64) -> f64 {
        match node {
            BeliefNode::Leaf {
                matches,
                document_frequency,
                collection_frequency,
                query_frequency,
            } => {
                let term = TermStatistics {
                    occurrences: matches.occurrences(document),
                    document_length: length,
                    document_frequency: *document_frequency,
                    collection_frequency: *collection_frequency,
                };
                self.model.score(&term, &self.collection, *query_frequency)
            }
            BeliefNode::Combine(children) => {
                let total: f64 = children
                    .iter()
                    .map(|(weight, child)| weight * self.belief(child, document, length))
                    .sum();
                if self.model.is_language_model() {
                    let weights: f64 = children.iter().map(|(weight, _)| weight).sum();
                    if weights > 0.0 { total / weights } else { 0.0 }
                } else {
                    total
                }
            }
        }
    }

    /// Resolve every leaf; `None` when nothing in the tree can match.
    ///
    /// Under a language model a leaf that never occurs in the collection is
    /// dropped from its parent rather than scored.
    fn belief_tree(&self, node: &QueryNode) -> Result<Option<BeliefNode>> {
        let children: Vec<(f64, &QueryNode)> = match node {
            QueryNode::Combine(children) => children.iter().map(|c| (1.0, c)).collect(),
            QueryNode::Weight(children) => children.iter().map(|(w, c)| (*w, c)).collect(),
            leaf => return self.leaf(leaf, 1.0),
        };

        let mut resolved: Vec<(f64, BeliefNode)> = Vec::with_capacity(children.len());
        if self.model.is_language_model() {
            for (weight, child) in children {
                if let Some(belief) = self.belief_tree(child)? {
                    resolved.push((weight, belief));
                }
            }
        } else {
            // Repeated leaves are scored once with their query frequency.
            let mut seen: AHashMap<String, usize> = AHashMap::new();
            let mut repeats: Vec<f64> = Vec::new();
            let mut pending: Vec<(f64, &QueryNode)> = Vec::new();
            for (weight, child) in children {
                if child.is_countable() {
                    let key = child.to_string();
                    if let Some(&slot) = seen.get(&key) {
                        repeats[slot] += 1.0;
                        continue;
                    }
                    seen.insert(key, pending.len());
                }
                repeats.push(1.0);
                pending.push((weight, child));
            }

            for ((weight, child), query_frequency) in pending.into_iter().zip(repeats) {
                let belief = if child.is_countable() {
                    self.leaf(child, query_frequency)?
                } else {
                    self.belief_tree(child)?
                };
                if let Some(belief) = belief {
                    resolved.push((weight, belief));
                }
            }
        }

        if resolved.is_empty() {
            Ok(None)
        } else {
            Ok(Some(BeliefNode::Combine(resolved)))
        }
    }

    fn leaf(&self, node: &QueryNode, query_frequency: f64) -> Result<Option<BeliefNode>> {
        let matches = self.extents(node)?;
        let collection_frequency = matches.collection_frequency();
        if collection_frequency == 0 && self.model.is_language_model() {
            debug!("dropping {node}: no occurrences");
            return Ok(None);
        }
        Ok(Some(BeliefNode::Leaf {
            document_frequency: matches.document_frequency(),
            collection_frequency,
            matches,
            query_frequency,
        }))
    }
}

/// `#odN`: each term starts at most `width - 1` positions after the
/// previous one ends. Matches are taken greedily from the left.
pub fn ordered_window(children: &[ExtentList], width: usize) -> ExtentList {
    let mut list = ExtentList::default();
    let Some((first, rest)) = children.split_first() else {
        return list;
    };
    let width = width.max(1) as u64;

    for document in shared_documents(children) {
        let mut found = Vec::new();
        let mut next_allowed = 0u32;

        for start in &first.documents[&document] {
            if start.begin < next_allowed {
                continue;
            }
            let mut previous = *start;
            let mut matched = true;
            for child in rest {
                let extents = &child.documents[&document];
                let index = extents.partition_point(|e| e.begin < previous.end);
                match extents.get(index) {
                    Some(next) if u64::from(next.begin - previous.end) < width => previous = *next,
                    _ => {
                        matched = false;
                        break;
                    }
                }
            }
            if matched {
                found.push(Extent::new(start.begin, previous.end));
                next_allowed = previous.end;
            }
        }

        if !found.is_empty() {
            list.documents.insert(document, found);
        }
    }
    list
}

/// `#uwN`: every term inside a span of at most `width` positions, in any
/// order; `None` means anywhere in the document. Matches do not overlap.
pub fn unordered_window(children: &[ExtentList], width: Option<usize>) -> ExtentList {
    let mut list = ExtentList::default();
    for document in shared_documents(children) {
        let mut starts: Vec<Extent> = children
            .iter()
            .flat_map(|child| child.documents[&document].iter().copied())
            .collect();
        starts.sort_unstable();
        starts.dedup();

        let mut found: Vec<Extent> = Vec::new();
        for start in starts {
            if found.last().is_some_and(|last| start.begin < last.end) {
                continue;
            }
            let mut end = start.end;
            let mut complete = true;
            for child in children {
                let extents = &child.documents[&document];
                let index = extents.partition_point(|e| e.begin < start.begin);
                match extents.get(index) {
                    Some(extent) => end = end.max(extent.end),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            let fits = width.is_none_or(|w| ((end - start.begin) as usize) <= w);
            if complete && fits {
                found.push(Extent::new(start.begin, end));
                if width.is_none() {
                    break;
                }
            }
        }

        if !found.is_empty() {
            list.documents.insert(document, found);
        }
    }
    list
}

/// Documents present in every child, ascending.
fn shared_documents(children: &[ExtentList]) -> Vec<DocId> {
    let Some((first, rest)) = children.split_first() else {
        return Vec::new();
    };
    let mut documents: Vec<DocId> = first
        .documents
        .keys()
        .copied()
        .filter(|d| rest.iter().all(|child| child.documents.contains_key(d)))
        .collect();
    documents.sort_unstable();
    documents
}
