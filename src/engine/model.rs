//! Retrieval models and their per-term scoring functions.
//!
//! Query-likelihood models produce log probabilities (always negative);
//! the TF-IDF and Okapi baselines produce non-negative sums.

use std::fmt;

use crate::error::{QuiverError, Result};

/// Default Dirichlet prior.
pub const DEFAULT_MU: f64 = 2500.0;

/// Default linear smoothing weight on the collection model.
pub const DEFAULT_COLLECTION_LAMBDA: f64 = 0.4;

pub const DEFAULT_K1: f64 = 1.2;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_K3: f64 = 7.0;

/// Collection-wide counts a model needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionStatistics {
    pub documents: u64,
    pub total_terms: u64,
    pub average_document_length: f64,
}

/// Counts for one (term or window, document) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStatistics {
    /// Matches in the document.
    pub occurrences: u64,
    pub document_length: u64,
    pub document_frequency: u64,
    pub collection_frequency: u64,
}

/// How documents are scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalModel {
    /// Query likelihood with Dirichlet smoothing.
    Dirichlet { mu: f64 },
    /// Query likelihood with linear (Jelinek-Mercer) smoothing.
    ///
    /// `document_lambda` only matters for extent-level smoothing and is
    /// ignored when scoring whole documents.
    JelinekMercer {
        collection_lambda: f64,
        document_lambda: f64,
    },
    /// TF-IDF baseline with BM25-style length normalisation.
    TfIdf { k1: f64, b: f64 },
    /// Okapi BM25 baseline.
    Okapi { k1: f64, b: f64, k3: f64 },
}

impl Default for RetrievalModel {
    fn default() -> Self {
        RetrievalModel::Dirichlet { mu: DEFAULT_MU }
    }
}

impl RetrievalModel {
    pub fn tfidf(k1: f64, b: f64) -> Result<Self> {
        RetrievalModel::TfIdf { k1, b }.validated()
    }

    pub fn okapi(k1: f64, b: f64, k3: f64) -> Result<Self> {
        RetrievalModel::Okapi { k1, b, k3 }.validated()
    }

    /// Parse an Indri smoothing rule.
    ///
    /// A rule is a comma-separated list of `key:value` pairs, for example
    /// `method:dirichlet,mu:1000` or `method:linear,collectionLambda:0.2`.
    /// A leading bare `tfidf` or `okapi` selects a baseline, whose
    /// parameters follow as `k1:`, `b:` and `k3:`.
    ///
    /// ```
    /// use quiver::engine::RetrievalModel;
    ///
    /// let model = RetrievalModel::parse_rule("method:dirichlet,mu:1000").unwrap();
    /// assert_eq!(model, RetrievalModel::Dirichlet { mu: 1000.0 });
    /// ```
    pub fn parse_rule(rule: &str) -> Result<Self> {
        let mut parts = rule
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .peekable();

        let mut model = match parts.peek().map(|part| part.to_ascii_lowercase()) {
            Some(ref first) if first == "tfidf" => {
                parts.next();
                RetrievalModel::TfIdf {
                    k1: DEFAULT_K1,
                    b: DEFAULT_B,
                }
            }
            Some(ref first) if first == "okapi" => {
                parts.next();
                RetrievalModel::Okapi {
                    k1: DEFAULT_K1,
                    b: DEFAULT_B,
                    k3: DEFAULT_K3,
                }
            }
            Some(_) => RetrievalModel::default(),
            None => return Err(QuiverError::invalid_argument("empty retrieval rule")),
        };

        for part in parts {
            let (key, value) = part.split_once(':').ok_or_else(|| {
                QuiverError::invalid_argument(format!("rule component {part:?} is not key:value"))
            })?;
            model = model.with_parameter(key.trim(), value.trim())?;
        }

        model.validated()
    }

    fn with_parameter(self, key: &str, value: &str) -> Result<Self> {
        let key = key.to_ascii_lowercase();

        if key == "method" {
            return match value.to_ascii_lowercase().as_str() {
                "dirichlet" | "dir" | "d" => Ok(RetrievalModel::Dirichlet { mu: DEFAULT_MU }),
                "linear" | "jm" | "jelinek-mercer" => Ok(RetrievalModel::JelinekMercer {
                    collection_lambda: DEFAULT_COLLECTION_LAMBDA,
                    document_lambda: 0.0,
                }),
                other => Err(QuiverError::invalid_argument(format!(
                    "unknown smoothing method {other:?}"
                ))),
            };
        }

        let number: f64 = value.parse().map_err(|_| {
            QuiverError::invalid_argument(format!("rule parameter {key} has non-numeric value {value:?}"))
        })?;

        match (self, key.as_str()) {
            (RetrievalModel::Dirichlet { .. }, "mu") => Ok(RetrievalModel::Dirichlet { mu: number }),
            (
                RetrievalModel::JelinekMercer {
                    document_lambda, ..
                },
                "collectionlambda" | "lambda",
            ) => Ok(RetrievalModel::JelinekMercer {
                collection_lambda: number,
                document_lambda,
            }),
            (
                RetrievalModel::JelinekMercer {
                    collection_lambda, ..
                },
                "documentlambda",
            ) => Ok(RetrievalModel::JelinekMercer {
                collection_lambda,
                document_lambda: number,
            }),
            (RetrievalModel::TfIdf { b, .. }, "k1") => Ok(RetrievalModel::TfIdf { k1: number, b }),
            (RetrievalModel::TfIdf { k1, .. }, "b") => Ok(RetrievalModel::TfIdf { k1, b: number }),
            (RetrievalModel::Okapi { b, k3, .. }, "k1") => {
                Ok(RetrievalModel::Okapi { k1: number, b, k3 })
            }
            (RetrievalModel::Okapi { k1, k3, .. }, "b") => {
                Ok(RetrievalModel::Okapi { k1, b: number, k3 })
            }
            (RetrievalModel::Okapi { k1, b, .. }, "k3") => {
                Ok(RetrievalModel::Okapi { k1, b, k3: number })
            }
            (model, key) => Err(QuiverError::invalid_argument(format!(
                "parameter {key} does not apply to {model}"
            ))),
        }
    }

    fn validated(self) -> Result<Self> {
        let valid = match self {
            RetrievalModel::Dirichlet { mu } => mu.is_finite() && mu >= 0.0,
            RetrievalModel::JelinekMercer {
                collection_lambda,
                document_lambda,
            } => (0.0..=1.0).contains(&collection_lambda) && (0.0..=1.0).contains(&document_lambda),
            RetrievalModel::TfIdf { k1, b } => k1.is_finite() && k1 >= 0.0 && (0.0..=1.0).contains(&b),
            RetrievalModel::Okapi { k1, b, k3 } => {
                k1.is_finite()
                    && k1 >= 0.0
                    && (0.0..=1.0).contains(&b)
                    && k3.is_finite()
                    && k3 >= 0.0
            }
        };

        if valid {
            Ok(self)
        } else {
            Err(QuiverError::invalid_argument(format!(
                "parameters out of range: {self}"
            )))
        }
    }

    /// Whether scores are log probabilities combined by (weighted) averaging.
    pub fn is_language_model(&self) -> bool {
        matches!(
            self,
            RetrievalModel::Dirichlet { .. } | RetrievalModel::JelinekMercer { .. }
        )
    }

    /// Score of one term in one document.
    ///
    /// `query_frequency` is the number of times the term occurs in the
    /// query; only the baselines use it.
    pub fn score(
        &self,
        term: &TermStatistics,
        collection: &CollectionStatistics,
        query_frequency: f64,
    ) -> f64 {
        let tf = term.occurrences as f64;
        let length = term.document_length as f64;

        match *self {
            RetrievalModel::Dirichlet { mu } => {
                let background = collection_probability(term, collection);
                let denominator = length + mu;
                if denominator <= 0.0 {
                    return f64::MIN_POSITIVE.ln();
                }
                ((tf + mu * background) / denominator)
                    .max(f64::MIN_POSITIVE)
                    .ln()
            }
            RetrievalModel::JelinekMercer {
                collection_lambda, ..
            } => {
                let background = collection_probability(term, collection);
                let foreground = if length > 0.0 { tf / length } else { 0.0 };
                ((1.0 - collection_lambda) * foreground + collection_lambda * background)
                    .max(f64::MIN_POSITIVE)
                    .ln()
            }
            RetrievalModel::TfIdf { k1, b } => {
                if tf == 0.0 {
                    return 0.0;
                }
                let n = collection.documents as f64;
                let idf = ((n + 1.0) / (term.document_frequency as f64 + 0.5)).ln();
                let tf_weight = k1 * tf / (tf + k1 * length_norm(b, length, collection));
                let query_weight = idf * query_frequency;
                query_weight * idf * tf_weight
            }
            RetrievalModel::Okapi { k1, b, k3 } => {
                if tf == 0.0 {
                    return 0.0;
                }
                let n = collection.documents as f64;
                let df = term.document_frequency as f64;
                let idf = ((n - df + 0.5) / (df + 0.5)).ln();
                let tf_weight = (k1 + 1.0) * tf / (tf + k1 * length_norm(b, length, collection));
                let query_weight = (k3 + 1.0) * query_frequency / (k3 + query_frequency);
                idf * tf_weight * query_weight
            }
        }
    }
}

fn collection_probability(term: &TermStatistics, collection: &CollectionStatistics) -> f64 {
    if collection.total_terms == 0 {
        0.0
    } else {
        term.collection_frequency as f64 / collection.total_terms as f64
    }
}

fn length_norm(b: f64, length: f64, collection: &CollectionStatistics) -> f64 {
    if collection.average_document_length > 0.0 {
        1.0 - b + b * length / collection.average_document_length
    } else {
        1.0
    }
}

impl fmt::Display for RetrievalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalModel::Dirichlet { mu } => write!(f, "method:dirichlet,mu:{mu}"),
            RetrievalModel::JelinekMercer {
                collection_lambda,
                document_lambda,
            } => write!(
                f,
                "method:linear,collectionLambda:{collection_lambda},documentLambda:{document_lambda}"
            ),
            RetrievalModel::TfIdf { k1, b } => write!(f, "tfidf,k1:{k1},b:{b}"),
            RetrievalModel::Okapi { k1, b, k3 } => write!(f, "okapi,k1:{k1},b:{b},k3:{k3}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lorem_collection() -> CollectionStatistics {
        CollectionStatistics {
            documents: 3,
            total_terms: 96,
            average_document_length: 32.0,
        }
    }

    #[test]
    fn test_parse_rules() {
        assert_eq!(
            RetrievalModel::parse_rule("method:dirichlet,mu:1000").unwrap(),
            RetrievalModel::Dirichlet { mu: 1000.0 }
        );
        assert_eq!(
            RetrievalModel::parse_rule("method:linear,collectionLambda:0.2,documentLambda:0.1")
                .unwrap(),
            RetrievalModel::JelinekMercer {
                collection_lambda: 0.2,
                document_lambda: 0.1
            }
        );
        assert_eq!(
            RetrievalModel::parse_rule("okapi,k1:1.5").unwrap(),
            RetrievalModel::Okapi {
                k1: 1.5,
                b: DEFAULT_B,
                k3: DEFAULT_K3
            }
        );
        assert_eq!(
            RetrievalModel::parse_rule("tfidf").unwrap(),
            RetrievalModel::TfIdf {
                k1: DEFAULT_K1,
                b: DEFAULT_B
            }
        );
    }

    #[test]
    fn test_parse_rule_errors() {
        assert!(RetrievalModel::parse_rule("").is_err());
        assert!(RetrievalModel::parse_rule("method:bogus").is_err());
        assert!(RetrievalModel::parse_rule("method:dirichlet,mu").is_err());
        assert!(RetrievalModel::parse_rule("method:dirichlet,mu:lots").is_err());
        assert!(RetrievalModel::parse_rule("method:dirichlet,k1:1.0").is_err());
        assert!(RetrievalModel::parse_rule("method:linear,lambda:1.5").is_err());
        assert!(RetrievalModel::okapi(1.2, 2.0, 7.0).is_err());
    }

    #[test]
    fn test_display_reparses() {
        let models = [
            RetrievalModel::default(),
            RetrievalModel::JelinekMercer {
                collection_lambda: 0.3,
                document_lambda: 0.0,
            },
            RetrievalModel::TfIdf { k1: 1.0, b: 0.5 },
            RetrievalModel::Okapi {
                k1: 1.2,
                b: 0.75,
                k3: 1000.0,
            },
        ];
        for model in models {
            assert_eq!(RetrievalModel::parse_rule(&model.to_string()).unwrap(), model);
        }
    }

    #[test]
    fn test_dirichlet_score() {
        let term = TermStatistics {
            occurrences: 1,
            document_length: 34,
            document_frequency: 1,
            collection_frequency: 1,
        };
        let score = RetrievalModel::default().score(&term, &lorem_collection(), 1.0);
        let expected = ((1.0 + 2500.0 / 96.0) / (34.0 + 2500.0) as f64).ln();
        assert!((score - expected).abs() < 1e-12);
        assert!(score < 0.0);
    }

    #[test]
    fn test_linear_score_ignores_document_lambda() {
        let term = TermStatistics {
            occurrences: 2,
            document_length: 10,
            document_frequency: 2,
            collection_frequency: 4,
        };
        let a = RetrievalModel::JelinekMercer {
            collection_lambda: 0.5,
            document_lambda: 0.0,
        };
        let b = RetrievalModel::JelinekMercer {
            collection_lambda: 0.5,
            document_lambda: 0.9,
        };
        let collection = lorem_collection();
        assert_eq!(a.score(&term, &collection, 1.0), b.score(&term, &collection, 1.0));
        let expected = (0.5 * 0.2 + 0.5 * 4.0 / 96.0_f64).ln();
        assert!((a.score(&term, &collection, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_baselines_zero_without_occurrences() {
        let term = TermStatistics {
            occurrences: 0,
            document_length: 10,
            document_frequency: 1,
            collection_frequency: 1,
        };
        let collection = lorem_collection();
        assert_eq!(RetrievalModel::tfidf(1.2, 0.75).unwrap().score(&term, &collection, 1.0), 0.0);
        assert_eq!(
            RetrievalModel::okapi(1.2, 0.75, 7.0)
                .unwrap()
                .score(&term, &collection, 1.0),
            0.0
        );
    }

    #[test]
    fn test_okapi_score() {
        let term = TermStatistics {
            occurrences: 1,
            document_length: 32,
            document_frequency: 1,
            collection_frequency: 1,
        };
        let score = RetrievalModel::okapi(1.2, 0.75, 7.0)
            .unwrap()
            .score(&term, &lorem_collection(), 1.0);
        let expected = (2.5_f64 / 1.5).ln() * (2.2 / 2.2);
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_length_document_is_finite() {
        let term = TermStatistics {
            occurrences: 0,
            document_length: 0,
            document_frequency: 0,
            collection_frequency: 0,
        };
        let linear = RetrievalModel::JelinekMercer {
            collection_lambda: 0.0,
            document_lambda: 0.0,
        };
        assert!(linear.score(&term, &lorem_collection(), 1.0).is_finite());
        let empty = RetrievalModel::Dirichlet { mu: 0.0 };
        assert!(empty.score(&term, &lorem_collection(), 1.0).is_finite());
    }
}
