//! Repository lifecycle and read access.
//!
//! A [`Repository`] moves through `Unopened → Opening → Ready → Closed`,
//! with `Failed` as the terminal state of an unsuccessful open. Every read
//! path (translation, vocabulary, documents, queries) requires `Ready` and
//! fails with [`QuiverError::InvalidState`] otherwise. Nothing half-opened is
//! ever observable: either every store opened and cross-checked, or the
//! repository is `Failed` and holds no handles.
//!
//! All backing stores are read-only memory maps or files opened per cursor,
//! so a `Ready` repository is `Send + Sync` and can be shared across threads
//! without locking.
//!
//! # Example
//!
//! ```no_run
//! use quiver::query::QueryRequest;
//!
//! # fn main() -> quiver::error::Result<()> {
//! let repository = quiver::open("/data/robust04")?;
//! println!("{repository}");
//!
//! let outcome = repository.query(&QueryRequest::new("airbus subsidies").results_requested(10))?;
//! for result in outcome.results() {
//!     println!("{} {}", repository.external_id(result.document)?, result.score);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, info, warn};

use crate::analysis::TermProcessor;
use crate::document::DocId;
use crate::engine::{QueryEnvironment, RetrievalModel};
use crate::error::{QuiverError, Result};
use crate::query::{QueryOutcome, QueryRequest};
use crate::storage::FileStorage;

pub mod accessor;
pub mod collection;
pub mod disk_index;
pub mod format;
pub mod manifest;
pub mod translator;
pub mod vocabulary;

pub use accessor::LengthStatistics;
pub use collection::CollectionStore;
pub use disk_index::{DiskIndex, IndexStatistics, Posting, TermRecord};
pub use manifest::RepositoryManifest;
pub use vocabulary::{TermDictionary, VocabularyCursor, VocabularyEntry};

use format::{COLLECTION_DIR, INDEX_DIR};

/// Observable lifecycle state of a [`Repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Unopened,
    Opening,
    Ready,
    Failed,
    Closed,
}

impl fmt::Display for RepositoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepositoryState::Unopened => "unopened",
            RepositoryState::Opening => "opening",
            RepositoryState::Ready => "ready",
            RepositoryState::Failed => "failed",
            RepositoryState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Facts about an open repository, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub path: PathBuf,
    pub index_name: String,
    /// Lowest valid internal document id (inclusive).
    pub document_base: DocId,
    /// Upper bound on internal document ids (exclusive).
    pub document_maximum: DocId,
    pub document_count: u64,
    pub unique_terms: u64,
    pub total_terms: u64,
}

impl RepositoryHandle {
    /// Whether `id` lies in `[document_base, document_maximum)`.
    pub fn contains(&self, id: DocId) -> bool {
        id >= self.document_base && id < self.document_maximum
    }

    /// `Ok` when `id` is a valid internal id, [`QuiverError::OutOfRange`] otherwise.
    pub fn check_document(&self, id: DocId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(QuiverError::OutOfRange {
                id,
                base: self.document_base,
                maximum: self.document_maximum,
            })
        }
    }
}

/// Everything a `Ready` repository holds.
#[derive(Debug)]
pub(crate) struct OpenRepository {
    pub(crate) handle: RepositoryHandle,
    pub(crate) manifest: RepositoryManifest,
    pub(crate) collection: Arc<CollectionStore>,
    pub(crate) index: Arc<DiskIndex>,
    pub(crate) processor: TermProcessor,
    pub(crate) environment: QueryEnvironment,
}

#[derive(Debug)]
enum Lifecycle {
    Unopened,
    Opening,
    Ready(Box<OpenRepository>),
    Failed(String),
    Closed,
}

/// A read-only inverted-index repository.
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    lifecycle: Lifecycle,
}

/// Open the repository at `path`.
///
/// Equivalent to [`Repository::new`] followed by [`Repository::open`].
pub fn open<P: AsRef<Path>>(path: P) -> Result<Repository> {
    let mut repository = Repository::new(path);
    repository.open()?;
    Ok(repository)
}

impl Repository {
    /// A repository handle for `path`; nothing is read until [`Repository::open`].
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Repository {
            path: path.as_ref().to_path_buf(),
            lifecycle: Lifecycle::Unopened,
        }
    }

    /// Open every store and make the repository `Ready`.
    ///
    /// Only valid from `Unopened`. On failure the repository becomes `Failed`
    /// and the error is returned; a failed repository cannot be reopened.
    pub fn open(&mut self) -> Result<()> {
        if !matches!(self.lifecycle, Lifecycle::Unopened) {
            return Err(QuiverError::invalid_state(format!(
                "repository {} cannot be opened from state {}",
                self.path.display(),
                self.state()
            )));
        }

        self.lifecycle = Lifecycle::Opening;
        debug!("opening repository {}", self.path.display());

        match Self::load(&self.path) {
            Ok(open) => {
                info!(
                    "opened repository {} (index {}, {} documents, {} unique terms)",
                    self.path.display(),
                    open.handle.index_name,
                    open.handle.document_count,
                    open.handle.unique_terms
                );
                self.lifecycle = Lifecycle::Ready(Box::new(open));
                Ok(())
            }
            Err(e) => {
                warn!("failed to open repository {}: {e}", self.path.display());
                self.lifecycle = Lifecycle::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn load(path: &Path) -> Result<OpenRepository> {
        if !path.is_dir() {
            return Err(QuiverError::configuration(format!(
                "repository path {} is not a directory",
                path.display()
            )));
        }

        let manifest = RepositoryManifest::load(path)?;
        let index_name = manifest.single_index()?.to_string();

        let collection_dir = path.join(COLLECTION_DIR);
        if !collection_dir.is_dir() {
            return Err(QuiverError::configuration(format!(
                "repository {} has no {COLLECTION_DIR} directory",
                path.display()
            )));
        }

        let index_dir = path.join(INDEX_DIR).join(&index_name);
        if !index_dir.is_dir() {
            return Err(QuiverError::configuration(format!(
                "configured index {index_name} not found under {}",
                path.join(INDEX_DIR).display()
            )));
        }

        let collection =
            CollectionStore::open(&FileStorage::open(&collection_dir)?, manifest.store_docs)?;
        let index = DiskIndex::open(&index_name, FileStorage::open(&index_dir)?)?;

        let statistics = *index.statistics();
        if collection.base() != statistics.base || collection.maximum() != statistics.maximum {
            return Err(QuiverError::corrupt(format!(
                "collection covers documents [{}, {}) but index {index_name} covers [{}, {})",
                collection.base(),
                collection.maximum(),
                statistics.base,
                statistics.maximum
            )));
        }

        let collection = Arc::new(collection);
        let index = Arc::new(index);
        let processor = TermProcessor::new(manifest.stemmer);
        let environment = QueryEnvironment::from_parts(
            Arc::clone(&index),
            Arc::clone(&collection),
            processor.clone(),
            RetrievalModel::default(),
        );

        let handle = RepositoryHandle {
            path: path.to_path_buf(),
            index_name,
            document_base: statistics.base,
            document_maximum: statistics.maximum,
            document_count: statistics.document_count(),
            unique_terms: statistics.unique_terms,
            total_terms: statistics.total_terms,
        };

        Ok(OpenRepository {
            handle,
            manifest,
            collection,
            index,
            processor,
            environment,
        })
    }

    /// Release all stores. Closing twice, or closing a repository that never
    /// opened, is a no-op.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Closed) {
            Lifecycle::Ready(open) => {
                info!("closed repository {}", open.handle.path.display());
                drop(open);
            }
            Lifecycle::Closed => {}
            previous => debug!(
                "closing repository {} from state {:?}",
                self.path.display(),
                previous
            ),
        }
    }

    pub fn state(&self) -> RepositoryState {
        match self.lifecycle {
            Lifecycle::Unopened => RepositoryState::Unopened,
            Lifecycle::Opening => RepositoryState::Opening,
            Lifecycle::Ready(_) => RepositoryState::Ready,
            Lifecycle::Failed(_) => RepositoryState::Failed,
            Lifecycle::Closed => RepositoryState::Closed,
        }
    }

    /// The error message of a failed open.
    pub fn failure(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn ready(&self) -> Result<&OpenRepository> {
        match &self.lifecycle {
            Lifecycle::Ready(open) => Ok(open),
            _ => Err(QuiverError::invalid_state(format!(
                "repository {} is {}, not ready",
                self.path.display(),
                self.state()
            ))),
        }
    }

    pub fn handle(&self) -> Result<&RepositoryHandle> {
        Ok(&self.ready()?.handle)
    }

    pub fn manifest(&self) -> Result<&RepositoryManifest> {
        Ok(&self.ready()?.manifest)
    }

    /// The index this repository reads from.
    pub fn index(&self) -> Result<&DiskIndex> {
        Ok(&self.ready()?.index)
    }

    /// The query environment built at open time (Dirichlet, μ = 2500).
    pub fn environment(&self) -> Result<&QueryEnvironment> {
        Ok(&self.ready()?.environment)
    }

    /// Run a ranked query with the default retrieval model.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        self.environment()?.query(request)
    }

    /// Number of matches of a single term or window expression in every
    /// document that contains it, keyed by external id.
    pub fn expression_list(&self, expression: &str) -> Result<AHashMap<String, u64>> {
        self.environment()?.expression_list(expression)
    }

    /// Every term and its id plus document frequencies, in one vocabulary pass.
    pub fn build_dictionary(&self) -> Result<TermDictionary> {
        vocabulary::build_dictionary(&self.ready()?.index)
    }

    /// Collection frequency of every term id, in one vocabulary pass.
    pub fn build_term_frequencies(&self) -> Result<AHashMap<u64, u64>> {
        vocabulary::build_term_frequencies(&self.ready()?.index)
    }

    /// A cursor positioned on the first vocabulary entry.
    pub fn vocabulary(&self) -> Result<VocabularyCursor> {
        VocabularyCursor::open(&self.ready()?.index)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lifecycle {
            Lifecycle::Ready(open) => write!(
                f,
                "<quiver::Repository of {} documents>",
                open.handle.document_count
            ),
            _ => write!(
                f,
                "<quiver::Repository at {} ({})>",
                self.path.display(),
                self.state()
            ),
        }
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.close();
    }
}
