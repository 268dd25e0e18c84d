//! # Quiver
//!
//! Read-only access to pre-built inverted-index repositories.
//!
//! ## Features
//!
//! - Memory-mapped document, term list and posting access
//! - Vocabulary iteration with integrity checks
//! - Ranked retrieval with query-likelihood, TF-IDF and Okapi models
//! - Ordered and unordered window operators
//! - Snippets cut from stored document text
//! - TREC query and run file helpers
//!
//! ```no_run
//! use quiver::query::QueryRequest;
//!
//! # fn main() -> quiver::error::Result<()> {
//! let repository = quiver::open("/data/robust04")?;
//! let outcome = repository.query(&QueryRequest::new("#od1(new york)").results_requested(10))?;
//! for result in outcome.results() {
//!     println!("{} {}", repository.external_id(result.document)?, result.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod dictionary;
pub mod document;
pub mod engine;
pub mod error;
pub mod query;
pub mod repository;
pub mod storage;
pub mod testing;
pub mod trec;
pub mod util;

pub use repository::{Repository, open};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
