//! TREC query files and run files.
//!
//! Query files hold one `id;text` pair per line. Run files use the
//! six-column TREC format:
//!
//! ```text
//! 301 Q0 FBIS3-10082 1 -4.8123000000000004661160346586257219314575 quiver
//! ```

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use log::{error, warn};

use crate::error::Result;

/// Separator between query id and query text.
pub const QUERY_DELIMITER: char = ';';

/// One query of a query file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrecQuery {
    pub id: String,
    pub text: String,
}

/// Read `id;text` lines.
///
/// Blank lines are skipped and lines without a delimiter are logged and
/// skipped. A repeated id keeps its first position and takes the later
/// text. Reading stops once `max_queries` distinct queries were read.
pub fn read_queries<R: BufRead>(reader: R, max_queries: Option<usize>) -> Result<Vec<TrecQuery>> {
    let mut queries: Vec<TrecQuery> = Vec::new();
    let mut positions: AHashMap<String, usize> = AHashMap::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((id, text)) = line.split_once(QUERY_DELIMITER) else {
            warn!("unable to process {line:?} in queries list");
            continue;
        };

        match positions.get(id) {
            Some(&position) => {
                let existing = &mut queries[position];
                if existing.text != text {
                    error!("duplicate query {id:?} ({:?} vs. {text:?})", existing.text);
                }
                existing.text = text.to_string();
            }
            None => {
                positions.insert(id.to_string(), queries.len());
                queries.push(TrecQuery {
                    id: id.to_string(),
                    text: text.to_string(),
                });
            }
        }

        if max_queries.is_some_and(|max| max > 0 && queries.len() >= max) {
            break;
        }
    }

    Ok(queries)
}

/// [`read_queries`] on a file.
pub fn read_queries_file<P: AsRef<Path>>(path: P, max_queries: Option<usize>) -> Result<Vec<TrecQuery>> {
    read_queries(BufReader::new(File::open(path)?), max_queries)
}

/// Writes rankings in TREC run format.
#[derive(Debug)]
pub struct TrecRunWriter<W: Write> {
    name: String,
    rank_cutoff: Option<usize>,
    sort: bool,
    writer: W,
}

impl TrecRunWriter<BufWriter<File>> {
    /// Create (or truncate) a run file.
    pub fn create<P: AsRef<Path>, S: Into<String>>(path: P, name: S) -> Result<Self> {
        Ok(Self::new(name, BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> TrecRunWriter<W> {
    pub fn new<S: Into<String>>(name: S, writer: W) -> Self {
        TrecRunWriter {
            name: name.into(),
            rank_cutoff: None,
            sort: true,
            writer,
        }
    }

    /// Write at most `rank_cutoff` documents per query.
    pub fn rank_cutoff(mut self, rank_cutoff: usize) -> Self {
        self.rank_cutoff = Some(rank_cutoff);
        self
    }

    /// Keep rankings in the order given instead of sorting by score.
    pub fn skip_sorting(mut self, skip: bool) -> Self {
        self.sort = !skip;
        self
    }

    /// Append the ranking of one query as `(score, document)` pairs.
    ///
    /// Rankings are sorted by decreasing score (then decreasing document
    /// name) unless sorting was disabled. An empty ranking is skipped.
    pub fn add_ranking<S: AsRef<str>>(&mut self, query_id: &str, ranking: &[(f64, S)]) -> Result<()> {
        if ranking.is_empty() {
            warn!("received empty ranking for {query_id}; ignoring");
            return Ok(());
        }

        let mut ordered: Vec<(f64, &str)> = ranking.iter().map(|(s, d)| (*s, d.as_ref())).collect();
        if self.sort {
            ordered.sort_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.1.cmp(a.1))
            });
        }
        if let Some(cutoff) = self.rank_cutoff {
            ordered.truncate(cutoff);
        }

        for (rank, (score, document)) in ordered.into_iter().enumerate() {
            writeln!(
                self.writer,
                "{query_id} Q0 {document} {} {score:.40} {}",
                rank + 1,
                self.name
            )?;
        }
        Ok(())
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
