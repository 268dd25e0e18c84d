//! Output formatting for CLI commands.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, QuiverArgs};
use crate::error::Result;

/// Repository statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub path: String,
    pub index: String,
    pub documents: u64,
    pub document_base: u64,
    pub document_maximum: u64,
    pub total_terms: u64,
    pub unique_terms: u64,
    pub average_document_length: f64,
    pub lengths: Option<LengthSummary>,
}

/// Document length distribution.
#[derive(Debug, Serialize, Deserialize)]
pub struct LengthSummary {
    pub mean: f64,
    pub standard_deviation: f64,
    pub minimum: u64,
    pub maximum: u64,
}

/// One document and its terms.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: u64,
    pub external_id: String,
    pub length: usize,
    pub terms: Vec<String>,
}

/// Ranked query results.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub model: String,
    pub hits: Vec<QueryHit>,
    pub duration_ms: u64,
}

/// One ranked document.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryHit {
    pub rank: usize,
    pub id: u64,
    pub external_id: String,
    pub score: f64,
    pub snippet: Option<String>,
}

/// Per-document match counts of an expression.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionCounts {
    pub expression: String,
    /// `(external_id, count)` pairs sorted by external id.
    pub counts: Vec<(String, u64)>,
}

/// Vocabulary entries.
#[derive(Debug, Serialize, Deserialize)]
pub struct VocabularyListing {
    pub entries: Vec<VocabularyRow>,
    pub complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VocabularyRow {
    pub term_id: u64,
    pub term: String,
    pub document_frequency: u64,
    pub term_frequency: u64,
}

/// Summary of a batch run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub output: String,
    pub name: String,
    pub queries: usize,
    pub empty_queries: usize,
    pub duration_ms: u64,
}

/// Human-readable rendering of a command result.
pub trait HumanOutput {
    fn write_human(&self, out: &mut dyn Write) -> Result<()>;
}

/// Output a result in the selected format.
pub fn output_result<T>(message: &str, result: &T, args: &QuiverArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_result(message, result, args.output_format, args.pretty, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Write a result to `out` in `format`.
pub fn write_result<T>(
    message: &str,
    result: &T,
    format: OutputFormat,
    pretty: bool,
    out: &mut dyn Write,
) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    match format {
        OutputFormat::Human => {
            if !message.is_empty() {
                writeln!(out, "{message}")?;
                writeln!(out)?;
            }
            result.write_human(out)
        }
        OutputFormat::Json => {
            let json = if pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            writeln!(out, "{json}")?;
            Ok(())
        }
    }
}

impl HumanOutput for RepositoryStats {
    fn write_human(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Repository Statistics:")?;
        writeln!(out, "══════════════════════")?;
        writeln!(out, "Path: {}", self.path)?;
        writeln!(out, "Index: {}", self.index)?;
        writeln!(out, "Documents: {}", self.documents)?;
        writeln!(
            out,
            "Document ids: [{}, {})",
            self.document_base, self.document_maximum
        )?;
        writeln!(out, "Total terms: {}", self.total_terms)?;
        writeln!(out, "Unique terms: {}", self.unique_terms)?;
        writeln!(
            out,
            "Average document length: {:.2}",
            self.average_document_length
        )?;

        if let Some(lengths) = &self.lengths {
            writeln!(out)?;
            writeln!(out, "Document Lengths:")?;
            writeln!(out, "─────────────────")?;
            writeln!(out, "  Mean: {:.2}", lengths.mean)?;
            writeln!(out, "  Std. deviation: {:.2}", lengths.standard_deviation)?;
            writeln!(out, "  Min: {}", lengths.minimum)?;
            writeln!(out, "  Max: {}", lengths.maximum)?;
        }
        Ok(())
    }
}

impl HumanOutput for DocumentView {
    fn write_human(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Document {} ({})", self.id, self.external_id)?;
        writeln!(out, "Length: {}", self.length)?;
        writeln!(out, "{}", self.terms.join(" "))?;
        Ok(())
    }
}

impl HumanOutput for QueryResults {
    fn write_human(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Query Results:")?;
        writeln!(out, "══════════════")?;
        writeln!(out, "Query: {}", self.query)?;
        writeln!(out, "Model: {}", self.model)?;
        writeln!(
            out,
            "Found {} documents in {}ms",
            self.hits.len(),
            self.duration_ms
        )?;

        for hit in &self.hits {
            writeln!(out)?;
            writeln!(
                out,
                "{:>4}. {} (id {}) {:.6}",
                hit.rank, hit.external_id, hit.id, hit.score
            )?;
            if let Some(snippet) = &hit.snippet {
                for line in snippet.lines() {
                    writeln!(out, "      {line}")?;
                }
            }
        }
        Ok(())
    }
}

impl HumanOutput for ExpressionCounts {
    fn write_human(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Expression: {}", self.expression)?;
        if self.counts.is_empty() {
            writeln!(out, "No matching documents")?;
        }
        for (external_id, count) in &self.counts {
            writeln!(out, "  {external_id}: {count}")?;
        }
        Ok(())
    }
}

impl HumanOutput for VocabularyListing {
    fn write_human(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{:>10}  {:<24} {:>10} {:>12}", "ID", "TERM", "DF", "TF")?;
        for row in &self.entries {
            writeln!(
                out,
                "{:>10}  {:<24} {:>10} {:>12}",
                row.term_id, row.term, row.document_frequency, row.term_frequency
            )?;
        }
        if !self.complete {
            writeln!(out, "(listing truncated)")?;
        }
        Ok(())
    }
}

impl HumanOutput for RunSummary {
    fn write_human(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Run: {}", self.name)?;
        writeln!(out, "Output: {}", self.output)?;
        writeln!(out, "Queries: {}", self.queries)?;
        if self.empty_queries > 0 {
            writeln!(out, "Queries without results: {}", self.empty_queries)?;
        }
        writeln!(out, "Duration: {}ms", self.duration_ms)?;
        Ok(())
    }
}
