//! Command line argument parsing for the Quiver CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Quiver - read-only access to inverted-index repositories
#[derive(Parser, Debug, Clone)]
#[command(name = "quiver")]
#[command(about = "Query and inspect read-only inverted-index repositories")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct QuiverArgs {
    /// Verbosity level (repeat for more: -v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl QuiverArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n + 1,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show repository statistics
    Stats(StatsArgs),

    /// Show one document
    Document(DocumentArgs),

    /// Run a ranked query
    Query(QueryArgs),

    /// Count matches of a term or window expression per document
    Count(CountArgs),

    /// List vocabulary entries
    Vocabulary(VocabularyArgs),

    /// Run a query file and write a TREC run
    Run(RunArgs),
}

/// Arguments for repository statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the repository directory
    #[arg(value_name = "REPOSITORY", env = "QUIVER_REPOSITORY")]
    pub repository: PathBuf,

    /// Also compute document length mean and deviation (reads every term list)
    #[arg(long)]
    pub lengths: bool,
}

/// Arguments for showing a document
#[derive(Parser, Debug, Clone)]
pub struct DocumentArgs {
    /// Path to the repository directory
    #[arg(value_name = "REPOSITORY", env = "QUIVER_REPOSITORY")]
    pub repository: PathBuf,

    /// Internal document id
    #[arg(value_name = "ID", required_unless_present = "external_id")]
    pub id: Option<u64>,

    /// Look the document up by external id instead
    #[arg(short, long, conflicts_with = "id")]
    pub external_id: Option<String>,

    /// Print term strings instead of term ids
    #[arg(short, long)]
    pub terms: bool,
}

/// Arguments for ranked queries
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Path to the repository directory
    #[arg(value_name = "REPOSITORY", env = "QUIVER_REPOSITORY")]
    pub repository: PathBuf,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results
    #[arg(short = 'k', long)]
    pub results: Option<usize>,

    /// Restrict scoring to these internal ids (comma-separated)
    #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
    pub documents: Vec<i64>,

    /// Attach snippets to the results
    #[arg(short, long)]
    pub snippets: bool,

    /// Retrieval rule, e.g. "method:dirichlet,mu:1000" or "okapi,k1:1.2,b:0.75"
    #[arg(short, long)]
    pub rule: Option<String>,
}

/// Arguments for expression counts
#[derive(Parser, Debug, Clone)]
pub struct CountArgs {
    /// Path to the repository directory
    #[arg(value_name = "REPOSITORY", env = "QUIVER_REPOSITORY")]
    pub repository: PathBuf,

    /// Term or window expression, e.g. "#od1(new york)"
    #[arg(value_name = "EXPRESSION")]
    pub expression: String,
}

/// Arguments for listing the vocabulary
#[derive(Parser, Debug, Clone)]
pub struct VocabularyArgs {
    /// Path to the repository directory
    #[arg(value_name = "REPOSITORY", env = "QUIVER_REPOSITORY")]
    pub repository: PathBuf,

    /// Stop after this many entries
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for batch runs
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the repository directory
    #[arg(value_name = "REPOSITORY", env = "QUIVER_REPOSITORY")]
    pub repository: PathBuf,

    /// Query file with one "id;text" pair per line
    #[arg(value_name = "QUERIES")]
    pub queries: PathBuf,

    /// Run file to write
    #[arg(short, long, value_name = "RUN_FILE")]
    pub output: PathBuf,

    /// Run name written in the last column
    #[arg(short, long, default_value = "quiver")]
    pub name: String,

    /// Results per query
    #[arg(short = 'k', long, default_value = "1000")]
    pub results: usize,

    /// Retrieval rule
    #[arg(short, long)]
    pub rule: Option<String>,

    /// Only run the first N queries
    #[arg(long)]
    pub max_queries: Option<usize>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_command() {
        let args = QuiverArgs::try_parse_from([
            "quiver",
            "query",
            "/data/repo",
            "#combine(cat dog)",
            "-k",
            "5",
            "--documents",
            "1,-2,3",
            "--snippets",
        ])
        .unwrap();

        if let Command::Query(query_args) = args.command {
            assert_eq!(query_args.repository, PathBuf::from("/data/repo"));
            assert_eq!(query_args.query, "#combine(cat dog)");
            assert_eq!(query_args.results, Some(5));
            assert_eq!(query_args.documents, vec![1, -2, 3]);
            assert!(query_args.snippets);
            assert!(query_args.rule.is_none());
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_document_by_external_id() {
        let args = QuiverArgs::try_parse_from([
            "quiver",
            "document",
            "/data/repo",
            "--external-id",
            "doc_b",
            "--terms",
        ])
        .unwrap();

        if let Command::Document(document_args) = args.command {
            assert_eq!(document_args.id, None);
            assert_eq!(document_args.external_id.as_deref(), Some("doc_b"));
            assert!(document_args.terms);
        } else {
            panic!("Expected Document command");
        }
    }

    #[test]
    fn test_document_requires_an_id() {
        assert!(QuiverArgs::try_parse_from(["quiver", "document", "/data/repo"]).is_err());
    }

    #[test]
    fn test_verbosity() {
        let args = QuiverArgs::try_parse_from(["quiver", "-vv", "stats", "/data/repo"]).unwrap();
        assert_eq!(args.verbosity(), 3);

        let args = QuiverArgs::try_parse_from(["quiver", "-q", "-v", "stats", "/data/repo"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            QuiverArgs::try_parse_from(["quiver", "--format", "json", "vocabulary", "/data/repo"])
                .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_run_defaults() {
        let args = QuiverArgs::try_parse_from([
            "quiver",
            "run",
            "/data/repo",
            "topics.txt",
            "--output",
            "run.txt",
        ])
        .unwrap();

        if let Command::Run(run_args) = args.command {
            assert_eq!(run_args.name, "quiver");
            assert_eq!(run_args.results, 1000);
            assert_eq!(run_args.max_queries, None);
        } else {
            panic!("Expected Run command");
        }
    }
}
