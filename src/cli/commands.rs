//! Command implementations for the Quiver CLI.

use std::time::Instant;

use log::{info, warn};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::engine::{QueryEnvironment, RetrievalModel};
use crate::error::{QuiverError, Result};
use crate::query::QueryRequest;
use crate::repository::Repository;
use crate::trec::{TrecRunWriter, read_queries_file};

/// Execute a CLI command.
pub fn execute_command(args: QuiverArgs) -> Result<()> {
    match &args.command {
        Command::Stats(stats_args) => show_stats(stats_args.clone(), &args),
        Command::Document(document_args) => show_document(document_args.clone(), &args),
        Command::Query(query_args) => run_query(query_args.clone(), &args),
        Command::Count(count_args) => count_expression(count_args.clone(), &args),
        Command::Vocabulary(vocabulary_args) => list_vocabulary(vocabulary_args.clone(), &args),
        Command::Run(run_args) => run_batch(run_args.clone(), &args),
    }
}

/// Show repository statistics.
fn show_stats(args: StatsArgs, cli_args: &QuiverArgs) -> Result<()> {
    let repository = crate::open(&args.repository)?;
    let index = repository.index()?;

    let lengths = if args.lengths {
        let statistics = repository.length_statistics()?;
        Some(LengthSummary {
            mean: statistics.mean,
            standard_deviation: statistics.standard_deviation,
            minimum: statistics.minimum,
            maximum: statistics.maximum,
        })
    } else {
        None
    };

    let result = RepositoryStats {
        path: args.repository.display().to_string(),
        index: index.name().to_string(),
        documents: repository.document_count()?,
        document_base: repository.document_base()?,
        document_maximum: repository.document_maximum()?,
        total_terms: repository.total_term_count()?,
        unique_terms: repository.unique_term_count()?,
        average_document_length: index.statistics().average_document_length(),
        lengths,
    };

    output_result("", &result, cli_args)
}

/// Show one document by internal or external id.
fn show_document(args: DocumentArgs, cli_args: &QuiverArgs) -> Result<()> {
    let repository = crate::open(&args.repository)?;

    let id = match (&args.external_id, args.id) {
        (Some(external_id), _) => repository
            .resolve_internal_ids([external_id.as_str()])?
            .first()
            .map(|(_, id)| *id)
            .ok_or_else(|| {
                QuiverError::invalid_argument(format!("unknown document {external_id:?}"))
            })?,
        (None, Some(id)) => id,
        (None, None) => {
            return Err(QuiverError::invalid_argument(
                "a document id or --external-id is required",
            ));
        }
    };

    let record = repository.document(id)?;
    let length = record.len();
    let terms = if args.terms {
        repository.document_terms(id)?.1
    } else {
        record.terms.iter().map(u64::to_string).collect()
    };

    let result = DocumentView {
        id,
        external_id: record.external_id,
        length,
        terms,
    };

    output_result("", &result, cli_args)
}

/// Run one ranked query.
fn run_query(args: QueryArgs, cli_args: &QuiverArgs) -> Result<()> {
    let repository = crate::open(&args.repository)?;
    let environment = environment_for(&repository, args.rule.as_deref())?;

    let mut request = QueryRequest::new(&args.query).include_snippets(args.snippets);
    if !args.documents.is_empty() {
        request = request.document_set(args.documents.iter().copied());
    }
    if let Some(results) = args.results {
        request = request.results_requested(results);
    }

    info!("running {:?} with {}", args.query, environment.model());
    let start = Instant::now();
    let outcome = environment.query(&request)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let mut hits = Vec::with_capacity(outcome.len());
    for (rank, result) in outcome.into_iter().enumerate() {
        hits.push(QueryHit {
            rank: rank + 1,
            id: result.document,
            external_id: repository.external_id(result.document)?,
            score: result.score,
            snippet: result.snippet,
        });
    }

    let result = QueryResults {
        query: args.query,
        model: environment.model().to_string(),
        hits,
        duration_ms,
    };

    output_result("", &result, cli_args)
}

/// Count matches of a term or window expression.
fn count_expression(args: CountArgs, cli_args: &QuiverArgs) -> Result<()> {
    let repository = crate::open(&args.repository)?;

    let mut counts: Vec<(String, u64)> = repository
        .expression_list(&args.expression)?
        .into_iter()
        .collect();
    counts.sort_unstable();

    let result = ExpressionCounts {
        expression: args.expression,
        counts,
    };

    output_result("", &result, cli_args)
}

/// List vocabulary entries in storage order.
fn list_vocabulary(args: VocabularyArgs, cli_args: &QuiverArgs) -> Result<()> {
    let repository = crate::open(&args.repository)?;
    let limit = args.limit.unwrap_or(usize::MAX);

    let mut cursor = repository.vocabulary()?;
    let mut entries = Vec::new();
    while entries.len() < limit {
        let Some(entry) = cursor.next().transpose()? else {
            break;
        };
        entries.push(VocabularyRow {
            term_id: entry.term_id,
            term: entry.term,
            document_frequency: entry.document_frequency,
            term_frequency: entry.term_frequency,
        });
    }

    let result = VocabularyListing {
        complete: cursor.finished(),
        entries,
    };

    output_result("", &result, cli_args)
}

/// Run every query of a query file and write a TREC run.
fn run_batch(args: RunArgs, cli_args: &QuiverArgs) -> Result<()> {
    let repository = crate::open(&args.repository)?;
    let environment = environment_for(&repository, args.rule.as_deref())?;
    let queries = read_queries_file(&args.queries, args.max_queries)?;
    info!(
        "read {} queries from {}",
        queries.len(),
        args.queries.display()
    );

    let start = Instant::now();
    let mut writer = TrecRunWriter::create(&args.output, &args.name)?.rank_cutoff(args.results);
    let mut empty_queries = 0;

    for query in &queries {
        let request = QueryRequest::new(&query.text).results_requested(args.results);
        let outcome = match environment.query(&request) {
            Ok(outcome) => outcome,
            Err(e) if !e.is_fatal() => {
                warn!("query {} failed: {e}", query.id);
                empty_queries += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        if outcome.is_empty() {
            empty_queries += 1;
        }

        let mut ranking = Vec::with_capacity(outcome.len());
        for result in outcome.results() {
            ranking.push((result.score, repository.external_id(result.document)?));
        }
        writer.add_ranking(&query.id, &ranking)?;
    }
    writer.finish()?;

    let result = RunSummary {
        output: args.output.display().to_string(),
        name: args.name,
        queries: queries.len(),
        empty_queries,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    output_result("", &result, cli_args)
}

/// Query environment for an optional retrieval rule.
fn environment_for(repository: &Repository, rule: Option<&str>) -> Result<QueryEnvironment> {
    match rule {
        Some(rule) => QueryEnvironment::new(repository, RetrievalModel::parse_rule(rule)?),
        None => Ok(repository.environment()?.clone()),
    }
}
