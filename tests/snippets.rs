use quiver::error::QuiverError;
use quiver::query::{QueryRequest, SnippetConfig};
use quiver::testing::RepositoryBuilder;
use tempfile::TempDir;

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
    Duis eget tortor vel nunc posuere porttitor. Nullam quis mauris vitae \
    leo dapibus fringilla.";

fn corpus(store_docs: bool) -> RepositoryBuilder {
    RepositoryBuilder::new()
        .store_docs(store_docs)
        .document("lorem", LOREM)
        .document("hamlet", "To be, or not to be, that is the question.")
        .document("romeo", "But soft, what light through yonder window breaks?")
}

#[test]
fn test_snippet_around_match() {
    let dir = TempDir::new().unwrap();
    corpus(true).build(dir.path()).unwrap();
    let repository = quiver::open(dir.path()).unwrap();

    let request = QueryRequest::new("ipsum")
        .results_requested(1)
        .include_snippets(true);
    let outcome = repository.query(&request).unwrap();

    assert_eq!(outcome.len(), 1);
    let result = &outcome.results()[0];
    assert_eq!(repository.external_id(result.document).unwrap(), "lorem");
    assert_eq!(
        result.snippet.as_deref(),
        Some("Lorem IPSUM dolor sit amet, consectetur adipiscing\nelit. Duis...")
    );
}

#[test]
fn test_snippet_configuration() {
    let dir = TempDir::new().unwrap();
    corpus(true).build(dir.path()).unwrap();
    let repository = quiver::open(dir.path()).unwrap();

    let config = SnippetConfig::default()
        .words_before(0)
        .words_after(1)
        .uppercase_matches(false)
        .ellipsis(" [...]");
    let request = QueryRequest::new("window")
        .include_snippets(true)
        .snippet_config(config);
    let outcome = repository.query(&request).unwrap();

    assert_eq!(outcome.len(), 1);
    assert_eq!(
        outcome.results()[0].snippet.as_deref(),
        Some("window breaks?")
    );
}

#[test]
fn test_snippets_without_stored_text() {
    let dir = TempDir::new().unwrap();
    corpus(false).build(dir.path()).unwrap();
    let repository = quiver::open(dir.path()).unwrap();

    let request = QueryRequest::new("ipsum").include_snippets(true);
    assert!(matches!(
        repository.query(&request),
        Err(QuiverError::SnippetUnavailable(_))
    ));

    let outcome = repository.query(&QueryRequest::new("ipsum")).unwrap();
    assert_eq!(outcome.len(), 1);
}

#[test]
fn test_snippets_with_no_results() {
    let dir = TempDir::new().unwrap();
    corpus(false).build(dir.path()).unwrap();
    let repository = quiver::open(dir.path()).unwrap();

    let outcome = repository
        .query(&QueryRequest::new("zebra").include_snippets(true))
        .unwrap();
    assert!(outcome.is_empty());
}
