use ahash::AHashMap;
use quiver::document::DocumentRecord;
use quiver::error::QuiverError;
use quiver::query::QueryRequest;
use quiver::repository::Repository;
use quiver::testing::RepositoryBuilder;
use tempfile::TempDir;

fn scenario() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    RepositoryBuilder::scenario().build(dir.path()).unwrap();
    let repository = quiver::open(dir.path()).unwrap();
    (dir, repository)
}

#[test]
fn test_scenario_documents() {
    let (_dir, repository) = scenario();

    assert_eq!(repository.document_base().unwrap(), 0);
    assert_eq!(repository.document_maximum().unwrap(), 3);
    assert_eq!(repository.document_count().unwrap(), 3);
    assert_eq!(repository.unique_term_count().unwrap(), 2);
    assert_eq!(repository.total_term_count().unwrap(), 5);

    assert_eq!(
        repository.document(1).unwrap(),
        DocumentRecord::new("doc_b".to_string(), vec![0, 1, 0])
    );
    assert_eq!(repository.document(0).unwrap().terms, vec![0]);
    assert_eq!(repository.document(2).unwrap().terms, vec![1]);

    for id in 0..3 {
        assert_eq!(
            repository.document_length(id).unwrap(),
            repository.document(id).unwrap().len() as u64
        );
    }

    let (name, terms) = repository.document_terms(1).unwrap();
    assert_eq!(name, "doc_b");
    assert_eq!(terms, vec!["cat", "dog", "cat"]);
}

#[test]
fn test_out_of_range_documents() {
    let (_dir, repository) = scenario();

    match repository.document(3) {
        Err(QuiverError::OutOfRange { id, base, maximum }) => {
            assert_eq!((id, base, maximum), (3, 0, 3));
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
    assert!(matches!(
        repository.document_length(42),
        Err(QuiverError::OutOfRange { .. })
    ));
    assert!(matches!(
        repository.external_id(3),
        Err(QuiverError::OutOfRange { .. })
    ));
}

#[test]
fn test_term_statistics() {
    let (_dir, repository) = scenario();

    assert_eq!(repository.term_count("cat").unwrap(), 3);
    assert_eq!(repository.term_count("CAT").unwrap(), 3);
    assert_eq!(repository.document_frequency("dog").unwrap(), 2);
    assert_eq!(repository.term_count("emu").unwrap(), 0);
    assert_eq!(repository.document_frequency("emu").unwrap(), 0);

    assert_eq!(repository.term_id("cat").unwrap(), Some(0));
    assert_eq!(repository.term(1).unwrap().as_deref(), Some("dog"));
    assert_eq!(repository.term(9).unwrap(), None);
}

#[test]
fn test_identifier_translation() {
    let (_dir, repository) = scenario();

    let resolved = repository
        .resolve_internal_ids(["doc_c", "missing", "doc_a", "doc_c"])
        .unwrap();
    assert_eq!(
        resolved,
        vec![("doc_a".to_string(), 0), ("doc_c".to_string(), 2)]
    );

    for (name, id) in resolved {
        assert_eq!(repository.external_id(id).unwrap(), name);
    }
}

#[test]
fn test_query_top_two() {
    let (_dir, repository) = scenario();

    let outcome = repository
        .query(&QueryRequest::new("cat").results_requested(2))
        .unwrap();
    assert_eq!(outcome.len(), 2);

    let mut documents: Vec<u64> = outcome.results().iter().map(|r| r.document).collect();
    documents.sort_unstable();
    assert_eq!(documents, vec![0, 1]);

    let scores: Vec<f64> = outcome.results().iter().map(|r| r.score).collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    assert!(outcome.results().iter().all(|r| r.snippet.is_none()));
}

#[test]
fn test_query_candidates() {
    let (_dir, repository) = scenario();

    let request = QueryRequest::new("cat dog").document_set([2i64, 0, -1, 17]);
    let outcome = repository.query(&request).unwrap();

    assert!(outcome.len() <= 2);
    assert!(
        outcome
            .results()
            .iter()
            .all(|r| r.document == 0 || r.document == 2)
    );
}

#[test]
fn test_query_results_bounded() {
    let (_dir, repository) = scenario();

    for k in 1..=4 {
        let outcome = repository
            .query(&QueryRequest::new("dog").results_requested(k))
            .unwrap();
        assert!(outcome.len() <= k);
    }

    let outcome = repository.query(&QueryRequest::new("emu")).unwrap();
    assert!(outcome.is_empty());

    assert!(matches!(
        repository.query(&QueryRequest::new("cat").results_requested(0)),
        Err(QuiverError::InvalidArgument(_))
    ));
    assert!(matches!(
        repository.query(&QueryRequest::new("   ")),
        Err(QuiverError::InvalidArgument(_))
    ));
}

#[test]
fn test_empty_operators_are_rejected() {
    let (_dir, repository) = scenario();

    for query in ["#combine()", "#weight()", "cat #combine()"] {
        let result = repository.query(&QueryRequest::new(query));
        assert!(
            matches!(result, Err(QuiverError::QuerySyntax(_))),
            "{query:?} gave {result:?}"
        );
    }
    assert_eq!(
        repository
            .query(&QueryRequest::new("#combine(cat)").results_requested(2))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_expression_list() {
    let (_dir, repository) = scenario();

    let counts = repository.expression_list("cat").unwrap();
    let expected: AHashMap<String, u64> =
        [("doc_a".to_string(), 1), ("doc_b".to_string(), 2)].into_iter().collect();
    assert_eq!(counts, expected);

    let counts = repository.expression_list("#od1(cat dog)").unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts["doc_b"], 1);

    let counts = repository.expression_list("#combine(dog)").unwrap();
    assert_eq!(counts.len(), 2);

    assert!(repository.expression_list("emu").unwrap().is_empty());
    assert!(matches!(
        repository.expression_list("#combine(cat dog)"),
        Err(QuiverError::InvalidArgument(_))
    ));
}

#[test]
fn test_vocabulary_cursor() {
    let (_dir, repository) = scenario();

    let entries: Vec<_> = repository
        .vocabulary()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 2);

    let cat = entries.iter().find(|e| e.term == "cat").unwrap();
    assert_eq!(cat.term_id, 0);
    assert_eq!(cat.document_frequency, 2);
    assert_eq!(cat.term_frequency, 3);

    let dictionary = repository.build_dictionary().unwrap();
    assert_eq!(dictionary.term_to_id.len(), 2);
    assert_eq!(dictionary.id_to_term.len(), 2);
    assert_eq!(dictionary.id_to_document_frequency[&1], 2);

    let frequencies = repository.build_term_frequencies().unwrap();
    assert_eq!(frequencies[&0], 3);
    assert_eq!(frequencies[&1], 2);
}

#[test]
fn test_display() {
    let (_dir, repository) = scenario();
    assert_eq!(repository.to_string(), "<quiver::Repository of 3 documents>");
}

#[test]
fn test_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Repository>();

    let (_dir, repository) = scenario();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| repository.query(&QueryRequest::new("cat")).unwrap().len()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
    });
}
