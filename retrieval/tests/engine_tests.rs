use retrieval::persist::{load_snapshot, save_snapshot, SnapshotPaths};
use retrieval::store::Metadata;
use retrieval::{Engine, EngineConfig, EngineError, NewDocument, Tokenizer};
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn engine() -> Engine {
    Engine::new(EngineConfig::default(), Tokenizer::default()).unwrap()
}

fn meta(v: serde_json::Value) -> Metadata {
    v.as_object().cloned().unwrap()
}

fn ids(docs: &[retrieval::Document]) -> Vec<String> {
    docs.iter().map(|d| d.id.clone()).collect()
}

fn cat_corpus() -> Engine {
    let e = engine();
    e.add_documents(vec![
        NewDocument::new("the cat sat").with_id("1"),
        NewDocument::new("the dog sat").with_id("2"),
        NewDocument::new("birds fly").with_id("3"),
    ])
    .unwrap();
    e
}

#[test]
fn cat_ranks_first_and_the_rest_keep_store_order() {
    let e = cat_corpus();
    let hits = e.search("cat", None).unwrap();
    assert_eq!(ids(&hits), vec!["1", "2", "3"]);
}

#[test]
fn search_on_empty_store_is_empty() {
    let e = engine();
    assert!(e.search("anything", None).unwrap().is_empty());
}

#[test]
fn blank_query_is_empty() {
    let e = cat_corpus();
    assert!(e.search("   ", None).unwrap().is_empty());
}

#[test]
fn duplicate_in_batch_is_rejected_atomically() {
    let e = cat_corpus();
    let before = e.search("sat", Some(10)).unwrap();
    let err = e
        .add_documents(vec![
            NewDocument::new("new one").with_id("a"),
            NewDocument::new("collides").with_id("2"),
            NewDocument::new("new two").with_id("b"),
        ])
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateId("2".into()));
    assert_eq!(e.len(), 3);
    assert!(e.get("a").is_none());
    assert_eq!(e.search("sat", Some(10)).unwrap(), before);
}

#[test]
fn not_found_leaves_state_untouched() {
    let e = cat_corpus();
    let before = e.search("cat", Some(10)).unwrap();
    assert!(matches!(e.update_document("nope", "x".into(), Metadata::new()), Err(EngineError::NotFound(_))));
    assert!(matches!(e.remove_document("nope"), Err(EngineError::NotFound(_))));
    assert_eq!(e.len(), 3);
    assert_eq!(e.search("cat", Some(10)).unwrap(), before);
}

#[test]
fn remove_drops_document_from_results() {
    let e = cat_corpus();
    e.remove_document("1").unwrap();
    let hits = e.search("cat", None).unwrap();
    assert_eq!(ids(&hits), vec!["2", "3"]);
}

#[test]
fn k_override_does_not_persist() {
    let e = engine();
    let batch = (0..12).map(|i| NewDocument::new(format!("shared term {i}"))).collect();
    e.add_documents(batch).unwrap();
    assert_eq!(e.search("shared", Some(10)).unwrap().len(), 10);
    assert_eq!(e.search("shared", None).unwrap().len(), 4);
}

#[test]
fn metadata_round_trips() {
    let e = engine();
    let m = meta(json!({"source": "report.pdf", "page": 3, "tags": ["a", "b"], "nested": {"x": null}}));
    e.add_documents(vec![NewDocument::new("quarterly revenue").with_metadata(m.clone())]).unwrap();
    let hits = e.search("revenue", None).unwrap();
    assert_eq!(hits[0].metadata, m);
}

#[test]
fn chinese_documents_are_searchable() {
    let e = engine();
    e.add_documents(vec![
        NewDocument::new("我爱北京天安门").with_id("zh1"),
        NewDocument::new("今天天气很好").with_id("zh2"),
        NewDocument::new("the weather is nice").with_id("en"),
    ])
    .unwrap();
    let hits = e.search("北京", Some(1)).unwrap();
    assert_eq!(hits[0].id, "zh1");
}

#[test]
fn concurrent_searches_and_writes() {
    let e = Arc::new(cat_corpus());
    let mut handles = Vec::new();
    for i in 0..4 {
        let e = Arc::clone(&e);
        handles.push(thread::spawn(move || {
            for j in 0..25 {
                if i == 0 {
                    e.add_documents(vec![NewDocument::new(format!("cat number {j}"))]).unwrap();
                } else {
                    let hits = e.search("cat", Some(3)).unwrap();
                    assert_eq!(hits.len(), 3);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(e.len(), 28);
}

#[test]
fn snapshot_survives_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let paths = SnapshotPaths::new(dir.path());
    let e = cat_corpus();
    save_snapshot(&paths, &e.snapshot()).unwrap();
    assert!(paths.exists());

    let restored = engine();
    restored.restore(load_snapshot(&paths).unwrap()).unwrap();
    assert_eq!(restored.search("dog", None).unwrap(), e.search("dog", None).unwrap());
}

#[test]
fn batch_insert_rebuilds_index_once() {
    let e = cat_corpus();
    let before = e.index_generation();
    let batch = (0..12).map(|i| NewDocument::new(format!("bulk doc {i}"))).collect();
    e.add_documents(batch).unwrap();
    assert_eq!(e.index_generation(), before + 1);
    assert_eq!(e.len(), 15);
}

#[test]
fn failed_mutations_do_not_rebuild() {
    let e = cat_corpus();
    let before = e.index_generation();

    let batch = vec![
        NewDocument::new("fresh").with_id("x"),
        NewDocument::new("collides").with_id("1"),
        NewDocument::new("fresh too"),
    ];
    assert!(e.add_documents(batch).is_err());
    assert!(e.update_document("missing", "x".into(), Metadata::new()).is_err());
    assert!(e.remove_document("missing").is_err());
    assert!(e.add_documents(vec![]).unwrap().is_empty());

    assert_eq!(e.index_generation(), before);
}

#[test]
fn each_successful_mutation_rebuilds_once() {
    let e = cat_corpus();
    let before = e.index_generation();
    e.update_document("1", "the cat slept".into(), Metadata::new()).unwrap();
    assert_eq!(e.index_generation(), before + 1);
    e.remove_document("2").unwrap();
    assert_eq!(e.index_generation(), before + 2);
}
