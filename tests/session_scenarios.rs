use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use hnswkit::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

fn write_dataset(path: &Path, count: usize, dim: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut file = std::fs::File::create(path).unwrap();
    for i in 0..count {
        let vector: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
        let line = serde_json::json!({ format!("word{i}"): vector });
        writeln!(file, "{line}").unwrap();
    }
}

/// Train a small model and return a process-mode handle over it.
fn trained_session(dir: &Path, count: usize, max_index_size: usize) -> SyncSession {
    let data = dir.join("data.txt");
    write_dataset(&data, count, 4, 11);

    let session = SyncSession::new();
    session
        .init(SessionConfig::new(Mode::Train, 4, dir.join("model")), None)
        .unwrap();
    let config = TrainConfig::new(&data)
        .with_max_index_size(max_index_size)
        .with_precision(0.8)
        .with_ranks(5, 5);
    session.train(&config).unwrap();

    session
        .init(SessionConfig::new(Mode::Process, 4, dir.join("model")), None)
        .unwrap();
    session
}

#[test]
fn test_end_to_end_training() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let data = dir.path().join("data.txt");
    write_dataset(&data, 500, 4, 42);

    let session = SyncSession::new();
    session.init(SessionConfig::new(Mode::Train, 4, dir.path().join("e2e")), None)?;
    let config = TrainConfig::new(&data)
        .with_precision(0.95)
        .with_ranks(10, 10)
        .with_max_epoch(5)
        .with_max_index_size(1000)
        .with_show_span(100);
    let report = session.train(&config)?;

    match report.status {
        TrainStatus::Ok => assert!(report.precision >= 0.95),
        TrainStatus::Warning => {
            assert_eq!(report.epochs, 5);
            assert!(report.precision < 0.95);
        }
    }
    let model = dir.path().join("e2e.hnsw");
    assert!(model.exists());

    session.init(SessionConfig::new(Mode::Process, 4, dir.path().join("e2e")), None)?;
    let result = session.search(&SearchRequest::word("word17", 3))?;
    assert_eq!(result.len(), 3);
    assert_eq!(result.words().next(), Some("word17"));
    Ok(())
}

#[test]
fn test_overwrite_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 50, 100);

    session
        .insert(&[0.1, 0.2, 0.3, 0.4], "fresh", InsertMode::Overwrite)
        .unwrap();
    let first = session.stats().unwrap().index.unwrap().len;
    session
        .insert(&[0.1, 0.2, 0.3, 0.4], "fresh", InsertMode::Overwrite)
        .unwrap();
    let second = session.stats().unwrap().index.unwrap().len;
    assert_eq!(first, 51);
    assert_eq!(first, second);

    let result = session
        .search(&SearchRequest::word("fresh", 1).exhaustive())
        .unwrap();
    assert_eq!(result.payload().details[0].node, vec![0.1, 0.2, 0.3, 0.4]);
}

#[test]
fn test_discard_on_existing_is_noop() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 50, 100);

    let before = session
        .search(&SearchRequest::word("word3", 1).exhaustive())
        .unwrap();
    session
        .insert(&[9.0, 9.0, 9.0, 9.0], "word3", InsertMode::Discard)
        .unwrap();
    let after = session
        .search(&SearchRequest::word("word3", 1).exhaustive())
        .unwrap();

    assert_eq!(session.stats().unwrap().index.unwrap().len, 50);
    assert_eq!(before.payload().details[0].node, after.payload().details[0].node);
}

#[test]
fn test_cache_coherence_across_insert() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 60, 100);
    let request = SearchRequest::word("word5", 4);

    let first = session.search(&request).unwrap();
    let second = session.search(&request).unwrap();
    assert_eq!(first.json(), second.json());
    assert!(Arc::ptr_eq(&first, &second));
    let cache = session.stats().unwrap().cache;
    assert_eq!((cache.hits, cache.misses), (1, 1));

    // Place a new word right next to word5 so the recomputed result changes.
    let anchor = first.payload().details[0].node.clone();
    let near: Vec<f32> = anchor.iter().map(|x| x + 1e-4).collect();
    session.insert(&near, "twin", InsertMode::Overwrite).unwrap();

    let third = session.search(&request).unwrap();
    assert!(!Arc::ptr_eq(&second, &third));
    assert_eq!(session.stats().unwrap().cache.misses, 2);
    assert!(third.words().any(|w| w == "twin"));

    // A different shape is never served from the cache.
    let wider = session.search(&SearchRequest::word("word5", 5)).unwrap();
    assert_eq!(wider.len(), 5);
    assert_eq!(session.stats().unwrap().cache.misses, 3);
}

#[test]
fn test_capacity_boundary() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 30, 30);

    let before = session.stats().unwrap().index.unwrap().len;
    let err = session
        .insert(&[0.0, 0.0, 0.0, 1.0], "overflow", InsertMode::Overwrite)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::ModelSize);
    let err = session
        .insert(&[0.0, 0.0, 0.0, 1.0], "word1", InsertMode::Overwrite)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::ModelSize);
    assert_eq!(session.stats().unwrap().index.unwrap().len, before);
    let err = session
        .search(&SearchRequest::word("overflow", 1))
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NoWord);
}

#[test]
fn test_concurrent_searches_and_inserts() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 100, 200);

    std::thread::scope(|scope| {
        for t in 0..4 {
            let session = &session;
            scope.spawn(move || {
                for i in 0..40 {
                    let word = format!("word{}", (t * 40 + i) % 100);
                    let result = session.search(&SearchRequest::word(word.as_str(), 3)).unwrap();
                    assert_eq!(result.words().next(), Some(word.as_str()));
                }
            });
        }
        scope.spawn(|| {
            for i in 0..50 {
                let v = [i as f32, 0.5, -0.5, 1.0];
                session
                    .insert(&v, &format!("extra{i}"), InsertMode::Overwrite)
                    .unwrap();
            }
        });
    });

    assert_eq!(session.stats().unwrap().index.unwrap().len, 150);
}

#[test]
fn test_search_callback_and_result_accessors() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 40, 100);
    let request = SearchRequest::vector(vec![0.0, 0.0, 0.0, 0.0], 3);

    let words: Vec<String> = session
        .search_with(&request, |result| result.words().map(String::from).collect())
        .unwrap();
    assert_eq!(words.len(), 3);

    let json = session.result().unwrap();
    assert_eq!(session.result_size().unwrap(), json.len());
    let payload: SearchPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(payload.size, 3);
    assert_eq!(
        payload.details.iter().map(|d| d.label.clone()).collect::<Vec<_>>(),
        words
    );
}

#[test]
fn test_save_and_reload_after_insert() {
    let dir = tempdir().unwrap();
    let session = trained_session(dir.path(), 20, 50);
    session
        .insert(&[0.3, 0.3, 0.3, 0.3], "added", InsertMode::Discard)
        .unwrap();
    let saved = session.save(None).unwrap();
    assert_eq!(saved, dir.path().join("model.hnsw"));

    let reopened = SyncSession::new();
    reopened
        .init(SessionConfig::new(Mode::Process, 4, dir.path().join("model.hnsw")), None)
        .unwrap();
    let result = reopened.search(&SearchRequest::word("added", 1)).unwrap();
    assert_eq!(result.words().next(), Some("added"));
}
