use std::sync::Arc;
use std::thread;

use facegate_core::errors::AppError;
use facegate_core::faces::{
    EmbeddingVector, EngineOptions, EnrollmentStore, FaceEngine, FilesystemFaceStore, StoreKey,
};
use tempfile::TempDir;

fn vector(values: &[f64]) -> EmbeddingVector {
    EmbeddingVector::new(values.to_vec()).unwrap()
}

fn basis(dimension: usize, axis: usize) -> EmbeddingVector {
    let mut values = vec![0.0; dimension];
    values[axis] = 1.0;
    vector(&values)
}

#[test]
fn integration_enroll_then_verify_scenario() {
    let tmp = TempDir::new().unwrap();
    let engine = FaceEngine::open(EngineOptions::new(tmp.path().join("store.json")));

    let v1 = vector(&[0.9, 0.1, 0.0, 0.0]);
    let v2 = vector(&[0.0, 0.2, 0.8, 0.0]);
    engine.enroll("u1", "Alice", &v1).unwrap();
    engine.enroll("u2", "Bob", &v2).unwrap();

    let hit = engine.verify(&v1, 0.5).unwrap();
    assert!(hit.verified);
    assert_eq!(hit.identity_id.as_deref(), Some("u1"));
    assert_eq!(hit.display_name.as_deref(), Some("Alice"));

    let orthogonal = vector(&[0.0, 0.0, 0.0, 3.0]);
    let miss = engine.verify(&orthogonal, 0.5).unwrap();
    assert!(!miss.verified);
    assert!(miss.identity_id.is_none());
    assert!(miss.score.abs() < 1e-12);

    let listed = engine.list().unwrap();
    let ids = listed
        .iter()
        .map(|entry| entry.identity_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["u1", "u2"]);
}

#[test]
fn integration_reenroll_replaces_template() {
    let tmp = TempDir::new().unwrap();
    let engine = FaceEngine::open(EngineOptions::new(tmp.path().join("store.json")));

    engine.enroll("u1", "Alice", &basis(3, 0)).unwrap();
    engine.enroll("u1", "Alice", &basis(3, 1)).unwrap();

    let records = engine.store().load().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records["u1"].embedding, basis(3, 1));

    assert!(engine.verify(&basis(3, 1), 0.9).unwrap().verified);
    assert!(!engine.verify(&basis(3, 0), 0.9).unwrap().verified);
}

#[test]
fn integration_decision_boundary_is_strict() {
    let tmp = TempDir::new().unwrap();
    let engine = FaceEngine::open(EngineOptions::new(tmp.path().join("store.json")));
    engine.enroll("u1", "Alice", &vector(&[1.0, 1.0, 0.0])).unwrap();

    let probe = vector(&[1.0, 0.2, 0.3]);
    let score = engine.verify(&probe, -1.0).unwrap().score;
    assert!(score > 0.0 && score < 1.0);

    let at = engine.verify(&probe, score).unwrap();
    assert!(!at.verified);
    assert_eq!(at.score, score);

    let just_below = f64::from_bits(score.to_bits() - 1);
    let above = engine.verify(&probe, just_below).unwrap();
    assert!(above.verified);
    assert_eq!(above.identity_id.as_deref(), Some("u1"));
}

#[test]
fn integration_concurrent_enrollments_all_persist() {
    const WRITERS: usize = 16;
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let engine = Arc::new(FaceEngine::open(EngineOptions::new(&path)));

    let handles = (0..WRITERS)
        .map(|idx| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let id = format!("user-{idx:02}");
                engine
                    .enroll(&id, &format!("User {idx}"), &basis(WRITERS, idx))
                    .map(|record| record.identity_id)
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().expect("writer thread").expect("enroll works");
    }

    let reopened = EnrollmentStore::new(FilesystemFaceStore::new(&path));
    let records = reopened.load().unwrap();
    assert_eq!(records.len(), WRITERS);
    for idx in 0..WRITERS {
        assert!(records.contains_key(&format!("user-{idx:02}")));
    }
}

#[test]
fn integration_readers_see_whole_writes() {
    let tmp = TempDir::new().unwrap();
    let engine = Arc::new(FaceEngine::open(EngineOptions::new(
        tmp.path().join("store.json"),
    )));
    engine.enroll("seed", "Seed", &basis(8, 0)).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for idx in 1..8 {
                engine
                    .enroll(&format!("id-{idx}"), "Someone", &basis(8, idx))
                    .unwrap();
            }
        })
    };
    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut last_seen = 0;
            for _ in 0..50 {
                let result = engine.verify(&basis(8, 0), 0.5).unwrap();
                assert!(result.verified);
                let seen = engine.list().unwrap().len();
                assert!(seen >= last_seen);
                last_seen = seen;
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(engine.list().unwrap().len(), 8);
}

#[test]
fn integration_clear_then_verify_reports_empty_store() {
    let tmp = TempDir::new().unwrap();
    let engine = FaceEngine::open(EngineOptions::new(tmp.path().join("store.json")));
    engine.enroll("u1", "Alice", &basis(2, 0)).unwrap();

    engine.clear().unwrap();
    engine.clear().unwrap();

    assert!(engine.list().unwrap().is_empty());
    let err = engine.verify(&basis(2, 0), 0.5).unwrap_err();
    assert!(matches!(err, AppError::EmptyStore));
}

#[test]
fn integration_sealed_engine_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let key = StoreKey::generate();
    let options = EngineOptions {
        store_path: path.clone(),
        store_key: Some(key.clone()),
        dimension: Some(3),
    };

    FaceEngine::open(options.clone())
        .enroll("u1", "Alice", &basis(3, 2))
        .unwrap();

    let engine = FaceEngine::open(options);
    let result = engine.verify(&basis(3, 2), 0.5).unwrap();
    assert!(result.verified);

    let err = engine.verify(&basis(4, 2), 0.5).unwrap_err();
    assert!(matches!(err, AppError::ShapeMismatch { .. }));

    let unsealed = FaceEngine::open(EngineOptions::new(&path));
    let err = unsealed.verify(&basis(3, 2), 0.5).unwrap_err();
    assert!(err.is_store_error());
}
