//! Scan record store integration tests

use herdscan_core::{
    CascadeOutcome, ClassProbabilities, DiagnosisLabel, DiagnosisResult, Error, GateBranch,
    GateResult, ScanStore,
};
use herdscan_telemetry::{
    JsonlScanStore, MemoryScanStore, RecordSink, ScanRecorder, DEFAULT_LIST_LIMIT,
    DEFAULT_SCAN_TYPE,
};
use std::sync::Arc;
use std::thread;

fn positive_outcome() -> CascadeOutcome {
    CascadeOutcome {
        gate: GateResult {
            passed: true,
            primary_prob: 0.95,
            secondary_prob: 0.05,
            branch: GateBranch::Passed,
            rule_description: "passed".to_string(),
        },
        diagnosis: Some(DiagnosisResult {
            label: DiagnosisLabel::Positive,
            class_name: "infected".to_string(),
            confidence: 0.9,
            probabilities: ClassProbabilities::from_logits(&[0.0, 9f32.ln()]).unwrap(),
        }),
        threshold: 0.5,
    }
}

#[test]
fn test_jsonl_store_persists_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlScanStore::open(dir.path().join("records/scans.jsonl")).unwrap();

    let id = store
        .persist(&positive_outcome(), "user-1", Some("animal-1"))
        .unwrap();

    let records = store.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].subject_id.as_deref(), Some("animal-1"));
    assert_eq!(records[0].scan_type, DEFAULT_SCAN_TYPE);
    assert_eq!(records[0].outcome().unwrap(), positive_outcome());
    assert!(records[0].previous_hash.is_none());
}

#[test]
fn test_chain_resumes_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scans.jsonl");

    {
        let store = JsonlScanStore::open(&path).unwrap();
        store.persist(&positive_outcome(), "user-1", Some("a")).unwrap();
        store.persist(&positive_outcome(), "user-1", Some("b")).unwrap();
    }

    let store = JsonlScanStore::open(&path).unwrap();
    store.persist(&positive_outcome(), "user-2", Some("c")).unwrap();

    let records = store.records().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].previous_hash.as_ref(), Some(&records[1].hash));

    let report = store.verify().unwrap();
    assert!(report.is_intact());
    assert_eq!(report.records, 3);
}

#[test]
fn test_tampered_file_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scans.jsonl");
    let store = JsonlScanStore::open(&path).unwrap();

    store.persist(&positive_outcome(), "user-1", Some("a")).unwrap();
    let second = store.persist(&positive_outcome(), "user-1", Some("b")).unwrap();
    drop(store);

    let contents = std::fs::read_to_string(&path).unwrap();
    let tampered = contents.replacen("\"subject_id\":\"b\"", "\"subject_id\":\"z\"", 1);
    assert_ne!(contents, tampered);
    std::fs::write(&path, tampered).unwrap();

    let store = JsonlScanStore::open(&path).unwrap();
    let report = store.verify().unwrap();
    assert_eq!(report.first_broken, Some(second));
}

#[test]
fn test_corrupt_line_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scans.jsonl");
    std::fs::write(&path, "{not json}\n").unwrap();

    assert!(matches!(JsonlScanStore::open(&path), Err(Error::Storage(_))));
}

#[test]
fn test_list_filters_and_orders_newest_first() {
    let store = MemoryScanStore::new();
    for subject in ["a", "b", "c"] {
        store.persist(&positive_outcome(), "user-1", Some(subject)).unwrap();
    }
    store.persist(&positive_outcome(), "user-2", Some("d")).unwrap();

    let mine = store.list(Some("user-1"), DEFAULT_LIST_LIMIT).unwrap();
    let subjects: Vec<_> = mine.iter().map(|r| r.subject_id.as_deref().unwrap()).collect();
    assert_eq!(subjects, vec!["c", "b", "a"]);

    let limited = store.list(Some("user-1"), 2).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].subject_id.as_deref(), Some("c"));

    assert_eq!(store.list(None, DEFAULT_LIST_LIMIT).unwrap().len(), 4);
    assert!(store.list(Some("nobody"), DEFAULT_LIST_LIMIT).unwrap().is_empty());
}

#[test]
fn test_recorder_sets_scan_type_and_image_ref() {
    let sink = Arc::new(MemoryScanStore::new());
    let recorder = ScanRecorder::new(sink.clone())
        .with_scan_type("LSD_SCAN")
        .with_image_ref("scans/2026/10/abc.jpg");

    let id = recorder
        .persist(&positive_outcome(), "user-1", Some("animal-1"))
        .unwrap();

    let records = sink.records().unwrap();
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].scan_type, "LSD_SCAN");
    assert_eq!(records[0].image_ref.as_deref(), Some("scans/2026/10/abc.jpg"));
    assert!(sink.verify().unwrap().is_intact());
}

#[test]
fn test_concurrent_appends_keep_chain_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlScanStore::open(dir.path().join("scans.jsonl")).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for j in 0..10 {
                    let subject = format!("animal-{}-{}", i, j);
                    store
                        .persist(&positive_outcome(), "user-1", Some(subject.as_str()))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let report = store.verify().unwrap();
    assert_eq!(report.records, 80);
    assert!(report.is_intact());
}
