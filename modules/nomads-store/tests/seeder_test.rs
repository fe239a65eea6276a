//! Event seeding against the in-memory store.
//!
//! Covers the reconciliation contract end to end: set difference on titles,
//! idempotence, all-or-nothing commits and the no-write path.

use std::io::Write as _;

use serde_json::json;

use nomads_common::CandidateEvent;
use nomads_store::{
    load_candidates, DocumentStore, DuplicatePolicy, EventSeeder, MemoryStore, SeedError,
    StoreError, EVENTS_COLLECTION,
};

fn candidate(title: &str) -> CandidateEvent {
    CandidateEvent::titled(title)
}

fn titles(store: &MemoryStore) -> Vec<String> {
    store
        .documents(EVENTS_COLLECTION)
        .iter()
        .filter_map(|d| d.str_field("title").map(str::to_string))
        .collect()
}

// =========================================================================
// Reconciliation
// =========================================================================

#[tokio::test]
async fn inserts_only_missing_titles() {
    let store = MemoryStore::new();
    store.insert(
        EVENTS_COLLECTION,
        "existing-a",
        json!({"title": "A", "location": "Old Park"}),
    );

    let candidates = vec![
        CandidateEvent {
            location: Some("New Park".into()),
            ..candidate("A")
        },
        candidate("B"),
    ];

    let report = EventSeeder::new(&store).seed(&candidates).await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(titles(&store), vec!["A", "B"]);

    // "A" keeps its stored payload even though the candidate differs.
    let a = store.get(EVENTS_COLLECTION, "existing-a").await.unwrap().unwrap();
    assert_eq!(a.str_field("location"), Some("Old Park"));

    // The new document carries the candidate payload under the reported id.
    let b = store
        .get(EVENTS_COLLECTION, &report.inserted_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.str_field("title"), Some("B"));
}

#[tokio::test]
async fn preserves_extra_fields_of_candidates() {
    let store = MemoryStore::new();
    let candidates = vec![CandidateEvent {
        date: Some("2024-07-14".into()),
        description: Some("Bring gloves".into()),
        ..candidate("Beach Cleanup").with_extra("capacity", json!(30))
    }];

    EventSeeder::new(&store).seed(&candidates).await.unwrap();

    let docs = store.documents(EVENTS_COLLECTION);
    assert_eq!(docs.len(), 1);
    assert_eq!(
        docs[0].fields,
        json!({
            "title": "Beach Cleanup",
            "date": "2024-07-14",
            "description": "Bring gloves",
            "capacity": 30
        })
        .as_object()
        .cloned()
        .unwrap()
    );
}

#[tokio::test]
async fn title_match_is_case_sensitive() {
    let store = MemoryStore::new();
    store.insert(EVENTS_COLLECTION, "e1", json!({"title": "yoga in the park"}));

    let report = EventSeeder::new(&store)
        .seed(&[candidate("Yoga in the Park")])
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn second_run_inserts_nothing() {
    let store = MemoryStore::new();
    let candidates = vec![candidate("A"), candidate("B"), candidate("C")];

    let first = EventSeeder::new(&store).seed(&candidates).await.unwrap();
    assert_eq!(first.inserted, 3);
    let writes_after_first = store.write_calls();

    let second = EventSeeder::new(&store).seed(&candidates).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(store.write_calls(), writes_after_first);
    assert_eq!(store.documents(EVENTS_COLLECTION).len(), 3);
}

#[tokio::test]
async fn all_inserts_go_out_in_one_batch() {
    let store = MemoryStore::new();
    let candidates: Vec<CandidateEvent> =
        (0..25).map(|i| candidate(&format!("Event {i}"))).collect();

    EventSeeder::new(&store).seed(&candidates).await.unwrap();

    assert_eq!(store.write_calls(), 1);
    assert_eq!(store.documents(EVENTS_COLLECTION).len(), 25);
}

// =========================================================================
// No-op path
// =========================================================================

#[tokio::test]
async fn empty_candidate_list_writes_nothing() {
    let store = MemoryStore::new();

    let report = EventSeeder::new(&store).seed(&[]).await.unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(store.write_calls(), 0);
}

// =========================================================================
// Duplicate titles inside the candidate list
// =========================================================================

#[tokio::test]
async fn duplicate_candidates_are_both_inserted_by_default() {
    let store = MemoryStore::new();
    let candidates = vec![candidate("Beach Cleanup"), candidate("Beach Cleanup")];

    let report = EventSeeder::new(&store).seed(&candidates).await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(titles(&store), vec!["Beach Cleanup", "Beach Cleanup"]);
}

#[tokio::test]
async fn strict_policy_inserts_a_title_once() {
    let store = MemoryStore::new();
    let candidates = vec![candidate("Beach Cleanup"), candidate("Beach Cleanup")];

    let report = EventSeeder::new(&store)
        .with_policy(DuplicatePolicy::Strict)
        .seed(&candidates)
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(titles(&store), vec!["Beach Cleanup"]);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn fetch_failure_aborts_before_any_write() {
    let store = MemoryStore::new();
    store.fail_reads(StoreError::Unavailable("connection refused".into()));

    let err = EventSeeder::new(&store)
        .seed(&[candidate("A")])
        .await
        .unwrap_err();

    assert!(matches!(err, SeedError::StoreUnavailable(_)));
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn failed_commit_leaves_collection_untouched() {
    let store = MemoryStore::new();
    store.insert(EVENTS_COLLECTION, "e1", json!({"title": "A"}));
    let before = store.documents(EVENTS_COLLECTION);
    store.fail_next_commit(StoreError::Unavailable("deadline exceeded".into()));

    let err = EventSeeder::new(&store)
        .seed(&[candidate("A"), candidate("B"), candidate("C")])
        .await
        .unwrap_err();

    assert!(matches!(err, SeedError::StoreUnavailable(_)));
    assert_eq!(store.documents(EVENTS_COLLECTION), before);
    // No retry.
    assert_eq!(store.write_calls(), 1);
}

#[tokio::test]
async fn oversized_batch_is_rejected_whole() {
    let store = MemoryStore::new();
    store.limit_batch_size(2);

    let err = EventSeeder::new(&store)
        .seed(&[candidate("A"), candidate("B"), candidate("C")])
        .await
        .unwrap_err();

    assert!(matches!(err, SeedError::StoreWriteRejected(_)));
    assert!(store.documents(EVENTS_COLLECTION).is_empty());
}

#[tokio::test]
async fn inserts_never_overwrite_an_existing_document() {
    let store = MemoryStore::new();
    // Occupies the id the in-memory store hands out first.
    store.insert(EVENTS_COLLECTION, "mem-000001", json!({"title": "Old"}));

    let err = EventSeeder::new(&store)
        .seed(&[candidate("New")])
        .await
        .unwrap_err();

    assert!(matches!(err, SeedError::StoreWriteRejected(_)));
    assert_eq!(titles(&store), vec!["Old"]);
}

#[tokio::test]
async fn seeds_an_alternate_collection() {
    let store = MemoryStore::new();

    EventSeeder::new(&store)
        .with_collection("staging_events")
        .seed(&[candidate("A")])
        .await
        .unwrap();

    assert_eq!(store.documents("staging_events").len(), 1);
    assert!(store.documents(EVENTS_COLLECTION).is_empty());
}

// =========================================================================
// Seed list loading
// =========================================================================

#[test]
fn loads_candidates_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"title": "Beach Cleanup", "date": "2024-07-14"}}, {{"title": "Night Run", "distanceKm": 5}}]"#
    )
    .unwrap();

    let candidates = load_candidates(file.path()).unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].date.as_deref(), Some("2024-07-14"));
    assert_eq!(candidates[1].extra["distanceKm"], json!(5));
}

#[test]
fn missing_or_malformed_list_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("events.json");
    assert!(matches!(
        load_candidates(&missing),
        Err(SeedError::ConfigurationMissing(_))
    ));

    std::fs::write(&missing, r#"{"title": "not a list"}"#).unwrap();
    assert!(matches!(
        load_candidates(&missing),
        Err(SeedError::ConfigurationMissing(_))
    ));
}

#[test]
fn bundled_seed_list_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/events.json");
    let candidates = load_candidates(&path).unwrap();
    assert!(!candidates.is_empty());
}
