//! Idempotent loading of the bundled event list into the `events` collection.
//!
//! One read of the whole collection, a set difference on titles, and at most
//! one atomic batch of inserts. Existing documents are never touched, even
//! when their payload differs from the candidate with the same title, and
//! inserts are create-only so an id collision fails the batch.
//!
//! There is no lock: two processes seeding at the same moment can both see
//! the same pre-run state and insert the same titles twice.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use nomads_common::CandidateEvent;

use crate::store::{to_fields, BatchWrite, Document, DocumentStore, StoreError};

pub const EVENTS_COLLECTION: &str = "events";

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store rejected the seed batch: {0}")]
    StoreWriteRejected(String),

    #[error("Seed list missing or unreadable: {0}")]
    ConfigurationMissing(String),
}

impl SeedError {
    fn from_fetch(err: StoreError) -> Self {
        match err {
            StoreError::WriteRejected(msg) => SeedError::StoreWriteRejected(msg),
            other => SeedError::StoreUnavailable(other.to_string()),
        }
    }

    fn from_commit(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => SeedError::StoreUnavailable(msg),
            other => SeedError::StoreWriteRejected(other.to_string()),
        }
    }
}

/// How candidates sharing a title with each other are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Only titles stored before the run are skipped; repeated titles inside
    /// the candidate list are all inserted.
    #[default]
    AllowWithinBatch,
    /// Also skip a candidate whose title was already staged in this run.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
    pub inserted_ids: Vec<String>,
}

/// Read the seed list (a JSON array of events) from disk.
pub fn load_candidates(path: &Path) -> Result<Vec<CandidateEvent>, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SeedError::ConfigurationMissing(format!("cannot read {}: {e}", path.display()))
    })?;
    let candidates: Vec<CandidateEvent> = serde_json::from_str(&raw).map_err(|e| {
        SeedError::ConfigurationMissing(format!("cannot parse {}: {e}", path.display()))
    })?;
    info!(path = %path.display(), count = candidates.len(), "Loaded seed events");
    Ok(candidates)
}

/// Titles present in the fetched documents. Documents without a string
/// `title` contribute nothing.
pub fn existing_titles(docs: &[Document]) -> HashSet<&str> {
    docs.iter().filter_map(|d| d.str_field("title")).collect()
}

/// Candidates to insert, in list order. Titles compare exactly.
pub fn stage_candidates<'a>(
    candidates: &'a [CandidateEvent],
    existing: &HashSet<&str>,
    policy: DuplicatePolicy,
) -> Vec<&'a CandidateEvent> {
    let mut staged_titles: HashSet<&str> = HashSet::new();
    candidates
        .iter()
        .filter(|c| {
            if existing.contains(c.title.as_str()) {
                return false;
            }
            match policy {
                DuplicatePolicy::AllowWithinBatch => true,
                DuplicatePolicy::Strict => staged_titles.insert(c.title.as_str()),
            }
        })
        .collect()
}

pub struct EventSeeder<'a> {
    store: &'a dyn DocumentStore,
    collection: String,
    policy: DuplicatePolicy,
}

impl<'a> EventSeeder<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            collection: EVENTS_COLLECTION.to_string(),
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Insert every candidate whose title is not stored yet, in one batch.
    pub async fn seed(&self, candidates: &[CandidateEvent]) -> Result<SeedReport, SeedError> {
        let stored = self
            .store
            .fetch_all(&self.collection)
            .await
            .map_err(SeedError::from_fetch)?;

        let existing = existing_titles(&stored);
        let staged = stage_candidates(candidates, &existing, self.policy);
        let skipped = candidates.len() - staged.len();

        if staged.is_empty() {
            info!(collection = %self.collection, skipped, "No new events to add");
            return Ok(SeedReport {
                inserted: 0,
                skipped,
                inserted_ids: Vec::new(),
            });
        }

        let mut writes = Vec::with_capacity(staged.len());
        let mut inserted_ids = Vec::with_capacity(staged.len());
        for candidate in staged {
            let id = self.store.new_document_id(&self.collection);
            let fields = to_fields(candidate).map_err(SeedError::from_commit)?;
            writes.push(BatchWrite::Create {
                collection: self.collection.clone(),
                id: id.clone(),
                fields,
            });
            inserted_ids.push(id);
        }

        let inserted = writes.len();
        if let Err(e) = self.store.commit_batch(writes).await {
            warn!(collection = %self.collection, staged = inserted, error = %e, "Seed batch failed");
            return Err(SeedError::from_commit(e));
        }

        info!(collection = %self.collection, inserted, skipped, "{inserted} new events loaded successfully");
        Ok(SeedReport {
            inserted,
            skipped,
            inserted_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(titles: &[&str]) -> Vec<CandidateEvent> {
        titles.iter().map(|t| CandidateEvent::titled(*t)).collect()
    }

    #[test]
    fn staged_count_is_the_set_difference() {
        let cases: &[(&[&str], &[&str], usize)] = &[
            (&[], &[], 0),
            (&["A", "B"], &[], 2),
            (&["A", "B"], &["A"], 1),
            (&["A", "B"], &["A", "B", "C"], 0),
            (&["a", "A"], &["A"], 1),
            (&["X", "X", "Y"], &["Y"], 2),
        ];
        for (candidates, stored, expected) in cases {
            let candidates = titled(candidates);
            let existing: HashSet<&str> = stored.iter().copied().collect();
            let staged = stage_candidates(&candidates, &existing, DuplicatePolicy::AllowWithinBatch);
            assert_eq!(staged.len(), *expected, "candidates {candidates:?} stored {stored:?}");
        }
    }

    #[test]
    fn staging_preserves_list_order() {
        let candidates = titled(&["C", "A", "B"]);
        let existing: HashSet<&str> = ["A"].into_iter().collect();
        let staged = stage_candidates(&candidates, &existing, DuplicatePolicy::AllowWithinBatch);
        let titles: Vec<&str> = staged.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B"]);
    }

    #[test]
    fn strict_policy_drops_repeats_within_the_list() {
        let candidates = titled(&["Beach Cleanup", "Beach Cleanup", "Hike"]);
        let existing = HashSet::new();
        assert_eq!(
            stage_candidates(&candidates, &existing, DuplicatePolicy::AllowWithinBatch).len(),
            3
        );
        assert_eq!(
            stage_candidates(&candidates, &existing, DuplicatePolicy::Strict).len(),
            2
        );
    }

    #[test]
    fn titles_ignore_documents_without_one() {
        let docs = vec![
            Document::new("1", serde_json::from_value(serde_json::json!({"title": "A"})).unwrap()),
            Document::new("2", serde_json::from_value(serde_json::json!({"name": "B"})).unwrap()),
            Document::new("3", serde_json::from_value(serde_json::json!({"title": 7})).unwrap()),
        ];
        let titles = existing_titles(&docs);
        assert_eq!(titles.len(), 1);
        assert!(titles.contains("A"));
    }

    #[test]
    fn error_mapping_follows_the_failing_step() {
        assert!(matches!(
            SeedError::from_fetch(StoreError::Decode("x".into())),
            SeedError::StoreUnavailable(_)
        ));
        assert!(matches!(
            SeedError::from_commit(StoreError::Unavailable("x".into())),
            SeedError::StoreUnavailable(_)
        ));
        assert!(matches!(
            SeedError::from_commit(StoreError::WriteRejected("x".into())),
            SeedError::StoreWriteRejected(_)
        ));
    }
}
