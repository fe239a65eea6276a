//! In-memory [`DocumentStore`] for tests and local runs.
//!
//! Stateful, ordered by insertion, with knobs to make reads or the next
//! commit fail and a counter of write calls so tests can assert "no writes".

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{
    check_collection, check_document_path, BatchWrite, Document, DocumentStore, FieldChange,
    Fields, StoreError,
};

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Document>>,
    next_id: u64,
    write_calls: usize,
    read_failure: Option<StoreError>,
    commit_failure: Option<StoreError>,
    max_batch: Option<usize>,
}

impl MemoryState {
    fn check_reads(&self) -> Result<(), StoreError> {
        match &self.read_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn exists(&self, collection: &str, id: &str) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|d| d.id == id))
    }

    fn upsert(&mut self, collection: &str, id: &str, fields: Fields) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        match docs.iter().position(|d| d.id == id) {
            Some(i) => docs[i].fields = fields,
            None => docs.push(Document::new(id, fields)),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing write accounting.
    pub fn insert(&self, collection: &str, id: &str, fields: Value) -> &Self {
        let fields = match fields {
            Value::Object(map) => map,
            other => panic!("MemoryStore::insert expects an object, got {other}"),
        };
        self.lock().upsert(collection, id, fields);
        self
    }

    /// Every read fails with `err` until cleared.
    pub fn fail_reads(&self, err: StoreError) {
        self.lock().read_failure = Some(err);
    }

    pub fn clear_read_failure(&self) {
        self.lock().read_failure = None;
    }

    /// The next commit (batch or update) fails with `err` and applies nothing.
    pub fn fail_next_commit(&self, err: StoreError) {
        self.lock().commit_failure = Some(err);
    }

    /// Reject batches with more than `max` writes, like Firestore's 500-write cap.
    pub fn limit_batch_size(&self, max: usize) {
        self.lock().max_batch = Some(max);
    }

    /// Number of commit/update calls that reached the store, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// Snapshot of a collection.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panicking test thread must not wedge every other assertion.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let state = self.lock();
        state.check_reads()?;
        Ok(state.collections.get(collection).cloned().unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        check_document_path(collection, id)?;
        let state = self.lock();
        state.check_reads()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn get_many(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        for id in ids {
            check_document_path(collection, id)?;
        }
        let state = self.lock();
        state.check_reads()?;
        let Some(docs) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| docs.iter().find(|d| &d.id == id))
            .cloned()
            .collect())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let state = self.lock();
        state.check_reads()?;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.fields.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn new_document_id(&self, _collection: &str) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        format!("mem-{:06}", state.next_id)
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<(), StoreError> {
        for write in &writes {
            let (collection, id) = write.target();
            check_document_path(collection, id)?;
        }

        let mut state = self.lock();
        state.write_calls += 1;

        if let Some(err) = state.commit_failure.take() {
            return Err(err);
        }
        if let Some(max) = state.max_batch {
            if writes.len() > max {
                return Err(StoreError::WriteRejected(format!(
                    "batch of {} writes exceeds limit of {max}",
                    writes.len()
                )));
            }
        }
        for write in &writes {
            if let BatchWrite::Create { collection, id, .. } = write {
                if state.exists(collection, id) {
                    return Err(StoreError::WriteRejected(format!(
                        "document {collection}/{id} already exists"
                    )));
                }
            }
        }

        // Validation is done; holding the lock makes the rest all-or-nothing.
        for write in writes {
            match write {
                BatchWrite::Set {
                    collection,
                    id,
                    fields,
                }
                | BatchWrite::Create {
                    collection,
                    id,
                    fields,
                } => state.upsert(&collection, &id, fields),
                BatchWrite::Delete { collection, id } => {
                    if let Some(docs) = state.collections.get_mut(&collection) {
                        docs.retain(|d| d.id != id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Vec<FieldChange>,
    ) -> Result<(), StoreError> {
        check_document_path(collection, id)?;
        let mut state = self.lock();
        state.write_calls += 1;

        if let Some(err) = state.commit_failure.take() {
            return Err(err);
        }

        let doc = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for change in changes {
            match change {
                FieldChange::Set(field, value) => {
                    doc.fields.insert(field, value);
                }
                FieldChange::ArrayUnion(field, elements) => {
                    let slot = doc
                        .fields
                        .entry(field)
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(items) = slot {
                        for element in elements {
                            if !items.contains(&element) {
                                items.push(element);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
