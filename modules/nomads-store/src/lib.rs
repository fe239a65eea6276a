//! Document storage behind a trait, plus the event seeder.
//!
//! Handlers and the seeder only see [`DocumentStore`]. Production wires in
//! Firestore; tests use [`MemoryStore`].

pub mod firestore;
pub mod memory;
pub mod seeder;
pub mod store;

pub use memory::MemoryStore;
pub use seeder::{
    load_candidates, DuplicatePolicy, EventSeeder, SeedError, SeedReport, EVENTS_COLLECTION,
};
pub use store::{
    check_collection, check_document_id, check_document_path, to_fields, BatchWrite, Document,
    DocumentStore, FieldChange, Fields, StoreError,
};
