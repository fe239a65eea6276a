use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub type Fields = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Malformed document: {0}")]
    Decode(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('/')
}

/// A document id is a single path segment: non-empty, no `/`, not `.` or `..`.
pub fn check_document_id(id: &str) -> Result<(), StoreError> {
    if is_valid_segment(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(format!("bad document id {id:?}")))
    }
}

/// Collections may nest (`users/u1/interestedEvents`) but every segment
/// follows the document id rules.
pub fn check_collection(collection: &str) -> Result<(), StoreError> {
    if collection.split('/').all(is_valid_segment) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(format!("bad collection {collection:?}")))
    }
}

/// Both halves of `collection/id`.
pub fn check_document_path(collection: &str, id: &str) -> Result<(), StoreError> {
    check_collection(collection)?;
    check_document_id(id)
}

/// A document: store-assigned id plus schema-less fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserialize the [`Document::into_json`] shape into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.clone().into_json())
            .map_err(|e| StoreError::Decode(format!("{}: {e}", self.id)))
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// `{"id": ..., ...fields}`, the shape list endpoints return.
    /// A stored `id` field is shadowed by the document id.
    pub fn into_json(self) -> Value {
        let mut object = self.fields;
        object.insert("id".to_string(), Value::String(self.id));
        Value::Object(object)
    }
}

/// Serialize a record into document fields. Non-object values are rejected.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Decode(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(StoreError::Decode(e.to_string())),
    }
}

/// In-place modification of one field of an existing document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Set(String, Value),
    /// Append each element not already present in the array field.
    ArrayUnion(String, Vec<Value>),
}

/// One write of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite {
    /// Create or overwrite.
    Set {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Create only; the whole batch fails if the document already exists.
    Create {
        collection: String,
        id: String,
        fields: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl BatchWrite {
    /// `(collection, id)` of the written document.
    pub fn target(&self) -> (&str, &str) {
        match self {
            BatchWrite::Set { collection, id, .. }
            | BatchWrite::Create { collection, id, .. }
            | BatchWrite::Delete { collection, id } => (collection, id),
        }
    }
}

/// Collections are slash paths (`events`, `users/{uid}/interestedEvents`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document of a collection, in store order.
    async fn fetch_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// The documents among `ids` that exist.
    async fn get_many(&self, collection: &str, ids: &[String])
        -> Result<Vec<Document>, StoreError>;

    /// Documents whose `field` equals `value` exactly.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Allocate an id for a future write; nothing is written.
    fn new_document_id(&self, collection: &str) -> String;

    /// Apply all writes or none.
    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<(), StoreError>;

    /// Modify an existing document. `NotFound` if it does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Vec<FieldChange>,
    ) -> Result<(), StoreError>;

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.commit_batch(vec![BatchWrite::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        }])
        .await
    }

    /// Write under a fresh id and return it.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = self.new_document_id(collection);
        self.commit_batch(vec![BatchWrite::Create {
            collection: collection.to_string(),
            id: id.clone(),
            fields,
        }])
        .await?;
        Ok(id)
    }

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.commit_batch(vec![BatchWrite::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }])
        .await
    }
}
