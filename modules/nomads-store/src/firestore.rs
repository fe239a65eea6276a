use async_trait::async_trait;
use serde_json::Value;

use firebase_client::{FirebaseError, Firestore, Write};

use crate::store::{
    check_collection, check_document_path, BatchWrite, Document, DocumentStore, FieldChange,
    Fields, StoreError,
};

impl From<FirebaseError> for StoreError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::Parse(msg) => StoreError::Decode(msg),
            FirebaseError::InvalidPath(msg) => StoreError::InvalidPath(msg),
            e if e.is_rejection() => StoreError::WriteRejected(e.to_string()),
            e => StoreError::Unavailable(e.to_string()),
        }
    }
}

fn convert(doc: firebase_client::Document) -> Document {
    Document::new(doc.id, doc.fields)
}

fn path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

#[async_trait]
impl DocumentStore for Firestore {
    async fn fetch_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let docs = self.list_documents(collection).await?;
        Ok(docs.into_iter().map(convert).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        check_document_path(collection, id)?;
        let doc = self.get_document(&path(collection, id)).await?;
        Ok(doc.map(convert))
    }

    async fn get_many(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        for id in ids {
            check_document_path(collection, id)?;
        }
        let paths: Vec<String> = ids.iter().map(|id| path(collection, id)).collect();
        let docs = self.batch_get(&paths).await?;
        Ok(docs.into_iter().map(convert).collect())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let docs = self.query_equal(collection, field, value).await?;
        Ok(docs.into_iter().map(convert).collect())
    }

    fn new_document_id(&self, _collection: &str) -> String {
        Firestore::new_document_id(self)
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        for write in &writes {
            let (collection, id) = write.target();
            check_document_path(collection, id)?;
        }
        let writes: Vec<Write> = writes
            .into_iter()
            .map(|w| match w {
                BatchWrite::Set {
                    collection,
                    id,
                    fields,
                } => Write::Set {
                    path: path(&collection, &id),
                    fields,
                },
                BatchWrite::Create {
                    collection,
                    id,
                    fields,
                } => Write::Create {
                    path: path(&collection, &id),
                    fields,
                },
                BatchWrite::Delete { collection, id } => Write::Delete {
                    path: path(&collection, &id),
                },
            })
            .collect();
        self.commit(&writes).await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Vec<FieldChange>,
    ) -> Result<(), StoreError> {
        check_document_path(collection, id)?;
        let mut set = Fields::new();
        let mut array_unions = Vec::new();
        for change in changes {
            match change {
                FieldChange::Set(field, value) => {
                    set.insert(field, value);
                }
                FieldChange::ArrayUnion(field, elements) => array_unions.push((field, elements)),
            }
        }

        let write = Write::Update {
            path: path(collection, id),
            set,
            array_unions,
        };
        match self.commit(&[write]).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
