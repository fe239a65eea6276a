use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::credentials::TokenSource;
use crate::error::{FirebaseError, Result};
use crate::value::{decode_fields, encode_fields, encode_value, quote_field_path};

const BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";
const PAGE_SIZE: u32 = 300;
/// Length of auto-generated document ids, same as the Firebase SDKs.
const AUTO_ID_LEN: usize = 20;

/// A decoded Firestore document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn decode(self) -> Result<Document> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(Document {
            id,
            fields: decode_fields(&self.fields)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct BatchGetItem {
    found: Option<RawDocument>,
}

#[derive(Deserialize)]
struct RunQueryItem {
    document: Option<RawDocument>,
}

/// One element of an atomic commit. Paths are relative to the database
/// root, e.g. `users/abc/interestedEvents/evt1`.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or overwrite the whole document.
    Set { path: String, fields: Map<String, Value> },
    /// Create the document; fails if it already exists.
    Create { path: String, fields: Map<String, Value> },
    /// Patch an existing document: overwrite `set` fields and append missing
    /// elements to array fields. Fails if the document does not exist.
    Update {
        path: String,
        set: Map<String, Value>,
        array_unions: Vec<(String, Vec<Value>)>,
    },
    Delete { path: String },
}

impl Write {
    pub fn path(&self) -> &str {
        match self {
            Write::Set { path, .. }
            | Write::Create { path, .. }
            | Write::Update { path, .. }
            | Write::Delete { path } => path,
        }
    }
}

/// Firestore v1 REST client bound to one project's default database.
#[derive(Clone)]
pub struct Firestore {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    project_id: String,
}

impl Firestore {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenSource>) -> Self {
        let project_id = tokens.account().project_id.clone();
        Self {
            http,
            tokens,
            project_id,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `projects/{p}/databases/(default)/documents`
    pub fn documents_root(&self) -> String {
        documents_root(&self.project_id)
    }

    /// Allocate a document id without writing anything.
    pub fn new_document_id(&self) -> String {
        auto_id()
    }

    /// Every document directly inside `collection`, following page tokens.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        check_path(collection)?;
        let url = format!("{}/{}/{}", BASE_URL, self.documents_root(), collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let req = self.http.get(&url).query(&query);
            let page: ListDocumentsResponse = self.send_json(req).await?;
            for raw in page.documents {
                documents.push(raw.decode()?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(collection, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    /// Fetch one document; `None` when it does not exist.
    pub async fn get_document(&self, path: &str) -> Result<Option<Document>> {
        check_path(path)?;
        let url = format!("{}/{}/{}", BASE_URL, self.documents_root(), path);
        let req = self.http.get(&url);
        match self.send_json::<RawDocument>(req).await {
            Ok(raw) => Ok(Some(raw.decode()?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch several documents in one round trip. Missing ones are skipped.
    pub async fn batch_get(&self, paths: &[String]) -> Result<Vec<Document>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        for path in paths {
            check_path(path)?;
        }

        let root = self.documents_root();
        let names: Vec<String> = paths.iter().map(|p| format!("{root}/{p}")).collect();
        let url = format!("{}/{}:batchGet", BASE_URL, root);
        let req = self.http.post(&url).json(&json!({ "documents": names }));

        let items: Vec<BatchGetItem> = self.send_json(req).await?;
        items
            .into_iter()
            .filter_map(|item| item.found)
            .map(RawDocument::decode)
            .collect()
    }

    /// Documents of `collection` whose `field` equals `value`.
    pub async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        check_path(collection)?;
        let (parent, collection_id) = split_collection(collection);
        let parent_name = match parent {
            Some(parent) => format!("{}/{}", self.documents_root(), parent),
            None => self.documents_root(),
        };

        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection_id }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": quote_field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let url = format!("{}/{}:runQuery", BASE_URL, parent_name);
        let req = self.http.post(&url).json(&body);
        let items: Vec<RunQueryItem> = self.send_json(req).await?;
        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(RawDocument::decode)
            .collect()
    }

    /// Apply all writes atomically.
    pub async fn commit(&self, writes: &[Write]) -> Result<()> {
        for write in writes {
            check_path(write.path())?;
        }
        let root = self.documents_root();
        let body = json!({
            "writes": writes.iter().map(|w| write_to_json(&root, w)).collect::<Vec<_>>(),
        });

        let url = format!("{}/{}:commit", BASE_URL, root);
        let req = self.http.post(&url).json(&body);
        let _: Value = self.send_json(req).await?;

        tracing::debug!(writes = writes.len(), "Committed Firestore writes");
        Ok(())
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let resp = req.bearer_auth(token).send().await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(FirebaseError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Relative paths end up in request URLs, where `.` and `..` segments would
/// be resolved away. Reject them along with empty segments.
fn check_path(path: &str) -> Result<()> {
    let bad = path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(FirebaseError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn documents_root(project_id: &str) -> String {
    format!("projects/{project_id}/databases/{DEFAULT_DATABASE}/documents")
}

fn auto_id() -> String {
    Uuid::new_v4().simple().to_string()[..AUTO_ID_LEN].to_string()
}

/// `users/u1/reviews` -> (Some("users/u1"), "reviews"); `events` -> (None, "events").
fn split_collection(collection: &str) -> (Option<&str>, &str) {
    match collection.rsplit_once('/') {
        Some((parent, id)) => (Some(parent), id),
        None => (None, collection),
    }
}

fn write_to_json(root: &str, write: &Write) -> Value {
    match write {
        Write::Set { path, fields } => json!({
            "update": { "name": format!("{root}/{path}"), "fields": encode_fields(fields) },
        }),
        Write::Create { path, fields } => json!({
            "update": { "name": format!("{root}/{path}"), "fields": encode_fields(fields) },
            "currentDocument": { "exists": false },
        }),
        Write::Update {
            path,
            set,
            array_unions,
        } => {
            let mask: Vec<String> = set.keys().map(|k| quote_field_path(k)).collect();
            let transforms: Vec<Value> = array_unions
                .iter()
                .map(|(field, elements)| {
                    json!({
                        "fieldPath": quote_field_path(field),
                        "appendMissingElements": {
                            "values": elements.iter().map(encode_value).collect::<Vec<_>>(),
                        },
                    })
                })
                .collect();
            json!({
                "update": { "name": format!("{root}/{path}"), "fields": encode_fields(set) },
                "updateMask": { "fieldPaths": mask },
                "updateTransforms": transforms,
                "currentDocument": { "exists": true },
            })
        }
        Write::Delete { path } => json!({ "delete": format!("{root}/{path}") }),
    }
}
