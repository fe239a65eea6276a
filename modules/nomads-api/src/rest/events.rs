use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use nomads_common::{EventFields, StoredEvent};
use nomads_store::{to_fields, BatchWrite, Document, EVENTS_COLLECTION};

use super::{attended_collection, documents_json, interested_collection, REVIEWS};
use crate::auth::{authenticate, AuthUser};
use crate::error::ApiError;
use crate::AppState;

// --- Catalog ---

/// GET /events: The catalog. Documents that do not decode as events are left out.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StoredEvent>>, ApiError> {
    let docs = state.store.fetch_all(EVENTS_COLLECTION).await?;
    let events = docs
        .iter()
        .filter_map(|doc| match doc.decode::<StoredEvent>() {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "Skipping malformed event document");
                None
            }
        })
        .collect();
    Ok(Json(events))
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub token: Option<String>,
    pub event: EventFields,
}

/// POST /events: Add one event to the catalog under a fresh id.
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let identity = authenticate(&state, &headers, req.token.as_deref()).await?;
    if req.event.title.trim().is_empty() {
        return Err(ApiError::BadRequest("event title is required".to_string()));
    }

    let id = state
        .store
        .add(EVENTS_COLLECTION, to_fields(&req.event)?)
        .await?;
    info!(id = %id, uid = %identity.uid, title = %req.event.title, "Event created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event added successfully", "id": id })),
    ))
}

async fn catalog_event(state: &AppState, event_id: &str) -> Result<Document, ApiError> {
    state
        .store
        .get(EVENTS_COLLECTION, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub event_id: String,
}

// --- Interested ---

/// GET /interested-events
pub async fn list_interested(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Value>>, ApiError> {
    let docs = state
        .store
        .fetch_all(&interested_collection(&identity.uid))
        .await?;
    Ok(Json(documents_json(docs)))
}

/// POST /interested-events: Snapshot a catalog event into the caller's list.
pub async fn add_interested(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    body: Result<Json<EventRef>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let event = catalog_event(&state, &req.event_id).await?;

    state
        .store
        .set(&interested_collection(&identity.uid), &event.id, event.fields)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event added to interested events" })),
    ))
}

/// DELETE /interested-events/{event_id}
pub async fn remove_interested(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .delete(&interested_collection(&identity.uid), &event_id)
        .await?;
    Ok(Json(json!({ "message": "Event removed from interested events" })))
}

// --- Attended ---

/// GET /attended-events
pub async fn list_attended(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Value>>, ApiError> {
    let docs = state
        .store
        .fetch_all(&attended_collection(&identity.uid))
        .await?;
    Ok(Json(documents_json(docs)))
}

/// POST /attended-events: Copy into attended and drop from interested, atomically.
pub async fn mark_attended(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    body: Result<Json<EventRef>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let event = catalog_event(&state, &req.event_id).await?;

    state
        .store
        .commit_batch(vec![
            BatchWrite::Set {
                collection: attended_collection(&identity.uid),
                id: event.id.clone(),
                fields: event.fields,
            },
            BatchWrite::Delete {
                collection: interested_collection(&identity.uid),
                id: event.id,
            },
        ])
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event marked as attended" })),
    ))
}

/// GET /events-for-feedback: Attended events the caller has not reviewed yet.
pub async fn events_for_feedback(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Value>>, ApiError> {
    let attended = state
        .store
        .fetch_all(&attended_collection(&identity.uid))
        .await?;
    let reviews = state
        .store
        .find_by_field(REVIEWS, "userId", &json!(identity.uid))
        .await?;

    let reviewed: HashSet<&str> = reviews.iter().filter_map(|r| r.str_field("event")).collect();
    let pending: Vec<Document> = attended
        .iter()
        .filter(|e| !reviewed.contains(e.id.as_str()))
        .cloned()
        .collect();

    Ok(Json(documents_json(pending)))
}
