use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use nomads_common::ReviewDraft;
use nomads_store::{check_document_id, to_fields, EVENTS_COLLECTION};

use super::REVIEWS;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

const UNKNOWN_EVENT: &str = "Unknown event";

/// POST /reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    body: Result<Json<ReviewDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(draft) = body?;
    let review = draft.validate(&identity.uid, Utc::now())?;
    check_document_id(&review.event)?;

    let id = state.store.add(REVIEWS, to_fields(&review)?).await?;
    info!(id = %id, uid = %identity.uid, event = %review.event, "Review created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Review created successfully" })),
    ))
}

/// GET /user-reviews-with-events: The caller's reviews, each with its event title.
pub async fn user_reviews_with_events(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Value>>, ApiError> {
    let reviews = state
        .store
        .find_by_field(REVIEWS, "userId", &json!(identity.uid))
        .await?;
    if reviews.is_empty() {
        return Err(ApiError::NotFound("No reviews found".to_string()));
    }

    let mut event_ids: Vec<String> = reviews
        .iter()
        .filter_map(|r| r.str_field("event"))
        .filter(|id| check_document_id(id).is_ok())
        .map(str::to_string)
        .collect();
    event_ids.sort();
    event_ids.dedup();

    let events = state.store.get_many(EVENTS_COLLECTION, &event_ids).await?;
    let titles: HashMap<&str, &str> = events
        .iter()
        .filter_map(|e| e.str_field("title").map(|t| (e.id.as_str(), t)))
        .collect();

    let joined = reviews
        .iter()
        .map(|review| {
            let event_name = review
                .str_field("event")
                .and_then(|id| titles.get(id).copied())
                .unwrap_or(UNKNOWN_EVENT);
            let mut out = review.clone().into_json();
            if let Value::Object(map) = &mut out {
                map.insert("eventName".to_string(), json!(event_name));
            }
            out
        })
        .collect();

    Ok(Json(joined))
}
