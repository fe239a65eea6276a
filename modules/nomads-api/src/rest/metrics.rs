use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use nomads_common::{MetricEntry, MetricsRecord};
use nomads_store::{to_fields, FieldChange};

use super::METRICS;
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRequest {
    pub token: Option<String>,
    pub weight: f64,
    pub measurement_date: String,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_measurement_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid measurementDate: {raw}")))
}

/// POST /metrics: Append a weight measurement to the caller's history.
pub async fn add_metric(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<MetricRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let identity = authenticate(&state, &headers, req.token.as_deref()).await?;

    let entry = MetricEntry {
        weight: req.weight,
        measurement_date: parse_measurement_date(&req.measurement_date)?,
    };
    let now = Utc::now();

    match state.store.get(METRICS, &identity.uid).await? {
        None => {
            let record = MetricsRecord {
                metrics: vec![entry],
                updated_at: now,
            };
            state
                .store
                .set(METRICS, &identity.uid, to_fields(&record)?)
                .await?;
        }
        Some(_) => {
            let entry = serde_json::to_value(&entry)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state
                .store
                .update(
                    METRICS,
                    &identity.uid,
                    vec![
                        FieldChange::ArrayUnion("metrics".to_string(), vec![entry]),
                        FieldChange::Set("updatedAt".to_string(), json!(now)),
                    ],
                )
                .await?;
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Metrics added successfully" })),
    ))
}

/// GET /metrics?token=: The caller's metrics document (`metrics`, `updatedAt`).
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let identity = authenticate(&state, &headers, query.token.as_deref()).await?;

    let doc = state
        .store
        .get(METRICS, &identity.uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("No metrics found for this user".to_string()))?;
    Ok(Json(Value::Object(doc.fields)))
}
