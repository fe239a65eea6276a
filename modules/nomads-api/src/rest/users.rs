use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use nomads_common::UserProfile;
use nomads_store::to_fields;

use super::USERS;
use crate::auth::{authenticate, AuthUser};
use crate::error::ApiError;
use crate::AppState;

/// GET /user-info: The caller's stored profile.
pub async fn user_info(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let doc = state
        .store
        .get(USERS, &identity.uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(Value::Object(doc.fields)))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// POST /signup: Create an account and hand back a custom token for it.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let uid = state.identity.create_user(req.email.trim(), &req.password).await?;
    let token = state.identity.create_custom_token(&uid).await?;
    info!(uid = %uid, "User signed up");

    Ok((StatusCode::CREATED, Json(json!({ "uid": uid, "token": token }))))
}

#[derive(Deserialize)]
pub struct AffiliateRequest {
    pub token: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<u32>,
}

/// POST /affiliate: Store (or replace) the caller's profile.
pub async fn affiliate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AffiliateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let identity = authenticate(&state, &headers, req.token.as_deref()).await?;

    let profile = UserProfile {
        name: req.name,
        gender: req.gender,
        weight: req.weight,
        height: req.height,
        age: req.age,
        created_at: Utc::now(),
    };
    state
        .store
        .set(USERS, &identity.uid, to_fields(&profile)?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User data saved successfully" })),
    ))
}
