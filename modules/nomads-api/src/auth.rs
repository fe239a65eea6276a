use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use thiserror::Error;

use firebase_client::{FirebaseAuth, FirebaseError};

use crate::error::ApiError;
use crate::AppState;

/// Caller identity recovered from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    InvalidToken(String),

    /// The identity service refused the request (e.g. email already in use).
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Unavailable(String),
}

impl From<FirebaseError> for AuthError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::InvalidToken(msg) => AuthError::InvalidToken(msg),
            FirebaseError::Api { status, message } if (400..500).contains(&status) => {
                AuthError::Rejected(message)
            }
            other => AuthError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Identity, AuthError>;

    /// Register an email/password account and return its uid.
    async fn create_user(&self, email: &str, password: &str) -> Result<String, AuthError>;

    async fn create_custom_token(&self, uid: &str) -> Result<String, AuthError>;
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verify_id_token(token).await?;
        Ok(Identity {
            uid: claims.uid().to_string(),
            email: claims.email,
        })
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<String, AuthError> {
        Ok(FirebaseAuth::create_user(self, email, password).await?)
    }

    async fn create_custom_token(&self, uid: &str) -> Result<String, AuthError> {
        Ok(FirebaseAuth::create_custom_token(self, uid)?)
    }
}

/// Token from `Authorization`, with or without the `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// Verify a token carried in the request body or query, falling back to the
/// `Authorization` header.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    explicit: Option<&str>,
) -> Result<Identity, ApiError> {
    let token = explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
        .ok_or(ApiError::MissingToken)?;
    Ok(state.identity.verify_token(token).await?)
}

/// Authenticated caller. Extract this in handlers that read the token from
/// the `Authorization` header.
pub struct AuthUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers, None).await.map(AuthUser)
    }
}
