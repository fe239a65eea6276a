//! Test doubles for the identity service and a request helper for the router.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, StatusCode,
    },
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use nomads_store::MemoryStore;

use crate::auth::{AuthError, Identity, IdentityProvider};
use crate::routes::build_router;
use crate::AppState;

// ---------------------------------------------------------------------------
// FakeIdentity
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeIdentityState {
    tokens: HashMap<String, String>,
    emails: HashSet<String>,
    next_uid: u32,
}

/// Accepts only tokens handed out by [`FakeIdentity::register`].
#[derive(Default)]
pub struct FakeIdentity {
    state: Mutex<FakeIdentityState>,
}

impl FakeIdentity {
    /// Make `uid` a known user and return a token that verifies as them.
    pub fn register(&self, uid: &str) -> String {
        let token = format!("token-{uid}");
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token.clone(), uid.to_string());
        token
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(token)
            .map(|uid| Identity {
                uid: uid.clone(),
                email: None,
            })
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }

    async fn create_user(&self, email: &str, _password: &str) -> Result<String, AuthError> {
        let mut state = self.state.lock().unwrap();
        if !state.emails.insert(email.to_string()) {
            return Err(AuthError::Rejected("EMAIL_EXISTS".to_string()));
        }
        state.next_uid += 1;
        Ok(format!("uid-{}", state.next_uid))
    }

    async fn create_custom_token(&self, uid: &str) -> Result<String, AuthError> {
        Ok(format!("custom-{uid}"))
    }
}

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub identity: Arc<FakeIdentity>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(FakeIdentity::default());
        let router = build_router(Arc::new(AppState {
            store: store.clone(),
            identity: identity.clone(),
        }));
        Self {
            store,
            identity,
            router,
        }
    }
}

/// Send one request through the router. Non-JSON bodies come back as `Null`.
pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            request = request.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
