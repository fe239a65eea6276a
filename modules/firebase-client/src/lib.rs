pub mod auth;
pub mod credentials;
pub mod error;
pub mod firestore;
pub mod value;

pub use auth::{FirebaseAuth, IdTokenClaims};
pub use credentials::{ServiceAccount, TokenSource};
pub use error::{FirebaseError, Result};
pub use firestore::{Document, Firestore, Write};

use std::sync::Arc;
use std::time::Duration;

/// Firestore and Auth clients sharing one HTTP client and one access token.
#[derive(Clone)]
pub struct FirebaseApp {
    pub firestore: Firestore,
    pub auth: Arc<FirebaseAuth>,
}

impl FirebaseApp {
    /// Build both clients from the service account key file contents.
    pub fn from_service_account_json(raw: &str) -> Result<Self> {
        let account = ServiceAccount::from_json(raw)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        tracing::info!(project_id = %account.project_id, "Initializing Firebase clients");

        let tokens = Arc::new(TokenSource::new(account, http.clone()));
        Ok(Self {
            firestore: Firestore::new(http.clone(), tokens.clone()),
            auth: Arc::new(FirebaseAuth::new(http, tokens)),
        })
    }
}
