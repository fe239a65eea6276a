use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::credentials::TokenSource;
use crate::error::{FirebaseError, Result};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";
const CUSTOM_TOKEN_DURATION_SECS: i64 = 3600;
/// An unknown `kid` triggers at most one key refetch per interval.
const MIN_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Claims of a verified Firebase ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub email: Option<String>,
}

impl IdTokenClaims {
    /// The Firebase user id.
    pub fn uid(&self) -> &str {
        &self.sub
    }
}

#[derive(Debug, Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    uid: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserResponse {
    local_id: String,
}

struct KeyCache {
    set: JwkSet,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn refresh_allowed(&self, now: Instant) -> bool {
        self.fetched_at
            .map_or(true, |at| now.duration_since(at) >= MIN_KEY_REFRESH_INTERVAL)
    }
}

/// Firebase Authentication admin operations.
pub struct FirebaseAuth {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    keys: RwLock<KeyCache>,
}

impl FirebaseAuth {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            tokens,
            keys: RwLock::new(KeyCache {
                set: JwkSet { keys: Vec::new() },
                fetched_at: None,
            }),
        }
    }

    fn project_id(&self) -> &str {
        &self.tokens.account().project_id
    }

    /// Verify a client ID token: RS256 signature from Google's securetoken
    /// keys, audience = project id, issuer = securetoken/{project}, not expired.
    pub async fn verify_id_token(&self, token: &str) -> Result<IdTokenClaims> {
        let header = decode_header(token).map_err(|e| FirebaseError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(FirebaseError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| FirebaseError::InvalidToken("token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<IdTokenClaims>(token, &key, &id_token_validation(self.project_id()))
            .map_err(|e| FirebaseError::InvalidToken(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(FirebaseError::InvalidToken("token has an empty subject".to_string()));
        }
        Ok(data.claims)
    }

    /// Create an email/password user. Returns the new uid.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<String> {
        let url = format!(
            "{}/projects/{}/accounts",
            IDENTITY_TOOLKIT_URL,
            self.project_id()
        );
        let access_token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(FirebaseError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let created: CreateUserResponse = serde_json::from_str(&body)?;
        tracing::info!(uid = %created.local_id, "Created Firebase user");
        Ok(created.local_id)
    }

    /// Mint a custom token a client can exchange for an ID token.
    pub fn create_custom_token(&self, uid: &str) -> Result<String> {
        let account = self.tokens.account();
        account.sign(&custom_token_claims(
            &account.client_email,
            uid,
            Utc::now(),
        ))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        {
            let keys = self.keys.read().await;
            if let Some(jwk) = keys.set.find(kid) {
                return jwk_to_key(jwk);
            }
        }

        // Unknown kid: Google rotated keys or we never fetched them. The write
        // lock serializes refreshes; re-check once we hold it.
        let mut keys = self.keys.write().await;
        if let Some(jwk) = keys.set.find(kid) {
            return jwk_to_key(jwk);
        }
        if !keys.refresh_allowed(Instant::now()) {
            return Err(FirebaseError::InvalidToken(format!("unknown key id {kid}")));
        }

        keys.fetched_at = Some(Instant::now());
        keys.set = self.fetch_keys().await?;
        match keys.set.find(kid) {
            Some(jwk) => jwk_to_key(jwk),
            None => Err(FirebaseError::InvalidToken(format!("unknown key id {kid}"))),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        let resp = self.http.get(JWKS_URL).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(FirebaseError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let keys: JwkSet = serde_json::from_str(&body)?;
        tracing::debug!(count = keys.keys.len(), "Fetched Firebase token signing keys");
        Ok(keys)
    }
}

fn jwk_to_key(jwk: &jsonwebtoken::jwk::Jwk) -> Result<DecodingKey> {
    DecodingKey::from_jwk(jwk).map_err(|e| FirebaseError::InvalidToken(e.to_string()))
}

fn id_token_validation(project_id: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[project_id]);
    validation.set_issuer(&[format!("https://securetoken.google.com/{project_id}")]);
    validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
    validation
}

fn custom_token_claims<'a>(
    client_email: &'a str,
    uid: &'a str,
    now: DateTime<Utc>,
) -> CustomTokenClaims<'a> {
    CustomTokenClaims {
        iss: client_email,
        sub: client_email,
        aud: CUSTOM_TOKEN_AUDIENCE,
        iat: now.timestamp(),
        exp: now.timestamp() + CUSTOM_TOKEN_DURATION_SECS,
        uid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ServiceAccount;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_auth() -> FirebaseAuth {
        let account = ServiceAccount::from_json(
            &json!({
                "project_id": "activenomads",
                "client_email": "admin@activenomads.iam.gserviceaccount.com",
                "private_key": "unused",
            })
            .to_string(),
        )
        .unwrap();
        let http = reqwest::Client::new();
        FirebaseAuth::new(http.clone(), Arc::new(TokenSource::new(account, http)))
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let err = test_auth().verify_id_token("garbage").await.unwrap_err();
        assert!(matches!(err, FirebaseError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn rejects_symmetric_tokens_before_touching_the_network() {
        let claims = json!({"sub": "u1", "aud": "activenomads", "exp": 9_999_999_999i64});
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"not-google"),
        )
        .unwrap();
        let err = test_auth().verify_id_token(&token).await.unwrap_err();
        assert!(matches!(err, FirebaseError::InvalidToken(msg) if msg.contains("algorithm")));
    }

    #[tokio::test]
    async fn unknown_key_ids_do_not_refetch_within_the_interval() {
        let auth = test_auth();
        auth.keys.write().await.fetched_at = Some(Instant::now());

        // A fetch would fail with a network or API error; the throttle
        // answers with an invalid token instead.
        for kid in ["forged-1", "forged-2", "forged-3"] {
            let err = auth.decoding_key(kid).await.err().unwrap();
            assert!(
                matches!(&err, FirebaseError::InvalidToken(msg) if msg.contains(kid)),
                "{err}"
            );
        }
        assert!(auth.keys.read().await.set.keys.is_empty());
    }

    #[test]
    fn refresh_window() {
        let now = Instant::now();
        let never = KeyCache {
            set: JwkSet { keys: Vec::new() },
            fetched_at: None,
        };
        assert!(never.refresh_allowed(now));

        let recent = KeyCache {
            fetched_at: Some(now),
            ..never
        };
        assert!(!recent.refresh_allowed(now + Duration::from_secs(5)));
        assert!(recent.refresh_allowed(now + MIN_KEY_REFRESH_INTERVAL));
    }

    #[test]
    fn validation_pins_project() {
        let validation = id_token_validation("activenomads");
        assert_eq!(validation.algorithms, vec![Algorithm::RS256]);
        assert!(validation
            .iss
            .as_ref()
            .unwrap()
            .contains("https://securetoken.google.com/activenomads"));
        assert!(validation.aud.as_ref().unwrap().contains("activenomads"));
    }

    #[test]
    fn custom_token_claims_target_identity_toolkit() {
        let now = Utc::now();
        let claims = custom_token_claims("svc@x.iam.gserviceaccount.com", "uid-1", now);
        assert_eq!(claims.aud, CUSTOM_TOKEN_AUDIENCE);
        assert_eq!(claims.iss, claims.sub);
        assert_eq!(claims.uid, "uid-1");
        assert_eq!(claims.exp - claims.iat, CUSTOM_TOKEN_DURATION_SECS);
    }

    #[test]
    fn custom_token_needs_a_real_key() {
        assert!(matches!(
            test_auth().create_custom_token("uid-1"),
            Err(FirebaseError::Credentials(_))
        ));
    }
}
