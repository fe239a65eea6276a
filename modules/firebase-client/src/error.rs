use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirebaseError>;

#[derive(Debug, Error)]
pub enum FirebaseError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),
}

impl FirebaseError {
    /// True for HTTP statuses that mean "the server is fine, your request isn't".
    pub fn is_rejection(&self) -> bool {
        matches!(self, FirebaseError::Api { status, .. } if matches!(status, 400 | 409 | 412 | 413))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FirebaseError::Api { status: 404, .. })
    }
}

impl From<reqwest::Error> for FirebaseError {
    fn from(err: reqwest::Error) -> Self {
        FirebaseError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FirebaseError {
    fn from(err: serde_json::Error) -> Self {
        FirebaseError::Parse(err.to_string())
    }
}
