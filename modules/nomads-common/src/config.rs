use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use crate::error::NomadsError;

/// What the server does with the seed list when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Do not seed on startup.
    #[default]
    Skip,
    /// Seed, log a failure and keep serving.
    Warn,
    /// Seed, refuse to start when seeding fails.
    Abort,
}

impl FromStr for SeedPolicy {
    type Err = NomadsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "off" | "" => Ok(SeedPolicy::Skip),
            "warn" => Ok(SeedPolicy::Warn),
            "abort" | "fatal" => Ok(SeedPolicy::Abort),
            other => Err(NomadsError::Config(format!(
                "SEED_ON_STARTUP must be one of skip, warn, abort (got {other:?})"
            ))),
        }
    }
}

impl std::fmt::Display for SeedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedPolicy::Skip => write!(f, "skip"),
            SeedPolicy::Warn => write!(f, "warn"),
            SeedPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Firebase service account JSON. Only needed once something talks to Firebase.
    pub firebase_service_account: Option<String>,

    // Seeding
    pub seed_events_path: PathBuf,
    pub seed_on_startup: SeedPolicy,
    pub strict_seed_titles: bool,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, NomadsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NomadsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let web_port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| NomadsError::Config(format!("PORT must be a number (got {raw:?})")))?,
            None => 5000,
        };

        let seed_on_startup = match lookup("SEED_ON_STARTUP") {
            Some(raw) => raw.parse()?,
            None => SeedPolicy::default(),
        };

        let strict_seed_titles = match lookup("SEED_STRICT_TITLES") {
            Some(raw) => parse_bool("SEED_STRICT_TITLES", &raw)?,
            None => false,
        };

        let config = Self {
            web_host: lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port,
            firebase_service_account: lookup("FIREBASE_SERVICE_ACCOUNT")
                .filter(|s| !s.trim().is_empty()),
            seed_events_path: lookup("SEED_EVENTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/events.json")),
            seed_on_startup,
            strict_seed_titles,
        };

        info!(
            port = config.web_port,
            seed_on_startup = %config.seed_on_startup,
            seed_events_path = %config.seed_events_path.display(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// The service account JSON, or a configuration error naming the missing variable.
    pub fn service_account_json(&self) -> Result<&str, NomadsError> {
        self.firebase_service_account.as_deref().ok_or_else(|| {
            NomadsError::Config("FIREBASE_SERVICE_ACCOUNT environment variable is required".into())
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, NomadsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(NomadsError::Config(format!("{key} must be true or false (got {raw:?})"))),
    }
}
