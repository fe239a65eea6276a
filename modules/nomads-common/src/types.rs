use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NomadsError;

// --- Events ---

/// Descriptive payload of an event. `title` is the natural key used for
/// seeding; anything the typed fields don't cover lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventFields {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: None,
            location: None,
            description: None,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A record from the bundled seed list.
pub type CandidateEvent = EventFields;

/// An event document as it lives in the `events` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: String,
    #[serde(flatten)]
    pub fields: EventFields,
}

// --- Users ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
}

// --- Metrics ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntry {
    pub weight: f64,
    pub measurement_date: DateTime<Utc>,
}

/// One document per user holding their weight history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub metrics: Vec<MetricEntry>,
    pub updated_at: DateTime<Utc>,
}

// --- Reviews ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Id of the reviewed event.
    pub event: String,
    pub comment: String,
    pub rating: u32,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Review as submitted by a client, before it is attributed to a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewDraft {
    pub event: Option<String>,
    pub comment: Option<String>,
    pub rating: Option<u32>,
}

impl ReviewDraft {
    /// All three fields must be present and non-empty; a zero rating counts as missing.
    pub fn validate(self, user_id: &str, now: DateTime<Utc>) -> Result<Review, NomadsError> {
        let event = self.event.filter(|s| !s.trim().is_empty());
        let comment = self.comment.filter(|s| !s.trim().is_empty());
        let rating = self.rating.filter(|r| *r > 0);

        match (event, comment, rating) {
            (Some(event), Some(comment), Some(rating)) => Ok(Review {
                event,
                comment,
                rating,
                user_id: user_id.to_string(),
                created_at: now,
            }),
            _ => Err(NomadsError::Validation(
                "event, comment and rating are required".to_string(),
            )),
        }
    }
}
