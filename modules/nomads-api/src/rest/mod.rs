pub mod events;
pub mod metrics;
pub mod reviews;
pub mod users;

use serde_json::Value;

use nomads_store::Document;

pub const USERS: &str = "users";
pub const METRICS: &str = "metrics";
pub const REVIEWS: &str = "reviews";

pub fn interested_collection(uid: &str) -> String {
    format!("users/{uid}/interestedEvents")
}

pub fn attended_collection(uid: &str) -> String {
    format!("users/{uid}/attendedEvents")
}

/// Documents as `{id, ...fields}` objects.
fn documents_json(docs: Vec<Document>) -> Vec<Value> {
    docs.into_iter().map(Document::into_json).collect()
}
