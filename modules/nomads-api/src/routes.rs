use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::rest::{events, metrics, reviews, users};
use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Accounts
        .route("/signup", post(users::signup))
        .route("/affiliate", post(users::affiliate))
        .route("/user-info", get(users::user_info))
        .route("/metrics", get(metrics::get_metrics).post(metrics::add_metric))
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/interested-events",
            get(events::list_interested).post(events::add_interested),
        )
        .route("/interested-events/{event_id}", delete(events::remove_interested))
        .route(
            "/attended-events",
            get(events::list_attended).post(events::mark_attended),
        )
        .route("/events-for-feedback", get(events::events_for_feedback))
        // Reviews
        .route("/reviews", post(reviews::create_review))
        .route(
            "/user-reviews-with-events",
            get(reviews::user_reviews_with_events),
        )
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Method + path only: tokens travel in query strings on some routes.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
