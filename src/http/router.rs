use std::time::Instant;

use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;
use crate::observability;

pub const BASE_PATH: &str = "/v1/fitnessstudio";

/// Record request count and latency per matched route.
async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());
    let started = Instant::now();
    let response = next.run(req).await;

    metrics::counter!(
        observability::HTTP_REQUESTS_TOTAL,
        "route" => route.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(observability::HTTP_REQUEST_DURATION_SECONDS, "route" => route)
        .record(started.elapsed().as_secs_f64());
    response
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route("/users/{id}", get(handlers::get_user).post(handlers::update_user))
        .route("/classes", get(handlers::list_classes).post(handlers::create_classes))
        .route("/classes/{id}", get(handlers::get_class).post(handlers::update_class))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/users/{id}/classes", get(handlers::user_bookings))
        .route("/bookings/classes/{id}/users", get(handlers::class_reservations))
        .route_layer(middleware::from_fn(track_requests));

    Router::new()
        .nest(BASE_PATH, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
