use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use super::dto::*;
use super::error::AppError;
use super::state::AppState;
use crate::model::*;

pub type HandlerResult<T> = Result<Json<T>, AppError>;

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type IdPath = Result<Path<u64>, PathRejection>;

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ── Users ────────────────────────────────────────────────────

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> HandlerResult<Vec<User>> {
    Ok(Json(state.users.list_users().await?))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    body: JsonBody<UserBody>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(body) = body?;
    let user = state.users.add_user(&body.name).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id}
pub async fn get_user(State(state): State<AppState>, id: IdPath) -> HandlerResult<User> {
    let Path(id) = id?;
    Ok(Json(state.users.get_user(id).await?))
}

/// POST /users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<UserBody>,
) -> HandlerResult<RowsAffected> {
    let Path(id) = id?;
    let Json(body) = body?;
    let rows_affected = state.users.rename_user(id, &body.name).await?;
    Ok(Json(RowsAffected { rows_affected }))
}

// ── Classes ──────────────────────────────────────────────────

/// GET /classes
pub async fn list_classes(
    State(state): State<AppState>,
    query: Result<Query<ClassQuery>, QueryRejection>,
) -> HandlerResult<Vec<ClassInfo>> {
    let Query(query) = query?;
    let filters = ClassFilters::from(query);
    Ok(Json(state.classes.list_classes(&filters).await?))
}

/// POST /classes
///
/// Schedules one class per day of the range. Days already taken come back in
/// `not_scheduled`; the rest are persisted.
pub async fn create_classes(
    State(state): State<AppState>,
    body: JsonBody<CreateClassesRequest>,
) -> HandlerResult<CreateClassesResponse> {
    let Json(body) = body?;
    let request = ScheduleRequest::from(body);
    let not_scheduled = state.scheduler.create_classes(&request).await?;
    Ok(Json(CreateClassesResponse { not_scheduled }))
}

/// GET /classes/{id}
pub async fn get_class(State(state): State<AppState>, id: IdPath) -> HandlerResult<ClassInfo> {
    let Path(id) = id?;
    Ok(Json(state.classes.get_class_by_id(id).await?))
}

/// POST /classes/{id}
pub async fn update_class(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<UpdateClassRequest>,
) -> HandlerResult<RowsAffected> {
    let Path(id) = id?;
    let Json(body) = body?;
    let patch = ClassPatch::from(body);
    let rows_affected = state.scheduler.update_class(id, &patch).await?;
    Ok(Json(RowsAffected { rows_affected }))
}

// ── Bookings ─────────────────────────────────────────────────

/// POST /bookings
pub async fn create_booking(
    State(state): State<AppState>,
    body: JsonBody<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(body) = body?;
    let booking = state.gate.book(body.user_id, body.class_id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings/users/{id}/classes
pub async fn user_bookings(State(state): State<AppState>, id: IdPath) -> HandlerResult<Vec<ClassBooked>> {
    let Path(id) = id?;
    Ok(Json(state.bookings.user_bookings(id).await?))
}

/// GET /bookings/classes/{id}/users
pub async fn class_reservations(
    State(state): State<AppState>,
    id: IdPath,
) -> HandlerResult<Vec<UserBooked>> {
    let Path(id) = id?;
    Ok(Json(state.bookings.class_reservations(id).await?))
}
