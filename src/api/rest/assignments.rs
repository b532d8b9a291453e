use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::{filters, transitions};
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::request::CollectionRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", get(list_assignments))
        .route("/assignments/available", get(available_requests))
        .route("/assignments/collector/:id", get(collector_assignments))
        .route("/assignments/claim/:id", post(claim))
        .route("/assignments/start/:id", post(start))
        .route("/assignments/release/:id", post(release))
        .route("/assignments/complete/:id", post(complete))
        .route("/assignments/cancel/:id", post(cancel))
}

#[derive(Deserialize)]
pub struct ClaimBody {
    pub collector_id: i64,
    pub collector_name: String,
    pub timeout_minutes: Option<i64>,
}

#[derive(Deserialize)]
pub struct ActorBody {
    pub collector_id: i64,
}

async fn claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ClaimBody>,
) -> Result<Json<Assignment>, AppError> {
    let timeout = payload
        .timeout_minutes
        .unwrap_or(state.default_claim_timeout_minutes);
    let assignment = transitions::claim_request(
        &state,
        id,
        payload.collector_id,
        &payload.collector_name,
        timeout,
    )?;

    Ok(Json(assignment))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ActorBody>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = transitions::start_request(&state, id, payload.collector_id)?;
    Ok(Json(assignment))
}

async fn release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ActorBody>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = transitions::release_request(&state, id, payload.collector_id)?;
    Ok(Json(assignment))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ActorBody>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = transitions::complete_request(&state, id, payload.collector_id)?;
    Ok(Json(assignment))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ActorBody>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = transitions::cancel_request(&state, id, payload.collector_id)?;
    Ok(Json(assignment))
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<Assignment>> {
    let assignments = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    Json(assignments)
}

#[derive(Deserialize)]
pub struct AvailableQuery {
    pub collector_id: Option<i64>,
}

async fn available_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailableQuery>,
) -> Json<Vec<CollectionRequest>> {
    let snapshot = state.snapshot();
    Json(filters::open_pool(&snapshot, query.collector_id.unwrap_or(0)))
}

async fn collector_assignments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Json<Vec<CollectionRequest>> {
    let snapshot = state.snapshot();
    Json(filters::my_assignments(&snapshot, id))
}
