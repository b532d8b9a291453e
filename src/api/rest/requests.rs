use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::engine::filters::RequestView;
use crate::engine::{evaluator, filters, transitions};
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::request::{CollectionRequest, GeoPoint, RequestStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/search", get(search_requests))
        .route("/requests/stats", get(request_stats))
        .route("/requests/nearby", get(nearby_requests))
        .route("/requests/map", get(map_markers))
        .route("/requests/views/:view", get(view_requests))
        .route("/requests/:id", get(get_request).patch(update_request))
        .route("/requests/:id/evaluation", get(evaluate_request))
}

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub material: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub address_user: Option<String>,
    pub reference: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub user_lastname: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRequestBody>,
) -> Result<Json<CollectionRequest>, AppError> {
    if payload.material.trim().is_empty() {
        return Err(AppError::BadRequest("material cannot be empty".to_string()));
    }
    if payload.user_id <= 0 {
        return Err(AppError::BadRequest("user_id must be positive".to_string()));
    }

    let id = state.allocate_request_id();
    let request = CollectionRequest {
        id,
        code: format!("REQ-{id:05}"),
        material: payload.material,
        description: payload.description,
        status: RequestStatus::Pending,
        assignment_status: None,
        created_at: Utc::now(),
        updated_at: None,
        weight: None,
        latitude: payload.latitude,
        longitude: payload.longitude,
        address: payload.address,
        address_user: payload.address_user,
        reference: payload.reference,
        district: payload.district,
        province: payload.province,
        region: payload.region,
        user_id: payload.user_id,
        user_name: payload.user_name,
        user_lastname: payload.user_lastname,
        user_email: payload.user_email,
        user_phone: payload.user_phone,
        assigned_collector_id: None,
        assigned_collector_name: None,
        assigned_at: None,
        assignment_expires_at: None,
    };

    state.requests.insert(request.id, request.clone());
    Ok(Json(request))
}

async fn list_requests(State(state): State<Arc<AppState>>) -> Json<Vec<CollectionRequest>> {
    Json(state.snapshot())
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CollectionRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    Ok(Json(request.value().clone()))
}

#[derive(Deserialize)]
pub struct ActorQuery {
    pub collector_id: i64,
}

#[derive(Serialize)]
pub struct Evaluation {
    pub combined_status: &'static str,
    pub can_claim: bool,
    pub can_release: bool,
    pub can_complete: bool,
    pub can_update: bool,
    pub can_cancel: bool,
}

/// Everything a client needs to decide which transition buttons to enable.
async fn evaluate_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Evaluation>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;
    let request = request.value();
    let actor = query.collector_id;

    Ok(Json(Evaluation {
        combined_status: evaluator::combined_status(request),
        can_claim: evaluator::can_claim(request, actor),
        can_release: evaluator::can_release(request, actor),
        can_complete: evaluator::can_complete(request, actor),
        can_update: evaluator::can_update(request, actor),
        can_cancel: evaluator::can_cancel(request, actor),
    }))
}

async fn view_requests(
    State(state): State<Arc<AppState>>,
    Path(view): Path<RequestView>,
    Query(query): Query<ActorQuery>,
) -> Json<Vec<CollectionRequest>> {
    let snapshot = state.snapshot();
    Json(filters::apply_view(&snapshot, view, query.collector_id))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub term: String,
    pub view: Option<RequestView>,
    pub collector_id: Option<i64>,
}

/// Term search, optionally narrowed to the caller's active list tab.
async fn search_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<CollectionRequest>> {
    let snapshot = state.snapshot();
    let scope = match query.view {
        Some(view) => filters::apply_view(&snapshot, view, query.collector_id.unwrap_or(0)),
        None => snapshot,
    };

    let results = scope
        .into_iter()
        .filter(|req| filters::matches_term(req, &query.term))
        .collect();
    Json(results)
}

async fn request_stats(State(state): State<Arc<AppState>>) -> Json<filters::DashboardStats> {
    Json(filters::dashboard_stats(&state.snapshot()))
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub collector_id: Option<i64>,
}

#[derive(Serialize)]
pub struct NearbyRequest {
    pub distance_km: f64,
    #[serde(flatten)]
    pub request: CollectionRequest,
}

/// Open pool ordered by distance from the collector's position. Requests
/// without coordinates are skipped.
async fn nearby_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Json<Vec<NearbyRequest>> {
    let here = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    let snapshot = state.snapshot();

    let mut nearby: Vec<NearbyRequest> = filters::open_pool(&snapshot, query.collector_id.unwrap_or(0))
        .into_iter()
        .filter_map(|request| {
            let there = request.location()?;
            Some(NearbyRequest {
                distance_km: haversine_km(&here, &there),
                request,
            })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    Json(nearby)
}

#[derive(Serialize)]
pub struct MapMarker {
    pub request_id: i64,
    pub code: String,
    pub lat: f64,
    pub lng: f64,
    pub marker: filters::MarkerClass,
    pub status_label: &'static str,
    pub requester: String,
    pub address: String,
}

async fn map_markers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActorQuery>,
) -> Json<Vec<MapMarker>> {
    let markers = state
        .snapshot()
        .into_iter()
        .filter_map(|request| {
            let location = request.location()?;
            Some(MapMarker {
                request_id: request.id,
                code: request.code.clone(),
                lat: location.lat,
                lng: location.lng,
                marker: filters::marker_class(&request, query.collector_id),
                status_label: evaluator::combined_status(&request),
                requester: request.requester_name(),
                address: request.short_address(),
            })
        })
        .collect();

    Json(markers)
}

#[derive(Deserialize)]
pub struct UpdateRequestBody {
    pub collector_id: i64,
    pub weight: Option<f64>,
    pub status: Option<RequestStatus>,
    pub notes: Option<String>,
}

async fn update_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRequestBody>,
) -> Result<Json<CollectionRequest>, AppError> {
    let updated = transitions::update_request(
        &state,
        id,
        payload.collector_id,
        transitions::UpdateFields {
            weight: payload.weight,
            status: payload.status,
            notes: payload.notes,
        },
    )?;

    Ok(Json(updated))
}
